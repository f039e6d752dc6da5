//! Third-party pinning-service backend.
//!
//! Speaks the Pinata-style REST surface: bearer-token auth,
//! `POST /pinning/pinFileToIPFS`, `DELETE /pinning/unpin/{cid}`.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::node::{api_error, trim_trailing_slash};
use crate::{Pinned, ReplicaError, ReplicaReader};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct PinFileResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
    #[serde(rename = "PinSize")]
    pin_size: u64,
}

/// Client for a hosted pinning service.
#[derive(Debug, Clone)]
pub struct PinningService {
    client: Client,
    api_url: String,
    api_key: String,
    gateway_url: String,
}

impl PinningService {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        gateway_url: impl Into<String>,
    ) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self {
            client,
            api_url: trim_trailing_slash(api_url.into()),
            api_key: api_key.into(),
            gateway_url: trim_trailing_slash(gateway_url.into()),
        }
    }

    pub(crate) async fn pin(&self, reader: ReplicaReader) -> Result<Pinned, ReplicaError> {
        let url = format!("{}/pinning/pinFileToIPFS", self.api_url);
        let part = Part::stream(Body::wrap_stream(ReaderStream::new(reader)))
            .file_name("blob");
        let form = Form::new()
            .part("file", part)
            .text("pinataOptions", r#"{"cidVersion":1}"#);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let pinned: PinFileResponse = response.json().await?;
        debug!(cid = %pinned.ipfs_hash, size = pinned.pin_size, "pinned blob via service");
        Ok(Pinned {
            cid: pinned.ipfs_hash,
            size: pinned.pin_size,
        })
    }

    pub(crate) async fn unpin(&self, cid: &str) -> Result<(), ReplicaError> {
        let url = format!("{}/pinning/unpin/{}", self.api_url, cid);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            _ => Err(api_error(response).await),
        }
    }

    pub(crate) fn gateway_url(&self, cid: &str) -> String {
        format!("{}/ipfs/{}", self.gateway_url, cid)
    }
}
