//! Self-hosted IPFS node backend (Kubo HTTP API).

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::{Pinned, ReplicaError, ReplicaReader};

/// Ceiling on any single replica call; pinning large blobs is slow.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// `add` response from the node API. `Size` arrives as a decimal string.
#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
    #[serde(rename = "Size")]
    size: String,
}

/// Client for a self-hosted IPFS node.
#[derive(Debug, Clone)]
pub struct IpfsNode {
    client: Client,
    api_url: String,
    gateway_url: String,
}

impl IpfsNode {
    /// Creates a client for the node at `api_url` (e.g. `http://127.0.0.1:5001`).
    pub fn new(api_url: impl Into<String>, gateway_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self {
            client,
            api_url: trim_trailing_slash(api_url.into()),
            gateway_url: trim_trailing_slash(gateway_url.into()),
        }
    }

    pub(crate) async fn pin(&self, reader: ReplicaReader) -> Result<Pinned, ReplicaError> {
        let url = format!("{}/api/v0/add?cid-version=1&pin=true", self.api_url);
        let part = Part::stream(Body::wrap_stream(ReaderStream::new(reader)))
            .file_name("blob");
        let form = Form::new().part("file", part);

        let response = self.client.post(&url).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let added: AddResponse = response.json().await?;
        let size = added
            .size
            .parse::<u64>()
            .map_err(|_| ReplicaError::InvalidResponse(format!("non-numeric size: {}", added.size)))?;

        debug!(cid = %added.hash, size, "pinned blob on node");
        Ok(Pinned {
            cid: added.hash,
            size,
        })
    }

    pub(crate) async fn unpin(&self, cid: &str) -> Result<(), ReplicaError> {
        let url = format!("{}/api/v0/pin/rm?arg={}", self.api_url, cid);
        let response = self.client.post(&url).send().await?;
        if response.status().is_success() {
            return Ok(());
        }

        // The node reports "not pinned" as an error; the port treats a
        // missing pin as already-unpinned.
        let status = response.status();
        let message = response.text().await.unwrap_or_default();
        if message.contains("not pinned") {
            return Ok(());
        }
        Err(ReplicaError::Api {
            status: status.as_u16(),
            message,
        })
    }

    pub(crate) fn gateway_url(&self, cid: &str) -> String {
        format!("{}/ipfs/{}", self.gateway_url, cid)
    }
}

pub(crate) async fn api_error(response: reqwest::Response) -> ReplicaError {
    let status: StatusCode = response.status();
    let message = response.text().await.unwrap_or_default();
    ReplicaError::Api {
        status: status.as_u16(),
        message,
    }
}

pub(crate) fn trim_trailing_slash(mut s: String) -> String {
    while s.ends_with('/') {
        s.pop();
    }
    s
}
