//! S3-compatible object store.
//!
//! Works against AWS S3 and path-style compatibles (MinIO, Ceph RGW).
//! Uploads request AES-256 server-side encryption; presigned URLs are
//! SigV4. All operations inherit the client-level operation timeout.

use std::time::Duration;

use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ServerSideEncryption;
use aws_sdk_s3::Client;
use aws_smithy_types::body::SdkBody;
use http_body::Frame;
use http_body_util::StreamBody;
use tokio_stream::StreamExt as _;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::{ObjectReader, PresignOperation, StoreError};

/// Ceiling on any single S3 call.
const OPERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for the S3 backend.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Custom endpoint for S3-compatible stores; `None` for AWS proper.
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    /// Path-style addressing, required by most self-hosted compatibles.
    pub force_path_style: bool,
}

/// S3-compatible object store client.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Builds a client from the given settings.
    pub async fn connect(config: S3Config) -> Self {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "evidence-config",
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(OPERATION_TIMEOUT)
                    .build(),
            );
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let shared_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket,
        }
    }

    pub(crate) async fn put(
        &self,
        key: &str,
        reader: ObjectReader,
        content_type: &str,
        content_length: u64,
    ) -> Result<(), StoreError> {
        let frames = ReaderStream::new(reader).map(|chunk| chunk.map(Frame::data));
        let body = ByteStream::new(SdkBody::from_body_1_x(StreamBody::new(frames)));

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .content_length(content_length as i64)
            .server_side_encryption(ServerSideEncryption::Aes256)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("put {}: {}", key, e)))?;

        debug!(key, bytes = content_length, "stored object");
        Ok(())
    }

    pub(crate) async fn get(&self, key: &str) -> Result<ObjectReader, StoreError> {
        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(Box::new(output.body.into_async_read())),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    Err(StoreError::NotFound(key.to_string()))
                } else {
                    Err(StoreError::Backend(format!("get {}: {}", key, service_err)))
                }
            }
        }
    }

    pub(crate) async fn head(&self, key: &str) -> Result<bool, StoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(StoreError::Backend(format!("head {}: {}", key, service_err)))
                }
            }
        }
    }

    pub(crate) async fn delete(&self, key: &str) -> Result<(), StoreError> {
        // S3 DeleteObject succeeds for absent keys, which matches the
        // port's idempotency contract.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("delete {}: {}", key, e)))?;
        Ok(())
    }

    pub(crate) async fn presign(
        &self,
        op: PresignOperation,
        key: &str,
        ttl: Duration,
    ) -> Result<String, StoreError> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| StoreError::Backend(format!("presign config: {}", e)))?;

        let uri = match op {
            PresignOperation::Put => self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .presigned(presigning)
                .await
                .map_err(|e| StoreError::Backend(format!("presign put {}: {}", key, e)))?
                .uri()
                .to_string(),
            PresignOperation::Get => self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .presigned(presigning)
                .await
                .map_err(|e| StoreError::Backend(format!("presign get {}: {}", key, e)))?
                .uri()
                .to_string(),
        };

        Ok(uri)
    }
}
