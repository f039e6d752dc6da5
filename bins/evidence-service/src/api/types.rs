//! Request/response types for the evidence API.
//!
//! All JSON keys are camelCase; timestamps serialize as RFC 3339 UTC;
//! digests are lowercase 64-hex strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::ArtifactRow;

/// Request to open an upload session.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadRequest {
    /// Display filename; sanitized before use.
    pub filename: String,
    /// Declared size; validated against the configured maximum.
    #[serde(default)]
    pub size_bytes: Option<u64>,
    /// Declared MIME; must pass the allow-list.
    #[serde(default)]
    pub mime_hint: Option<String>,
    /// Optional digest hint; `0x`-prefixed and uppercase accepted.
    #[serde(default)]
    pub declared_sha256: Option<String>,
    #[serde(default)]
    pub uploader_org_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub issuance_id: Option<String>,
    #[serde(default)]
    pub meta_json: Option<serde_json::Value>,
}

/// Response from upload init.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadResponse {
    pub upload_id: Uuid,
    pub token: String,
    pub put_url: String,
    pub bucket_key: String,
    pub expires_at: DateTime<Utc>,
}

/// Request to complete an upload session.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub upload_id: Uuid,
    /// The upload token issued at init.
    pub token: String,
}

/// Artifact descriptor returned from upload complete.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadResponse {
    pub artifact_id: Uuid,
    pub sha256_hex: String,
    pub size_bytes: i64,
    pub mime: String,
    pub bucket_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid_v1: Option<String>,
    pub download_url: String,
}

impl CompleteUploadResponse {
    pub fn from_artifact(artifact: ArtifactRow, download_url: String) -> Self {
        Self {
            artifact_id: artifact.id,
            sha256_hex: artifact.digest,
            size_bytes: artifact.size_bytes,
            mime: artifact.mime,
            bucket_key: artifact.bucket_key,
            cid_v1: artifact.cid_v1,
            download_url,
        }
    }
}

/// Full artifact metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetaResponse {
    pub artifact_id: Uuid,
    pub sha256_hex: String,
    pub size_bytes: i64,
    pub mime: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid_v1: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_json: Option<serde_json::Value>,
}

impl From<ArtifactRow> for ArtifactMetaResponse {
    fn from(artifact: ArtifactRow) -> Self {
        Self {
            artifact_id: artifact.id,
            sha256_hex: artifact.digest,
            size_bytes: artifact.size_bytes,
            mime: artifact.mime,
            filename: artifact.filename,
            cid_v1: artifact.cid_v1,
            created_at: artifact.created_at,
            project_id: artifact.project_id,
            issuance_id: artifact.issuance_id,
            meta_json: artifact.meta_json,
        }
    }
}

/// Existence probe response. Sourced from the catalog only; says nothing
/// about whether the bytes are currently readable.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid_v1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_status: Option<String>,
}

impl VerifyResponse {
    pub fn missing() -> Self {
        Self {
            exists: false,
            size_bytes: None,
            mime: None,
            cid_v1: None,
            created_at: None,
            scan_status: None,
        }
    }
}

impl From<ArtifactRow> for VerifyResponse {
    fn from(artifact: ArtifactRow) -> Self {
        Self {
            exists: true,
            size_bytes: Some(artifact.size_bytes),
            mime: Some(artifact.mime),
            cid_v1: artifact.cid_v1,
            created_at: Some(artifact.created_at),
            scan_status: Some(artifact.scan_status),
        }
    }
}

/// Request for a retention sweep.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepRequest {
    /// Artifacts created strictly before this instant are candidates.
    pub before_date: DateTime<Utc>,
    #[serde(default)]
    pub dry_run: bool,
}

/// Artifact summary in sweep responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepArtifact {
    pub artifact_id: Uuid,
    pub sha256_hex: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

impl From<ArtifactRow> for SweepArtifact {
    fn from(artifact: ArtifactRow) -> Self {
        Self {
            artifact_id: artifact.id,
            sha256_hex: artifact.digest,
            size_bytes: artifact.size_bytes,
            created_at: artifact.created_at,
        }
    }
}

/// Retention sweep response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResponse {
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts_deleted: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts_to_delete: Option<usize>,
    pub artifacts: Vec<SweepArtifact>,
}

/// Request naming an artifact by digest (pin, unpin, rescan).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestRequest {
    pub digest: String,
}

/// Admin pin response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinResponse {
    pub message: String,
    pub cid_v1: String,
    pub gateway_url: String,
}

/// Admin unpin response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnpinResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid_v1: Option<String>,
}

/// Admin rescan response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RescanResponse {
    pub message: String,
    pub sha256_hex: String,
    pub scan_status: String,
    pub verified_at: DateTime<Utc>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}
