//! Database models for the evidence catalog.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Lifecycle state of an upload session.
///
/// `Pending` is the only non-terminal state; a session that has left it
/// never changes status again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Pending,
    Complete,
    Aborted,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Complete => "COMPLETE",
            Self::Aborted => "ABORTED",
            Self::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "COMPLETE" => Some(Self::Complete),
            "ABORTED" => Some(Self::Aborted),
            "EXPIRED" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// Antivirus verdict, independent of the integrity state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Pending,
    Clean,
    Infected,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Clean => "CLEAN",
            Self::Infected => "INFECTED",
        }
    }
}

/// Database row for an artifact: the authoritative record of a unique
/// stored blob, keyed by digest.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArtifactRow {
    pub id: Uuid,

    /// Lowercase 64-hex SHA-256. Unique and immutable.
    pub digest: String,

    /// Byte count observed during verification.
    pub size_bytes: i64,

    /// MIME declared at completion time; frozen thereafter.
    pub mime: String,

    /// Sanitized display name from first ingestion.
    pub filename: String,

    /// Location of the canonical bytes in the object store.
    pub bucket_key: String,

    /// CIDv1 in the secondary network, when pinned.
    pub cid_v1: Option<String>,

    pub uploader_org_id: Option<String>,
    pub project_id: Option<String>,
    pub issuance_id: Option<String>,
    pub meta_json: Option<serde_json::Value>,

    /// Timestamp of the digest check that produced (or last confirmed)
    /// this record.
    pub verified_at: DateTime<Utc>,

    /// PENDING | CLEAN | INFECTED
    pub scan_status: String,

    pub created_at: DateTime<Utc>,
}

/// Database row for an upload session: the transient ticket between the
/// init and complete phases.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UploadSessionRow {
    pub id: Uuid,

    /// Caller-supplied digest hint, normalized to lowercase hex.
    pub declared_digest: Option<String>,

    pub filename: String,
    pub expected_size: Option<i64>,
    pub mime_hint: Option<String>,

    /// Staging key the presigned PUT targets.
    pub bucket_key: String,

    pub uploader_org_id: Option<String>,
    pub project_id: Option<String>,
    pub issuance_id: Option<String>,
    pub meta_json: Option<serde_json::Value>,

    /// Artifact this session resolved to, set at completion.
    pub artifact_id: Option<Uuid>,

    /// PENDING | COMPLETE | ABORTED | EXPIRED
    pub status: String,

    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl UploadSessionRow {
    /// Convert the stored status string to the enum.
    pub fn status_enum(&self) -> Option<SessionStatus> {
        SessionStatus::parse(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_status_roundtrip() {
        for status in [
            SessionStatus::Pending,
            SessionStatus::Complete,
            SessionStatus::Aborted,
            SessionStatus::Expired,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SessionStatus::parse("bogus"), None);
    }
}
