//! Database queries for the evidence catalog.
//!
//! Every function is a single statement (inherently atomic) or an
//! explicitly guarded UPDATE. The unique index on `artifacts.digest`
//! serializes concurrent completions of identical content; status
//! transitions are guarded by the expected current status so terminal
//! sessions stay terminal.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{ArtifactRow, ScanStatus, SessionStatus, UploadSessionRow};
use crate::error::{Result, ServiceError};

/// Insert a new upload session.
pub async fn create_session(pool: &PgPool, row: &UploadSessionRow) -> Result<UploadSessionRow> {
    let inserted = sqlx::query_as::<_, UploadSessionRow>(
        r#"
        INSERT INTO upload_sessions (
            id, declared_digest, filename, expected_size, mime_hint,
            bucket_key, uploader_org_id, project_id, issuance_id, meta_json,
            artifact_id, status, created_at, expires_at, completed_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING *
        "#,
    )
    .bind(row.id)
    .bind(&row.declared_digest)
    .bind(&row.filename)
    .bind(row.expected_size)
    .bind(&row.mime_hint)
    .bind(&row.bucket_key)
    .bind(&row.uploader_org_id)
    .bind(&row.project_id)
    .bind(&row.issuance_id)
    .bind(&row.meta_json)
    .bind(row.artifact_id)
    .bind(&row.status)
    .bind(row.created_at)
    .bind(row.expires_at)
    .bind(row.completed_at)
    .fetch_one(pool)
    .await?;

    Ok(inserted)
}

/// Get an upload session by id.
pub async fn find_session(pool: &PgPool, id: Uuid) -> Result<Option<UploadSessionRow>> {
    let row = sqlx::query_as::<_, UploadSessionRow>("SELECT * FROM upload_sessions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Delete an upload session. Used only to compensate a failed init.
pub async fn delete_session(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM upload_sessions WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Transition a session's status, guarded by the expected current status.
///
/// Returns `true` when this call performed the transition, `false` when
/// the session was no longer in `from` (a concurrent caller won, or the
/// session is terminal). `completed_at` and `artifact_id` are written
/// only by the winning transition.
pub async fn transition_session(
    pool: &PgPool,
    id: Uuid,
    from: SessionStatus,
    to: SessionStatus,
    completed_at: Option<DateTime<Utc>>,
    artifact_id: Option<Uuid>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE upload_sessions
        SET status = $3,
            completed_at = COALESCE($4, completed_at),
            artifact_id = COALESCE($5, artifact_id)
        WHERE id = $1 AND status = $2
        "#,
    )
    .bind(id)
    .bind(from.as_str())
    .bind(to.as_str())
    .bind(completed_at)
    .bind(artifact_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Get an artifact by digest.
pub async fn find_artifact_by_digest(pool: &PgPool, digest: &str) -> Result<Option<ArtifactRow>> {
    let row = sqlx::query_as::<_, ArtifactRow>("SELECT * FROM artifacts WHERE digest = $1")
        .bind(digest)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Get an artifact by id.
pub async fn find_artifact_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ArtifactRow>> {
    let row = sqlx::query_as::<_, ArtifactRow>("SELECT * FROM artifacts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Insert an artifact unless one with the same digest already exists.
///
/// Returns `(artifact, created)`. On a digest collision the existing row
/// wins and `created` is `false`; the unique index makes this race-safe
/// under concurrent completions.
pub async fn create_artifact_if_absent(
    pool: &PgPool,
    row: &ArtifactRow,
) -> Result<(ArtifactRow, bool)> {
    let inserted = sqlx::query_as::<_, ArtifactRow>(
        r#"
        INSERT INTO artifacts (
            id, digest, size_bytes, mime, filename, bucket_key, cid_v1,
            uploader_org_id, project_id, issuance_id, meta_json,
            verified_at, scan_status, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (digest) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(row.id)
    .bind(&row.digest)
    .bind(row.size_bytes)
    .bind(&row.mime)
    .bind(&row.filename)
    .bind(&row.bucket_key)
    .bind(&row.cid_v1)
    .bind(&row.uploader_org_id)
    .bind(&row.project_id)
    .bind(&row.issuance_id)
    .bind(&row.meta_json)
    .bind(row.verified_at)
    .bind(&row.scan_status)
    .bind(row.created_at)
    .fetch_optional(pool)
    .await?;

    if let Some(created) = inserted {
        return Ok((created, true));
    }

    // Lost the insert race: the winner's row is authoritative.
    let existing = find_artifact_by_digest(pool, &row.digest).await?.ok_or_else(|| {
        ServiceError::Internal(format!(
            "artifact for digest {} vanished between insert and select",
            row.digest
        ))
    })?;
    Ok((existing, false))
}

/// Set or clear an artifact's secondary-replica CID.
pub async fn set_artifact_cid(pool: &PgPool, id: Uuid, cid: Option<&str>) -> Result<()> {
    sqlx::query("UPDATE artifacts SET cid_v1 = $2 WHERE id = $1")
        .bind(id)
        .bind(cid)
        .execute(pool)
        .await?;
    Ok(())
}

/// Record a scan verdict together with the verification timestamp.
pub async fn set_artifact_scan_status(
    pool: &PgPool,
    id: Uuid,
    status: ScanStatus,
    verified_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE artifacts SET scan_status = $2, verified_at = $3 WHERE id = $1")
        .bind(id)
        .bind(status.as_str())
        .bind(verified_at)
        .execute(pool)
        .await?;
    Ok(())
}

/// List artifacts created strictly before `cutoff`, oldest first.
pub async fn list_artifacts_created_before(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<Vec<ArtifactRow>> {
    let rows = sqlx::query_as::<_, ArtifactRow>(
        "SELECT * FROM artifacts WHERE created_at < $1 ORDER BY created_at",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Delete an artifact row.
pub async fn delete_artifact(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM artifacts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
