//! Ingestion controller: the two-phase upload protocol.
//!
//! Init persists a PENDING session and hands the caller a presigned PUT
//! URL; the caller uploads directly to the object store; complete streams
//! the staged object through the digest engine, deduplicates against the
//! catalog, and drives the session to exactly one terminal state:
//!
//! ```text
//!             PENDING ──(digest mismatch)──► ABORTED
//!                │
//!                ├──(verified / dedup)─────► COMPLETE
//!                │
//!                └──(observed past TTL)────► EXPIRED
//! ```
//!
//! Secondary replication happens after the primary write and is allowed
//! to fail without affecting the response.

use chrono::{DateTime, TimeDelta, Utc};
use evidence_core::{bucket_key, hash_stream, sanitize_filename, staging_key, validate_mime, Digest};
use evidence_store::{PresignOperation, StoreError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{issue_upload_token, verify_upload_token, AuthContext};
use crate::config::{DOWNLOAD_URL_TTL, UPLOAD_SESSION_TTL};
use crate::db::{self, ArtifactRow, ScanStatus, SessionStatus, UploadSessionRow};
use crate::error::{Result, ServiceError};
use crate::state::AppState;

/// Presign attempts before init gives up and unwinds.
const PRESIGN_ATTEMPTS: u32 = 3;

/// Validated inputs to the init phase.
#[derive(Debug)]
pub struct InitInput {
    pub filename: String,
    pub size_bytes: Option<u64>,
    pub mime_hint: Option<String>,
    pub declared_sha256: Option<String>,
    pub uploader_org_id: Option<String>,
    pub project_id: Option<String>,
    pub issuance_id: Option<String>,
    pub meta_json: Option<serde_json::Value>,
}

/// What init returns to the caller.
#[derive(Debug)]
pub struct InitOutcome {
    pub upload_id: Uuid,
    pub token: String,
    pub put_url: String,
    pub bucket_key: String,
    pub expires_at: DateTime<Utc>,
}

/// What complete returns to the caller.
#[derive(Debug)]
pub struct CompleteOutcome {
    pub artifact: ArtifactRow,
    pub download_url: String,
    pub deduplicated: bool,
}

/// Init phase: validate, persist a PENDING session, presign the PUT.
///
/// Failure is total: if presigning ultimately fails, the session row is
/// removed so no half-created session lingers.
pub async fn init_upload(
    state: &AppState,
    input: InitInput,
    ctx: &AuthContext,
) -> Result<InitOutcome> {
    if let Some(size) = input.size_bytes {
        if size > state.config.max_upload_bytes {
            return Err(ServiceError::FileTooLarge {
                size_bytes: size,
                max_bytes: state.config.max_upload_bytes,
            });
        }
    }
    if let Some(mime) = &input.mime_hint {
        validate_mime(mime)?;
    }
    let declared = input
        .declared_sha256
        .as_deref()
        .map(Digest::parse)
        .transpose()?;

    let upload_id = Uuid::new_v4();
    let filename = sanitize_filename(&input.filename);
    let now = Utc::now();
    let expires_at = now + TimeDelta::seconds(UPLOAD_SESSION_TTL.as_secs() as i64);

    // With a declared digest the staging key is already canonical; without
    // one the object stages under a session-unique key and moves at
    // complete time.
    let key = match &declared {
        Some(digest) => bucket_key(digest, &filename),
        None => staging_key(&upload_id.to_string(), &filename),
    };

    let session = UploadSessionRow {
        id: upload_id,
        declared_digest: declared.map(|d| d.as_str().to_string()),
        filename,
        expected_size: input.size_bytes.map(|s| s as i64),
        mime_hint: input.mime_hint,
        bucket_key: key.clone(),
        uploader_org_id: input.uploader_org_id.or_else(|| ctx.org_id.clone()),
        project_id: input.project_id,
        issuance_id: input.issuance_id,
        meta_json: input.meta_json,
        artifact_id: None,
        status: SessionStatus::Pending.as_str().to_string(),
        created_at: now,
        expires_at,
        completed_at: None,
    };
    db::create_session(&state.pool, &session).await?;

    let put_url = match presign_put_with_retry(state, &key).await {
        Ok(url) => url,
        Err(e) => {
            // Unwind so init is all-or-nothing.
            if let Err(cleanup) = db::delete_session(&state.pool, upload_id).await {
                warn!(%upload_id, error = %cleanup, "failed to unwind session after presign failure");
            }
            return Err(e.into());
        }
    };

    let token = issue_upload_token(&state.token_secret, upload_id, expires_at)?;
    state.metrics.uploads_initiated.inc();
    info!(%upload_id, app = %ctx.app_key, key = %key, "upload session created");

    Ok(InitOutcome {
        upload_id,
        token,
        put_url,
        bucket_key: key,
        expires_at,
    })
}

async fn presign_put_with_retry(state: &AppState, key: &str) -> std::result::Result<String, StoreError> {
    let mut attempt = 1;
    loop {
        match state
            .store
            .presign(PresignOperation::Put, key, UPLOAD_SESSION_TTL)
            .await
        {
            Ok(url) => return Ok(url),
            Err(e) if attempt < PRESIGN_ATTEMPTS => {
                warn!(key, attempt, error = %e, "presign failed, retrying");
                tokio::time::sleep(std::time::Duration::from_millis(100 * u64::from(attempt)))
                    .await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Complete phase: verify, dedup, and settle the session.
pub async fn complete_upload(
    state: &AppState,
    upload_id: Uuid,
    token: &str,
) -> Result<CompleteOutcome> {
    verify_upload_token(&state.token_secret, token, upload_id)?;

    let session = db::find_session(&state.pool, upload_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("upload session {}", upload_id)))?;

    match session.status_enum() {
        Some(SessionStatus::Pending) => {}
        Some(SessionStatus::Complete) => return replay_completed(state, &session).await,
        Some(SessionStatus::Aborted) => return Err(ServiceError::SessionAborted),
        Some(SessionStatus::Expired) => return Err(ServiceError::SessionExpired),
        None => {
            return Err(ServiceError::Internal(format!(
                "session {} has unknown status {:?}",
                upload_id, session.status
            )))
        }
    }

    let now = Utc::now();
    if session.expires_at < now {
        // Observe expiry lazily; there is no background reaper.
        db::transition_session(
            &state.pool,
            upload_id,
            SessionStatus::Pending,
            SessionStatus::Expired,
            None,
            None,
        )
        .await?;
        return Err(ServiceError::SessionExpired);
    }
    if session.bucket_key.is_empty() {
        return Err(ServiceError::Validation(
            "session has no staging key".to_string(),
        ));
    }

    // Stream the staged object through the digest engine. A missing
    // staged object can mean a concurrent complete already settled the
    // session and cleaned up; re-check before treating it as a failure.
    let reader = match state.store.get(&session.bucket_key).await {
        Ok(reader) => reader,
        Err(StoreError::NotFound(_)) => {
            let current = db::find_session(&state.pool, upload_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("upload session {}", upload_id)))?;
            if current.status_enum() == Some(SessionStatus::Complete) {
                return replay_completed(state, &current).await;
            }
            return Err(StoreError::NotFound(session.bucket_key.clone()).into());
        }
        Err(e) => return Err(e.into()),
    };
    let started = std::time::Instant::now();
    let hashed = hash_stream(reader).await?;
    state
        .metrics
        .hash_duration
        .observe(started.elapsed().as_secs_f64());

    if let Some(declared) = &session.declared_digest {
        if declared != hashed.digest.as_str() {
            db::transition_session(
                &state.pool,
                upload_id,
                SessionStatus::Pending,
                SessionStatus::Aborted,
                Some(now),
                None,
            )
            .await?;
            warn!(%upload_id, declared = %declared, actual = %hashed.digest, "digest mismatch, session aborted");
            return Err(ServiceError::HashMismatch {
                declared: declared.clone(),
                actual: hashed.digest.as_str().to_string(),
            });
        }
    }

    if let Some(existing) = db::find_artifact_by_digest(&state.pool, hashed.digest.as_str()).await? {
        // Dedup hit: the canonical bytes are already stored and possibly
        // pinned; the staged duplicate is garbage.
        if session.bucket_key != existing.bucket_key {
            if let Err(e) = state.store.delete(&session.bucket_key).await {
                warn!(%upload_id, key = %session.bucket_key, error = %e, "failed to delete staged duplicate");
            }
        }
        return settle(state, &session, existing, true, now).await;
    }

    // New content: relocate to the canonical key when the session staged
    // elsewhere, so the persisted bucket_key always encodes the digest
    // of the bytes it points at.
    let mime = session
        .mime_hint
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let canonical_key = bucket_key(&hashed.digest, &session.filename);
    if canonical_key != session.bucket_key {
        let staged = state.store.get(&session.bucket_key).await?;
        state
            .store
            .put(&canonical_key, staged, &mime, hashed.size_bytes)
            .await?;
        if let Err(e) = state.store.delete(&session.bucket_key).await {
            warn!(%upload_id, key = %session.bucket_key, error = %e, "failed to delete staged object after relocation");
        }
    }

    let candidate = ArtifactRow {
        id: Uuid::new_v4(),
        digest: hashed.digest.as_str().to_string(),
        size_bytes: hashed.size_bytes as i64,
        mime,
        filename: session.filename.clone(),
        bucket_key: canonical_key,
        cid_v1: None,
        uploader_org_id: session.uploader_org_id.clone(),
        project_id: session.project_id.clone(),
        issuance_id: session.issuance_id.clone(),
        meta_json: session.meta_json.clone(),
        verified_at: now,
        scan_status: ScanStatus::Pending.as_str().to_string(),
        created_at: now,
    };
    let (mut artifact, created) = db::create_artifact_if_absent(&state.pool, &candidate).await?;
    if !created {
        // A concurrent completion of identical content won the insert.
        return settle(state, &session, artifact, true, now).await;
    }

    // Secondary replication: best-effort, never fails the request.
    if let Some(replica) = &state.replica {
        match state.store.get(&artifact.bucket_key).await {
            Ok(reader) => match replica.pin(reader).await {
                Ok(pinned) => {
                    db::set_artifact_cid(&state.pool, artifact.id, Some(&pinned.cid)).await?;
                    artifact.cid_v1 = Some(pinned.cid);
                }
                Err(e) => {
                    state.metrics.pin_failures.inc();
                    warn!(artifact_id = %artifact.id, error = %e, "secondary replication failed");
                }
            },
            Err(e) => {
                state.metrics.pin_failures.inc();
                warn!(artifact_id = %artifact.id, error = %e, "could not re-open object for replication");
            }
        }
    }

    settle(state, &session, artifact, false, now).await
}

/// Settle a verified completion: drive the session to COMPLETE and build
/// the response. A lost transition race degrades to the idempotent path.
async fn settle(
    state: &AppState,
    session: &UploadSessionRow,
    artifact: ArtifactRow,
    deduplicated: bool,
    now: DateTime<Utc>,
) -> Result<CompleteOutcome> {
    let won = db::transition_session(
        &state.pool,
        session.id,
        SessionStatus::Pending,
        SessionStatus::Complete,
        Some(now),
        Some(artifact.id),
    )
    .await?;

    if !won {
        let current = db::find_session(&state.pool, session.id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("upload session {}", session.id)))?;
        match current.status_enum() {
            // A concurrent complete already settled this session; both
            // callers converge on the same artifact.
            Some(SessionStatus::Complete) => {}
            Some(SessionStatus::Aborted) => return Err(ServiceError::SessionAborted),
            Some(SessionStatus::Expired) => return Err(ServiceError::SessionExpired),
            _ => {
                return Err(ServiceError::Internal(format!(
                    "session {} left PENDING without a terminal status",
                    session.id
                )))
            }
        }
    }

    if deduplicated {
        state.metrics.dedup_hits.inc();
    }
    state.metrics.uploads_completed.inc();
    info!(
        upload_id = %session.id,
        artifact_id = %artifact.id,
        digest = %artifact.digest,
        deduplicated,
        "upload completed"
    );

    let download_url = download_url(state, &artifact).await?;
    Ok(CompleteOutcome {
        artifact,
        download_url,
        deduplicated,
    })
}

/// Idempotent replay: a second complete for an already-COMPLETE session
/// returns the settled artifact without touching any timestamps.
async fn replay_completed(state: &AppState, session: &UploadSessionRow) -> Result<CompleteOutcome> {
    let artifact_id = session.artifact_id.ok_or_else(|| {
        ServiceError::Internal(format!(
            "completed session {} has no artifact reference",
            session.id
        ))
    })?;
    let artifact = db::find_artifact_by_id(&state.pool, artifact_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("artifact {}", artifact_id)))?;

    let download_url = download_url(state, &artifact).await?;
    Ok(CompleteOutcome {
        artifact,
        download_url,
        deduplicated: true,
    })
}

/// Presigned GET for an artifact's canonical bytes.
pub async fn download_url(state: &AppState, artifact: &ArtifactRow) -> Result<String> {
    let url = state
        .store
        .presign(PresignOperation::Get, &artifact.bucket_key, DOWNLOAD_URL_TTL)
        .await?;
    Ok(url)
}
