//! HTTP handlers for the evidence API.
//!
//! Handlers take the raw body bytes so HMAC verification covers the exact
//! request payload; JSON parsing happens after authentication.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use evidence_core::Digest;
use serde::de::DeserializeOwned;

use crate::api::types::*;
use crate::auth::{verify_bearer, AuthContext};
use crate::error::{Result, ServiceError};
use crate::state::AppState;
use crate::{admin, db, ingest};

/// Authenticates with HMAC when the app headers are present, otherwise
/// falls back to bearer auth (when a JWT secret is configured).
fn authenticate(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<AuthContext> {
    if headers.contains_key("x-app-key") {
        return state.hmac_keys.verify(headers, body);
    }
    if headers.contains_key(header::AUTHORIZATION) && state.config.jwt_secret.is_some() {
        return verify_bearer(&state.token_secret, headers);
    }
    Err(ServiceError::Authentication("no credentials".to_string()))
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| ServiceError::Validation(format!("invalid request body: {}", e)))
}

fn parse_digest(raw: &str) -> Result<Digest> {
    Ok(Digest::parse(raw)?)
}

/// Open an upload session.
///
/// # Endpoint
/// `POST /v1/upload/init` (HMAC)
///
/// # Returns
/// - `201 Created` with the session id, upload token, and presigned PUT URL
/// - `413` / `415` / `400` for size, MIME, and digest validation failures
pub async fn init_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<InitUploadResponse>)> {
    let ctx = state.hmac_keys.verify(&headers, &body)?;
    let req: InitUploadRequest = parse_json(&body)?;

    let outcome = ingest::init_upload(
        &state,
        ingest::InitInput {
            filename: req.filename,
            size_bytes: req.size_bytes,
            mime_hint: req.mime_hint,
            declared_sha256: req.declared_sha256,
            uploader_org_id: req.uploader_org_id,
            project_id: req.project_id,
            issuance_id: req.issuance_id,
            meta_json: req.meta_json,
        },
        &ctx,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(InitUploadResponse {
            upload_id: outcome.upload_id,
            token: outcome.token,
            put_url: outcome.put_url,
            bucket_key: outcome.bucket_key,
            expires_at: outcome.expires_at,
        }),
    ))
}

/// Complete an upload session.
///
/// # Endpoint
/// `POST /v1/upload/complete` (HMAC)
///
/// # Returns
/// - `200 OK` with the artifact descriptor (newly created or deduplicated)
/// - `404` unknown session, `409` digest mismatch, `410` expired session
pub async fn complete_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CompleteUploadResponse>> {
    state.hmac_keys.verify(&headers, &body)?;
    let req: CompleteUploadRequest = parse_json(&body)?;

    match ingest::complete_upload(&state, req.upload_id, &req.token).await {
        Ok(outcome) => Ok(Json(CompleteUploadResponse::from_artifact(
            outcome.artifact,
            outcome.download_url,
        ))),
        Err(e) => {
            state.metrics.uploads_failed.inc();
            Err(e)
        }
    }
}

/// Redirect to a presigned download URL.
///
/// # Endpoint
/// `GET /v1/artifacts/{digest}`; authentication required unless the
/// service runs with `PUBLIC_READ`.
pub async fn download_artifact(
    State(state): State<AppState>,
    Path(digest): Path<String>,
    headers: HeaderMap,
) -> Result<Response> {
    if !state.config.public_read {
        authenticate(&state, &headers, b"")?;
    }
    let digest = parse_digest(&digest)?;

    let artifact = db::find_artifact_by_digest(&state.pool, digest.as_str())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("artifact {}", digest)))?;

    let url = ingest::download_url(&state, &artifact).await?;
    state.metrics.downloads.inc();

    Ok((StatusCode::FOUND, [(header::LOCATION, url)]).into_response())
}

/// Full artifact metadata.
///
/// # Endpoint
/// `GET /v1/artifacts/{digest}/meta` (HMAC or bearer)
pub async fn artifact_meta(
    State(state): State<AppState>,
    Path(digest): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ArtifactMetaResponse>> {
    authenticate(&state, &headers, b"")?;
    let digest = parse_digest(&digest)?;

    let artifact = db::find_artifact_by_digest(&state.pool, digest.as_str())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("artifact {}", digest)))?;

    Ok(Json(artifact.into()))
}

/// Cheap existence probe, catalog only.
///
/// # Endpoint
/// `GET /v1/artifacts/{digest}/verify` (unauthenticated)
pub async fn artifact_verify(
    State(state): State<AppState>,
    Path(digest): Path<String>,
) -> Result<Json<VerifyResponse>> {
    let digest = parse_digest(&digest)?;

    let response = match db::find_artifact_by_digest(&state.pool, digest.as_str()).await? {
        Some(artifact) => artifact.into(),
        None => VerifyResponse::missing(),
    };
    Ok(Json(response))
}

/// Retention sweep.
///
/// # Endpoint
/// `POST /v1/admin/retention/sweep` (admin)
pub async fn admin_sweep(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SweepResponse>> {
    let ctx = state.hmac_keys.verify(&headers, &body)?;
    ctx.require_admin()?;
    let req: SweepRequest = parse_json(&body)?;

    let outcome = admin::retention_sweep(&state, req.before_date, req.dry_run).await?;
    let artifacts: Vec<SweepArtifact> = outcome.artifacts.into_iter().map(Into::into).collect();

    Ok(Json(SweepResponse {
        dry_run: outcome.dry_run,
        artifacts_deleted: (!outcome.dry_run).then_some(artifacts.len()),
        artifacts_to_delete: outcome.dry_run.then_some(artifacts.len()),
        artifacts,
    }))
}

/// Pin an artifact to the secondary replica.
///
/// # Endpoint
/// `POST /v1/admin/ipfs/pin` (admin)
pub async fn admin_pin(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PinResponse>> {
    let ctx = state.hmac_keys.verify(&headers, &body)?;
    ctx.require_admin()?;
    let req: DigestRequest = parse_json(&body)?;
    let digest = parse_digest(&req.digest)?;

    let outcome = admin::pin_artifact(&state, &digest).await?;
    let message = if outcome.already_pinned {
        "artifact already pinned".to_string()
    } else {
        "artifact pinned".to_string()
    };

    Ok(Json(PinResponse {
        message,
        cid_v1: outcome.cid,
        gateway_url: outcome.gateway_url,
    }))
}

/// Unpin an artifact from the secondary replica.
///
/// # Endpoint
/// `POST /v1/admin/ipfs/unpin` (admin)
pub async fn admin_unpin(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UnpinResponse>> {
    let ctx = state.hmac_keys.verify(&headers, &body)?;
    ctx.require_admin()?;
    let req: DigestRequest = parse_json(&body)?;
    let digest = parse_digest(&req.digest)?;

    let cid = admin::unpin_artifact(&state, &digest).await?;
    let message = match &cid {
        Some(_) => "artifact unpinned".to_string(),
        None => "artifact was not pinned".to_string(),
    };

    Ok(Json(UnpinResponse {
        message,
        cid_v1: cid,
    }))
}

/// Re-verify an artifact's stored bytes against its digest.
///
/// # Endpoint
/// `POST /v1/admin/rescan` (admin)
pub async fn admin_rescan(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<RescanResponse>> {
    let ctx = state.hmac_keys.verify(&headers, &body)?;
    ctx.require_admin()?;
    let req: DigestRequest = parse_json(&body)?;
    let digest = parse_digest(&req.digest)?;

    let outcome = admin::rescan_artifact(&state, &digest).await?;

    Ok(Json(RescanResponse {
        message: "artifact verified".to_string(),
        sha256_hex: outcome.digest,
        scan_status: outcome.scan_status,
        verified_at: outcome.verified_at,
    }))
}

/// Health check: verifies the catalog is reachable.
pub async fn health_check(State(state): State<AppState>) -> Response {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => Json(HealthResponse {
            status: "ok".to_string(),
        })
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded".to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Readiness probe.
pub async fn readiness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ready".to_string(),
    })
}

/// Prometheus text exposition.
pub async fn metrics_exposition(State(state): State<AppState>) -> Result<Response> {
    let text = state.metrics.render()?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        text,
    )
        .into_response())
}
