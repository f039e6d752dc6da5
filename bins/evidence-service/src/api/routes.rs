//! API routes and router configuration.

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::handlers::{
    admin_pin, admin_rescan, admin_sweep, admin_unpin, artifact_meta, artifact_verify,
    complete_upload, download_artifact, health_check, init_upload, metrics_exposition, readiness,
};
use crate::state::AppState;

/// Create the API router with all routes.
///
/// # Routes
///
/// - `POST /v1/upload/init` - Open an upload session (HMAC)
/// - `POST /v1/upload/complete` - Complete an upload session (HMAC)
/// - `GET /v1/artifacts/{digest}` - Redirect to a presigned download
/// - `GET /v1/artifacts/{digest}/meta` - Artifact metadata (auth)
/// - `GET /v1/artifacts/{digest}/verify` - Existence probe
/// - `POST /v1/admin/retention/sweep` - Retention sweep (admin)
/// - `POST /v1/admin/ipfs/pin` - Pin to secondary replica (admin)
/// - `POST /v1/admin/ipfs/unpin` - Unpin from secondary replica (admin)
/// - `POST /v1/admin/rescan` - Re-verify stored bytes (admin)
/// - `GET /health`, `GET /ready`, `GET /metrics`
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allowlist);

    Router::new()
        .route("/v1/upload/init", post(init_upload))
        .route("/v1/upload/complete", post(complete_upload))
        .route("/v1/artifacts/{digest}", get(download_artifact))
        .route("/v1/artifacts/{digest}/meta", get(artifact_meta))
        .route("/v1/artifacts/{digest}/verify", get(artifact_verify))
        .route("/v1/admin/retention/sweep", post(admin_sweep))
        .route("/v1/admin/ipfs/pin", post(admin_pin))
        .route("/v1/admin/ipfs/unpin", post(admin_unpin))
        .route("/v1/admin/rescan", post(admin_rescan))
        .route("/health", get(health_check))
        .route("/ready", get(readiness))
        .route("/metrics", get(metrics_exposition))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowlist: &[String]) -> CorsLayer {
    if allowlist.is_empty() {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = allowlist
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
