//! Admin lifecycle operations: retention sweep, pin/unpin, rescan.
//!
//! All of these are invoked through the registry application only; the
//! handlers enforce the admin gate before calling in here.

use chrono::{DateTime, Utc};
use evidence_core::{hash_stream, Digest};
use tracing::{info, warn};

use crate::db::{self, ArtifactRow, ScanStatus};
use crate::error::{Result, ServiceError};
use crate::state::AppState;

/// Outcome of a retention sweep.
#[derive(Debug)]
pub struct SweepOutcome {
    pub dry_run: bool,
    /// Dry-run: the candidates. Live run: only the artifacts actually
    /// deleted from both the store and the catalog.
    pub artifacts: Vec<ArtifactRow>,
}

/// Deletes artifacts created before `before`, store first, catalog second.
///
/// Per-artifact failures are logged and skipped; the sweep always runs to
/// the end of the candidate list.
pub async fn retention_sweep(
    state: &AppState,
    before: DateTime<Utc>,
    dry_run: bool,
) -> Result<SweepOutcome> {
    let candidates = db::list_artifacts_created_before(&state.pool, before).await?;

    if dry_run {
        return Ok(SweepOutcome {
            dry_run,
            artifacts: candidates,
        });
    }

    let mut deleted = Vec::new();
    for artifact in candidates {
        // Store delete is idempotent; an absent object is fine.
        if let Err(e) = state.store.delete(&artifact.bucket_key).await {
            warn!(artifact_id = %artifact.id, key = %artifact.bucket_key, error = %e, "sweep: store delete failed, skipping");
            continue;
        }
        if let Err(e) = db::delete_artifact(&state.pool, artifact.id).await {
            warn!(artifact_id = %artifact.id, error = %e, "sweep: catalog delete failed, skipping");
            continue;
        }
        info!(artifact_id = %artifact.id, digest = %artifact.digest, "sweep: artifact deleted");
        deleted.push(artifact);
    }

    Ok(SweepOutcome {
        dry_run,
        artifacts: deleted,
    })
}

/// Result of an admin pin.
#[derive(Debug)]
pub struct PinOutcome {
    pub cid: String,
    pub gateway_url: String,
    /// True when the artifact was already pinned and no work happened.
    pub already_pinned: bool,
}

/// Pins an artifact's bytes to the secondary replica.
pub async fn pin_artifact(state: &AppState, digest: &Digest) -> Result<PinOutcome> {
    let artifact = require_artifact(state, digest).await?;
    let replica = state
        .replica
        .as_ref()
        .ok_or_else(|| ServiceError::Precondition("secondary replica is not configured".to_string()))?;

    if let Some(cid) = artifact.cid_v1 {
        let gateway_url = replica.gateway_url(&cid);
        return Ok(PinOutcome {
            cid,
            gateway_url,
            already_pinned: true,
        });
    }

    let reader = state.store.get(&artifact.bucket_key).await?;
    let pinned = replica.pin(reader).await?;
    db::set_artifact_cid(&state.pool, artifact.id, Some(&pinned.cid)).await?;
    info!(artifact_id = %artifact.id, cid = %pinned.cid, "artifact pinned");

    let gateway_url = replica.gateway_url(&pinned.cid);
    Ok(PinOutcome {
        cid: pinned.cid,
        gateway_url,
        already_pinned: false,
    })
}

/// Removes an artifact's pin. An unpinned artifact is a no-op success.
pub async fn unpin_artifact(state: &AppState, digest: &Digest) -> Result<Option<String>> {
    let artifact = require_artifact(state, digest).await?;

    let Some(cid) = artifact.cid_v1 else {
        return Ok(None);
    };
    let replica = state
        .replica
        .as_ref()
        .ok_or_else(|| ServiceError::Precondition("secondary replica is not configured".to_string()))?;

    replica.unpin(&cid).await?;
    db::set_artifact_cid(&state.pool, artifact.id, None).await?;
    info!(artifact_id = %artifact.id, cid = %cid, "artifact unpinned");
    Ok(Some(cid))
}

/// Result of a rescan.
#[derive(Debug)]
pub struct RescanOutcome {
    pub digest: String,
    pub scan_status: String,
    pub verified_at: DateTime<Utc>,
}

/// Re-streams an artifact and confirms its stored digest.
///
/// A mismatch flags potential corruption and leaves the artifact's scan
/// status untouched.
pub async fn rescan_artifact(state: &AppState, digest: &Digest) -> Result<RescanOutcome> {
    let artifact = require_artifact(state, digest).await?;

    let reader = state.store.get(&artifact.bucket_key).await?;
    let hashed = hash_stream(reader).await?;

    if hashed.digest.as_str() != artifact.digest || hashed.size_bytes as i64 != artifact.size_bytes
    {
        warn!(
            artifact_id = %artifact.id,
            expected = %artifact.digest,
            actual = %hashed.digest,
            "rescan found corrupted object"
        );
        return Err(ServiceError::Storage(evidence_store::StoreError::Backend(
            format!(
                "stored bytes no longer match digest {} (got {}, {} bytes)",
                artifact.digest, hashed.digest, hashed.size_bytes
            ),
        )));
    }

    let verified_at = Utc::now();
    db::set_artifact_scan_status(&state.pool, artifact.id, ScanStatus::Clean, verified_at).await?;
    info!(artifact_id = %artifact.id, "rescan verified artifact");

    Ok(RescanOutcome {
        digest: artifact.digest,
        scan_status: ScanStatus::Clean.as_str().to_string(),
        verified_at,
    })
}

async fn require_artifact(state: &AppState, digest: &Digest) -> Result<ArtifactRow> {
    db::find_artifact_by_digest(&state.pool, digest.as_str())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("artifact {}", digest)))
}
