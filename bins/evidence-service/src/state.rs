//! Shared application state.

use std::sync::Arc;

use evidence_replica::{IpfsNode, PinningService, ReplicaStore};
use evidence_store::{LocalStore, ObjectStore, S3Config, S3Store, StoreError};
use rand::RngCore;
use sqlx::PgPool;

use crate::auth::HmacKeys;
use crate::config::{Config, ReplicaConfig, StorageConfig};
use crate::metrics::Metrics;

/// State shared by all request handlers.
///
/// Everything here is cheap to clone: pools and clients are internally
/// reference-counted, and the config is behind an `Arc`. There is no
/// mutable in-memory state; concurrency control lives in the catalog.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub store: ObjectStore,
    /// Secondary replica; `None` when replication is disabled.
    pub replica: Option<ReplicaStore>,
    pub hmac_keys: HmacKeys,
    pub metrics: Metrics,
    /// Process-wide secret signing bearer and upload tokens.
    pub token_secret: Arc<Vec<u8>>,
}

impl AppState {
    /// Assembles state from configuration, connecting the store backends.
    pub async fn from_config(config: Config, pool: PgPool) -> Result<Self, StoreError> {
        let store = build_store(&config.storage).await?;
        let replica = config.replica.as_ref().map(build_replica);
        let hmac_keys = HmacKeys::new(config.hmac_app_keys.clone());
        let token_secret = Arc::new(token_secret(&config));

        Ok(Self {
            pool,
            config: Arc::new(config),
            store,
            replica,
            hmac_keys,
            metrics: Metrics::new(),
            token_secret,
        })
    }
}

async fn build_store(config: &StorageConfig) -> Result<ObjectStore, StoreError> {
    match config {
        StorageConfig::S3 {
            endpoint,
            region,
            bucket,
            access_key,
            secret_key,
            force_path_style,
        } => {
            let store = S3Store::connect(S3Config {
                endpoint: endpoint.clone(),
                region: region.clone(),
                bucket: bucket.clone(),
                access_key: access_key.clone(),
                secret_key: secret_key.clone(),
                force_path_style: *force_path_style,
            })
            .await;
            Ok(ObjectStore::S3(store))
        }
        StorageConfig::Local { root } => Ok(ObjectStore::Local(LocalStore::new(root.clone())?)),
    }
}

fn build_replica(config: &ReplicaConfig) -> ReplicaStore {
    match config {
        ReplicaConfig::Node {
            api_url,
            gateway_url,
        } => ReplicaStore::Node(IpfsNode::new(api_url.clone(), gateway_url.clone())),
        ReplicaConfig::Pinning {
            api_url,
            api_key,
            gateway_url,
        } => ReplicaStore::Pinning(PinningService::new(
            api_url.clone(),
            api_key.clone(),
            gateway_url.clone(),
        )),
    }
}

/// The token-signing secret: the configured JWT secret, or a boot-time
/// random secret when none is set (upload tokens then survive only as
/// long as the process, which matches their five-minute lifetime).
fn token_secret(config: &Config) -> Vec<u8> {
    match &config.jwt_secret {
        Some(secret) => secret.as_bytes().to_vec(),
        None => {
            let mut secret = vec![0u8; 32];
            rand::rng().fill_bytes(&mut secret);
            secret
        }
    }
}
