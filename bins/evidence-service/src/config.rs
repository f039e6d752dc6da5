//! Configuration for the evidence service.
//!
//! Loaded once at startup from the environment, validated as a whole, and
//! passed immutably through constructors. Validation collects every failing
//! field so a misconfigured deployment reports all problems in one pass.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Upload sessions (and their presigned PUT URLs) live this long.
pub const UPLOAD_SESSION_TTL: Duration = Duration::from_secs(5 * 60);

/// Presigned download URLs live this long.
pub const DOWNLOAD_URL_TTL: Duration = Duration::from_secs(300);

/// Default upload size ceiling: 50 MiB.
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 52_428_800;

/// App key granted access to admin endpoints.
pub const ADMIN_APP_KEY: &str = "registry";

/// Object-store backend selection.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    S3 {
        endpoint: Option<String>,
        region: String,
        bucket: String,
        access_key: String,
        secret_key: String,
        force_path_style: bool,
    },
    Local {
        root: PathBuf,
    },
}

/// Secondary-replica backend selection.
#[derive(Debug, Clone)]
pub enum ReplicaConfig {
    /// Self-hosted node speaking the IPFS HTTP API.
    Node { api_url: String, gateway_url: String },
    /// Hosted pinning service with an API key.
    Pinning {
        api_url: String,
        api_key: String,
        gateway_url: String,
    },
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port.
    pub port: u16,

    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Object-store backend.
    pub storage: StorageConfig,

    /// Secondary replica; `None` disables replication entirely.
    pub replica: Option<ReplicaConfig>,

    /// When true, artifact downloads skip authentication.
    pub public_read: bool,

    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: u64,

    /// App key → shared secret for HMAC-authenticated callers.
    pub hmac_app_keys: HashMap<String, String>,

    /// Origins allowed by CORS; empty disables cross-origin access.
    pub cors_allowlist: Vec<String>,

    /// Secret for bearer tokens and upload tokens. When absent, bearer
    /// auth is disabled and upload tokens sign with a boot-time secret.
    pub jwt_secret: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `DATABASE_URL`
    /// - `HMAC_APP_KEYS` (`app:secret,app:secret,...`)
    /// - S3 settings when `STORAGE_DRIVER=s3` (the default):
    ///   `S3_REGION`, `S3_BUCKET`, `S3_ACCESS_KEY`, `S3_SECRET_KEY`
    ///
    /// Optional:
    /// - `PORT` (default 8080)
    /// - `STORAGE_DRIVER` (`s3` | `local`), `LOCAL_STORE_ROOT`
    /// - `S3_ENDPOINT`, `S3_FORCE_PATH_STYLE`
    /// - `PUBLIC_READ`, `MAX_UPLOAD_BYTES`, `CORS_ALLOWLIST`, `JWT_SECRET`
    /// - `IPFS_ENABLED`, `IPFS_MODE` (`node` | `pinning`), `IPFS_API_URL`,
    ///   `IPFS_API_KEY`, `IPFS_GATEWAY_URL`
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut problems = Vec::new();

        let port = match env::var("PORT") {
            Ok(raw) => match raw.parse::<u16>() {
                Ok(p) => p,
                Err(_) => {
                    problems.push(format!("PORT: not a valid port number: {:?}", raw));
                    0
                }
            },
            Err(_) => 8080,
        };

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| {
            problems.push("DATABASE_URL: missing".to_string());
            String::new()
        });

        let storage = Self::storage_from_env(&mut problems);
        let replica = Self::replica_from_env(&mut problems);

        let public_read = parse_bool(&mut problems, "PUBLIC_READ", false);

        let max_upload_bytes = match env::var("MAX_UPLOAD_BYTES") {
            Ok(raw) => match raw.parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => {
                    problems.push(format!(
                        "MAX_UPLOAD_BYTES: must be a positive integer, got {:?}",
                        raw
                    ));
                    DEFAULT_MAX_UPLOAD_BYTES
                }
            },
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let hmac_app_keys = match env::var("HMAC_APP_KEYS") {
            Ok(raw) => match parse_app_keys(&raw) {
                Ok(keys) => keys,
                Err(msg) => {
                    problems.push(format!("HMAC_APP_KEYS: {}", msg));
                    HashMap::new()
                }
            },
            Err(_) => {
                problems.push("HMAC_APP_KEYS: missing".to_string());
                HashMap::new()
            }
        };

        let cors_allowlist = env::var("CORS_ALLOWLIST")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let jwt_secret = env::var("JWT_SECRET").ok().filter(|s| !s.is_empty());

        if !problems.is_empty() {
            return Err(ConfigError::Invalid(problems));
        }

        Ok(Self {
            port,
            database_url,
            storage,
            replica,
            public_read,
            max_upload_bytes,
            hmac_app_keys,
            cors_allowlist,
            jwt_secret,
        })
    }

    fn storage_from_env(problems: &mut Vec<String>) -> StorageConfig {
        let driver = env::var("STORAGE_DRIVER").unwrap_or_else(|_| "s3".to_string());
        match driver.as_str() {
            "local" => {
                let root = env::var("LOCAL_STORE_ROOT").unwrap_or_else(|_| {
                    problems.push("LOCAL_STORE_ROOT: required for STORAGE_DRIVER=local".to_string());
                    String::new()
                });
                StorageConfig::Local { root: root.into() }
            }
            "s3" => {
                let mut required = |name: &str| {
                    env::var(name).unwrap_or_else(|_| {
                        problems.push(format!("{}: missing", name));
                        String::new()
                    })
                };
                let region = required("S3_REGION");
                let bucket = required("S3_BUCKET");
                let access_key = required("S3_ACCESS_KEY");
                let secret_key = required("S3_SECRET_KEY");
                let endpoint = env::var("S3_ENDPOINT").ok();
                let force_path_style = parse_bool(problems, "S3_FORCE_PATH_STYLE", false);
                StorageConfig::S3 {
                    endpoint,
                    region,
                    bucket,
                    access_key,
                    secret_key,
                    force_path_style,
                }
            }
            other => {
                problems.push(format!("STORAGE_DRIVER: unknown driver {:?}", other));
                StorageConfig::Local {
                    root: PathBuf::new(),
                }
            }
        }
    }

    fn replica_from_env(problems: &mut Vec<String>) -> Option<ReplicaConfig> {
        if !parse_bool(problems, "IPFS_ENABLED", false) {
            return None;
        }

        let gateway_url =
            env::var("IPFS_GATEWAY_URL").unwrap_or_else(|_| "https://ipfs.io".to_string());
        let api_url = env::var("IPFS_API_URL").unwrap_or_else(|_| {
            problems.push("IPFS_API_URL: required when IPFS_ENABLED=true".to_string());
            String::new()
        });

        let mode = env::var("IPFS_MODE").unwrap_or_else(|_| "node".to_string());
        match mode.as_str() {
            "node" => Some(ReplicaConfig::Node {
                api_url,
                gateway_url,
            }),
            "pinning" => {
                let api_key = env::var("IPFS_API_KEY").unwrap_or_else(|_| {
                    problems.push("IPFS_API_KEY: required when IPFS_MODE=pinning".to_string());
                    String::new()
                });
                Some(ReplicaConfig::Pinning {
                    api_url,
                    api_key,
                    gateway_url,
                })
            }
            other => {
                problems.push(format!("IPFS_MODE: unknown mode {:?}", other));
                None
            }
        }
    }

    /// HTTP bind address.
    pub fn bind_addr(&self) -> std::net::SocketAddr {
        ([0, 0, 0, 0], self.port).into()
    }
}

fn parse_bool(problems: &mut Vec<String>, name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => {
                problems.push(format!("{}: not a boolean: {:?}", name, raw));
                default
            }
        },
        Err(_) => default,
    }
}

/// Parses `app:secret,app:secret,...` into a key map.
fn parse_app_keys(raw: &str) -> Result<HashMap<String, String>, String> {
    let mut keys = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (app, secret) = entry
            .split_once(':')
            .ok_or_else(|| format!("entry {:?} is not app:secret", entry))?;
        if app.is_empty() || secret.is_empty() {
            return Err(format!("entry {:?} has an empty app or secret", entry));
        }
        keys.insert(app.to_string(), secret.to_string());
    }
    if keys.is_empty() {
        return Err("no app keys configured".to_string());
    }
    Ok(keys)
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_app_keys() {
        let keys = parse_app_keys("registry:s1, portal:s2").unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys["registry"], "s1");
        assert_eq!(keys["portal"], "s2");
    }

    #[test]
    fn test_parse_app_keys_rejects_malformed() {
        assert!(parse_app_keys("no-colon").is_err());
        assert!(parse_app_keys("app:").is_err());
        assert!(parse_app_keys("").is_err());
    }
}
