//! Shared test harness: a service instance over a tempdir-local object
//! store and a per-test Postgres database provided by `sqlx::test`.

use std::collections::HashMap;
use std::io::Cursor;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use evidence_service::api::routes::create_router;
use evidence_service::config::{Config, StorageConfig};
use evidence_service::state::AppState;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::{ConnectOptions, PgPool};
use tower::ServiceExt;

/// The 12-byte payload used across scenarios.
pub const HELLO: &[u8] = b"hello world!";

/// SHA-256 of `HELLO`.
pub const HELLO_DIGEST: &str = "7509e5bda0c762d2bac7f90d758b5b2263fa01ccbc542ab5e3df163be08e6ca9";

/// A running service instance for tests.
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    // Keeps the local store alive for the test's duration.
    _store_dir: tempfile::TempDir,
}

/// Builds a service over a tempdir-local store with default settings.
pub async fn test_app(pool: PgPool) -> TestApp {
    test_app_with(pool, |_| {}).await
}

/// Builds a service, letting the test tweak the config first.
pub async fn test_app_with(pool: PgPool, tweak: impl FnOnce(&mut Config)) -> TestApp {
    let store_dir = tempfile::tempdir().unwrap();

    let mut hmac_app_keys = HashMap::new();
    hmac_app_keys.insert("portal".to_string(), "portal-secret".to_string());
    hmac_app_keys.insert("registry".to_string(), "registry-secret".to_string());

    let mut config = Config {
        port: 0,
        database_url: pool.connect_options().to_url_lossy().to_string(),
        storage: StorageConfig::Local {
            root: store_dir.path().to_path_buf(),
        },
        replica: None,
        public_read: false,
        max_upload_bytes: 1024 * 1024,
        hmac_app_keys,
        cors_allowlist: Vec::new(),
        jwt_secret: Some("test-jwt-secret".to_string()),
    };
    tweak(&mut config);

    let state = AppState::from_config(config, pool).await.unwrap();
    TestApp {
        router: create_router(state.clone()),
        state,
        _store_dir: store_dir,
    }
}

impl TestApp {
    /// Sends an HMAC-signed JSON request as the given application.
    pub async fn hmac_request(
        &self,
        app: &str,
        method: Method,
        uri: &str,
        body: &Value,
    ) -> (StatusCode, Value) {
        let bytes = serde_json::to_vec(body).unwrap();
        let sig = self.state.hmac_keys.sign(app, &bytes).unwrap();
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-app-key", app)
            .header("x-app-sig", sig)
            .body(Body::from(bytes))
            .unwrap();
        self.send(request).await
    }

    /// Sends an unauthenticated request with no body.
    #[allow(dead_code)]
    pub async fn plain_request(&self, method: Method, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Sends a request and parses the JSON body (null when empty).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Sends a request and returns the raw response (for redirects).
    #[allow(dead_code)]
    pub async fn send_raw(&self, request: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Simulates the caller's direct PUT to the presigned staging key.
    pub async fn put_object(&self, key: &str, bytes: &[u8]) {
        self.state
            .store
            .put(
                key,
                Box::new(Cursor::new(bytes.to_vec())),
                "application/octet-stream",
                bytes.len() as u64,
            )
            .await
            .unwrap();
    }

    /// Runs the full init → PUT → complete flow; returns the complete
    /// response.
    #[allow(dead_code)]
    pub async fn upload(&self, init_body: Value, bytes: &[u8]) -> (StatusCode, Value) {
        let (status, init) = self
            .hmac_request("portal", Method::POST, "/v1/upload/init", &init_body)
            .await;
        assert_eq!(status, StatusCode::CREATED, "init failed: {}", init);

        self.put_object(init["bucketKey"].as_str().unwrap(), bytes).await;

        self.hmac_request(
            "portal",
            Method::POST,
            "/v1/upload/complete",
            &json!({
                "uploadId": init["uploadId"],
                "token": init["token"],
            }),
        )
        .await
    }
}
