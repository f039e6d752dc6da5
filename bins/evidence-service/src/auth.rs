//! Request authentication.
//!
//! Three credentials, all verified in constant time:
//!
//! - **HMAC** (server-to-server): `x-app-key` / `x-app-sig` headers, the
//!   signature being `hex(HMAC-SHA256(secret, raw body))`. The error for
//!   an unknown app key is indistinguishable from a bad signature, and an
//!   unknown key still pays for a full MAC computation against a dummy
//!   secret so timing does not leak which case occurred.
//! - **Bearer** (user): compact HS256 JWT with a required audience claim,
//!   verified against the process-wide secret.
//! - **Upload token**: HS256 token minted at upload init, bound to the
//!   session id, verifiable without a catalog lookup.

use std::collections::HashMap;

use axum::http::HeaderMap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::config::ADMIN_APP_KEY;
use crate::error::{Result, ServiceError};

type HmacSha256 = Hmac<Sha256>;

/// Audience required in bearer tokens.
const AUDIENCE: &str = "evidence-service";

/// Secret used to keep HMAC verification time flat for unknown app keys.
const DUMMY_SECRET: &[u8] = b"evidence-dummy-secret-constant-pad";

/// Identity of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Calling application key; `"user"` for bearer-authenticated callers.
    pub app_key: String,
    pub org_id: Option<String>,
    pub user_id: Option<String>,
}

impl AuthContext {
    /// Admin endpoints are reserved for the registry application.
    pub fn require_admin(&self) -> Result<()> {
        if self.app_key == ADMIN_APP_KEY {
            Ok(())
        } else {
            Err(ServiceError::Authorization(format!(
                "app {:?} is not an admin",
                self.app_key
            )))
        }
    }
}

/// Configured HMAC application keys.
#[derive(Clone)]
pub struct HmacKeys {
    keys: HashMap<String, String>,
}

impl HmacKeys {
    pub fn new(keys: HashMap<String, String>) -> Self {
        Self { keys }
    }

    /// Verifies `x-app-key` / `x-app-sig` against the raw request body.
    ///
    /// The canonical body for a GET is the empty string.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<AuthContext> {
        let app_key = header_str(headers, "x-app-key")
            .ok_or_else(|| ServiceError::Authentication("missing x-app-key".to_string()))?;
        let provided_sig = header_str(headers, "x-app-sig")
            .ok_or_else(|| ServiceError::Authentication("missing x-app-sig".to_string()))?;

        let (secret, known) = match self.keys.get(app_key) {
            Some(secret) => (secret.as_bytes(), true),
            None => (DUMMY_SECRET, false),
        };

        let expected = hex::encode(mac_bytes(secret, body));
        let matches: bool = expected.as_bytes().ct_eq(provided_sig.as_bytes()).into();

        if known && matches {
            Ok(AuthContext {
                app_key: app_key.to_string(),
                org_id: None,
                user_id: None,
            })
        } else {
            Err(ServiceError::Authentication(format!(
                "HMAC verification failed for app {:?}",
                app_key
            )))
        }
    }

    /// Computes the signature a caller would send for `body`.
    pub fn sign(&self, app_key: &str, body: &[u8]) -> Option<String> {
        self.keys
            .get(app_key)
            .map(|secret| hex::encode(mac_bytes(secret.as_bytes(), body)))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn mac_bytes(secret: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

// ── Compact HS256 tokens ────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

/// Claims carried by user bearer tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct BearerClaims {
    pub aud: String,
    pub exp: i64,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
}

/// Claims carried by upload tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadTokenClaims {
    pub upload_id: Uuid,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs a claims object into a compact `header.payload.signature` token.
pub fn sign_token<C: Serialize>(secret: &[u8], claims: &C) -> Result<String> {
    let header = TokenHeader {
        alg: "HS256".to_string(),
        typ: "JWT".to_string(),
    };
    let header_b64 = URL_SAFE_NO_PAD.encode(
        serde_json::to_vec(&header)
            .map_err(|e| ServiceError::Internal(format!("token header encoding: {}", e)))?,
    );
    let payload_b64 = URL_SAFE_NO_PAD.encode(
        serde_json::to_vec(claims)
            .map_err(|e| ServiceError::Internal(format!("token claims encoding: {}", e)))?,
    );
    let signing_input = format!("{}.{}", header_b64, payload_b64);
    let signature = URL_SAFE_NO_PAD.encode(mac_bytes(secret, signing_input.as_bytes()));
    Ok(format!("{}.{}", signing_input, signature))
}

/// Verifies a compact token's signature and decodes its claims.
///
/// Expiry and audience checks belong to the specific verifier.
fn decode_token<C: for<'de> Deserialize<'de>>(secret: &[u8], token: &str) -> Result<C> {
    let unauthenticated = || ServiceError::Authentication("malformed token".to_string());

    let mut parts = token.split('.');
    let (header_b64, payload_b64, signature_b64) = match (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) {
        (Some(h), Some(p), Some(s), None) => (h, p, s),
        _ => return Err(unauthenticated()),
    };

    let signing_input = format!("{}.{}", header_b64, payload_b64);
    let expected = mac_bytes(secret, signing_input.as_bytes());
    let provided = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| unauthenticated())?;
    let matches: bool = expected.ct_eq(&provided).into();
    if !matches {
        return Err(ServiceError::Authentication(
            "token signature mismatch".to_string(),
        ));
    }

    let header: TokenHeader = serde_json::from_slice(
        &URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| unauthenticated())?,
    )
    .map_err(|_| unauthenticated())?;
    if header.alg != "HS256" {
        return Err(ServiceError::Authentication(format!(
            "unsupported token algorithm {:?}",
            header.alg
        )));
    }

    serde_json::from_slice(
        &URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| unauthenticated())?,
    )
    .map_err(|_| unauthenticated())
}

/// Verifies an `Authorization: Bearer` header into an [`AuthContext`].
pub fn verify_bearer(secret: &[u8], headers: &HeaderMap) -> Result<AuthContext> {
    let value = header_str(headers, "authorization")
        .ok_or_else(|| ServiceError::Authentication("missing Authorization header".to_string()))?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ServiceError::Authentication("not a bearer token".to_string()))?;

    let claims: BearerClaims = decode_token(secret, token)?;
    if claims.aud != AUDIENCE {
        return Err(ServiceError::Authentication(format!(
            "audience mismatch: {:?}",
            claims.aud
        )));
    }
    if claims.exp < Utc::now().timestamp() {
        return Err(ServiceError::Authentication("token expired".to_string()));
    }

    Ok(AuthContext {
        app_key: "user".to_string(),
        org_id: claims.org_id,
        user_id: claims.sub,
    })
}

/// Issues the upload token returned from upload init.
pub fn issue_upload_token(
    secret: &[u8],
    upload_id: Uuid,
    expires_at: DateTime<Utc>,
) -> Result<String> {
    sign_token(
        secret,
        &UploadTokenClaims {
            upload_id,
            token_type: "upload".to_string(),
            iat: Utc::now().timestamp(),
            exp: expires_at.timestamp(),
        },
    )
}

/// Verifies an upload token against the session it claims to belong to.
///
/// Expiry is not checked here: the session row's `expires_at` is the
/// authority, so a stale token surfaces as `SESSION_EXPIRED` rather than
/// a generic authentication failure.
pub fn verify_upload_token(secret: &[u8], token: &str, upload_id: Uuid) -> Result<()> {
    let claims: UploadTokenClaims = decode_token(secret, token)?;
    if claims.token_type != "upload" {
        return Err(ServiceError::Authentication(format!(
            "wrong token type {:?}",
            claims.token_type
        )));
    }
    if claims.upload_id != upload_id {
        return Err(ServiceError::Authentication(
            "token bound to a different upload".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::Duration;

    fn keys() -> HmacKeys {
        let mut map = HashMap::new();
        map.insert("portal".to_string(), "portal-secret".to_string());
        map.insert("registry".to_string(), "registry-secret".to_string());
        HmacKeys::new(map)
    }

    fn hmac_headers(app: &str, sig: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-app-key", HeaderValue::from_str(app).unwrap());
        headers.insert("x-app-sig", HeaderValue::from_str(sig).unwrap());
        headers
    }

    #[test]
    fn test_hmac_roundtrip() {
        let keys = keys();
        let body = br#"{"filename":"e.pdf"}"#;
        let sig = keys.sign("portal", body).unwrap();
        let ctx = keys.verify(&hmac_headers("portal", &sig), body).unwrap();
        assert_eq!(ctx.app_key, "portal");
    }

    #[test]
    fn test_hmac_rejects_wrong_signature() {
        let keys = keys();
        let sig = keys.sign("portal", b"body-a").unwrap();
        assert!(keys.verify(&hmac_headers("portal", &sig), b"body-b").is_err());
    }

    #[test]
    fn test_hmac_unknown_app_fails_like_bad_signature() {
        let keys = keys();
        let known = keys
            .verify(&hmac_headers("portal", &"0".repeat(64)), b"x")
            .unwrap_err();
        let unknown = keys
            .verify(&hmac_headers("ghost", &"0".repeat(64)), b"x")
            .unwrap_err();
        // Same externally visible code for both causes.
        assert_eq!(known.code(), unknown.code());
        assert_eq!(known.status_code(), unknown.status_code());
    }

    #[test]
    fn test_hmac_rejects_length_mismatch() {
        let keys = keys();
        assert!(keys.verify(&hmac_headers("portal", "abcd"), b"x").is_err());
    }

    #[test]
    fn test_admin_gate() {
        let admin = AuthContext {
            app_key: "registry".to_string(),
            org_id: None,
            user_id: None,
        };
        let other = AuthContext {
            app_key: "portal".to_string(),
            org_id: None,
            user_id: None,
        };
        assert!(admin.require_admin().is_ok());
        assert!(other.require_admin().is_err());
    }

    fn bearer_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_bearer_roundtrip() {
        let secret = b"process-secret";
        let token = sign_token(
            secret,
            &BearerClaims {
                aud: AUDIENCE.to_string(),
                exp: (Utc::now() + Duration::minutes(5)).timestamp(),
                sub: Some("user-1".to_string()),
                org_id: Some("org-9".to_string()),
            },
        )
        .unwrap();

        let ctx = verify_bearer(secret, &bearer_headers(&token)).unwrap();
        assert_eq!(ctx.user_id.as_deref(), Some("user-1"));
        assert_eq!(ctx.org_id.as_deref(), Some("org-9"));
    }

    #[test]
    fn test_bearer_rejects_wrong_audience() {
        let secret = b"process-secret";
        let token = sign_token(
            secret,
            &BearerClaims {
                aud: "another-service".to_string(),
                exp: (Utc::now() + Duration::minutes(5)).timestamp(),
                sub: None,
                org_id: None,
            },
        )
        .unwrap();
        assert!(verify_bearer(secret, &bearer_headers(&token)).is_err());
    }

    #[test]
    fn test_bearer_rejects_expired() {
        let secret = b"process-secret";
        let token = sign_token(
            secret,
            &BearerClaims {
                aud: AUDIENCE.to_string(),
                exp: (Utc::now() - Duration::minutes(1)).timestamp(),
                sub: None,
                org_id: None,
            },
        )
        .unwrap();
        assert!(verify_bearer(secret, &bearer_headers(&token)).is_err());
    }

    #[test]
    fn test_bearer_rejects_wrong_secret() {
        let token = sign_token(
            b"secret-a",
            &BearerClaims {
                aud: AUDIENCE.to_string(),
                exp: (Utc::now() + Duration::minutes(5)).timestamp(),
                sub: None,
                org_id: None,
            },
        )
        .unwrap();
        assert!(verify_bearer(b"secret-b", &bearer_headers(&token)).is_err());
    }

    #[test]
    fn test_upload_token_roundtrip() {
        let secret = b"process-secret";
        let id = Uuid::new_v4();
        let token = issue_upload_token(secret, id, Utc::now() + Duration::minutes(5)).unwrap();
        verify_upload_token(secret, &token, id).unwrap();
    }

    #[test]
    fn test_upload_token_bound_to_session() {
        let secret = b"process-secret";
        let token =
            issue_upload_token(secret, Uuid::new_v4(), Utc::now() + Duration::minutes(5)).unwrap();
        assert!(verify_upload_token(secret, &token, Uuid::new_v4()).is_err());
    }
}
