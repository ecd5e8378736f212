//! Token verification.
//!
//! A token is `hex(claims_json) "." hex(hmac_sha256_tag)`, signed with the
//! process-wide secret.  Claims carry the device identity and a unix-seconds
//! expiry.  Verification runs on every inbound frame, so a token that
//! expires mid-stream starts failing on the next frame.
//!
//! Minting lives with the external login service; `issue_token` exists so
//! the emulator and the test suites can produce credentials without it.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// Claims recovered from a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub device_id: String,
    /// Expiry, unix seconds.
    pub exp: i64,
}

/// Verifies presented tokens against the process-wide secret.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: Arc<str>,
}

impl TokenVerifier {
    pub fn new(secret: impl Into<Arc<str>>) -> Self {
        TokenVerifier {
            secret: secret.into(),
        }
    }

    /// Validate `token` and recover its claims.
    ///
    /// Returns `None` — never an error — when the token is malformed, its
    /// tag does not verify, or it has expired.
    pub fn verify(&self, token: &str) -> Option<TokenClaims> {
        let (claims_hex, tag_hex) = token.rsplit_once('.')?;
        let claims_bytes = hex::decode(claims_hex).ok()?;
        let tag = hex::decode(tag_hex).ok()?;

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).ok()?;
        mac.update(&claims_bytes);
        mac.verify_slice(&tag).ok()?;

        let claims: TokenClaims = serde_json::from_slice(&claims_bytes).ok()?;
        if claims.exp <= Utc::now().timestamp() {
            return None;
        }
        Some(claims)
    }
}

/// Mint a token for `device_id` expiring `ttl_secs` from now.
///
/// A negative `ttl_secs` mints an already-expired token (test use).
pub fn issue_token(secret: &str, device_id: &str, ttl_secs: i64) -> String {
    let claims = TokenClaims {
        device_id: device_id.to_owned(),
        exp: Utc::now().timestamp() + ttl_secs,
    };
    let claims_bytes = serde_json::to_vec(&claims).expect("claims always serialize");
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(&claims_bytes);
    let tag = mac.finalize().into_bytes();
    format!("{}.{}", hex::encode(claims_bytes), hex::encode(tag))
}
