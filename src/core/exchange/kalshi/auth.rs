//! Exchange auth: locally-signed JWT with a per-process cache.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{Error, Result};

/// API credentials for the exchange venue.
#[derive(Debug, Clone)]
pub struct KalshiCredentials {
    pub key_id: String,
    pub private_key_pem: String,
}

impl KalshiCredentials {
    /// Read credentials from `KALSHI_API_KEY_ID` / `KALSHI_PRIVATE_KEY`.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let key_id = std::env::var("KALSHI_API_KEY_ID").ok()?;
        let private_key_pem = std::env::var("KALSHI_PRIVATE_KEY").ok()?;
        Some(Self {
            key_id,
            private_key_pem,
        })
    }
}

#[derive(Debug, Serialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

const TOKEN_LIFETIME_SECS: i64 = 3600;
/// Tokens are refreshed this long before they actually expire.
const REFRESH_WINDOW_SECS: i64 = 60;

/// Per-process token cache; written once per lifetime window.
static TOKEN_CACHE: Lazy<Mutex<Option<CachedToken>>> = Lazy::new(|| Mutex::new(None));

fn mint(credentials: &KalshiCredentials, now: DateTime<Utc>) -> Result<CachedToken> {
    let expires_at = now + Duration::seconds(TOKEN_LIFETIME_SECS);
    let claims = Claims {
        sub: credentials.key_id.clone(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };
    let key = EncodingKey::from_rsa_pem(credentials.private_key_pem.as_bytes())
        .map_err(|e| Error::Auth(format!("bad private key: {e}")))?;
    let token = encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map_err(|e| Error::Auth(format!("jwt signing failed: {e}")))?;
    Ok(CachedToken { token, expires_at })
}

/// Get a bearer token, minting a fresh one when the cached token is missing
/// or within the refresh window of expiry.
pub fn bearer_token(credentials: &KalshiCredentials) -> Result<String> {
    let now = Utc::now();
    let mut cache = TOKEN_CACHE.lock();
    if let Some(cached) = cache.as_ref() {
        let remaining = cached.expires_at.signed_duration_since(now).num_seconds();
        if remaining > REFRESH_WINDOW_SECS {
            return Ok(cached.token.clone());
        }
    }
    let fresh = mint(credentials, now)?;
    let token = fresh.token.clone();
    *cache = Some(fresh);
    Ok(token)
}

#[cfg(test)]
pub(crate) fn reset_cache() {
    *TOKEN_CACHE.lock() = None;
}
