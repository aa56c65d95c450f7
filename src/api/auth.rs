//! Shared-secret check for the trigger route

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};

/// Check `Authorization: Bearer <secret>` against the configured secret
///
/// No secret configured allows the request, unless the server requires one,
/// in which case it is a configuration error.
pub fn authorize_trigger(config: &AppConfig, headers: &HeaderMap) -> Result<()> {
    let secret = match config.trigger_secret.as_deref() {
        Some(secret) => secret,
        None if config.require_secret => {
            return Err(AppError::Config("CRON_SECRET is not defined".to_string()));
        }
        None => return Ok(()),
    };

    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let expected = format!("Bearer {}", secret);
    if digest_eq(provided.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(AppError::Auth("Invalid or missing trigger secret".to_string()))
    }
}

/// Compare fixed-size digests in constant time
fn digest_eq(a: &[u8], b: &[u8]) -> bool {
    let a = Sha256::digest(a);
    let b = Sha256::digest(b);
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
