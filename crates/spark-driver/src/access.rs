//! Access key derivation for the spark backend.
//!
//! The key is an HMAC-SHA256 keyed with `username:password` over a fixed
//! marker, base64 encoded with every non-word character removed. Only the
//! driver can compute it; relay and page never see the credential pair.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::DriverError;

type HmacSha256 = Hmac<Sha256>;

/// Message signed to produce the access key.
pub const ACCESS_KEY_MARKER: &[u8] = b"access-key";

/// Derive the access key for a username/password pair.
pub fn access_key(username: &str, password: &str) -> Result<String, DriverError> {
    let secret = format!("{}:{}", username, password);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| DriverError::Config(format!("cannot key HMAC: {}", e)))?;
    mac.update(ACCESS_KEY_MARKER);
    let digest = mac.finalize().into_bytes();

    Ok(STANDARD
        .encode(digest)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect())
}
