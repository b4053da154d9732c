use anyhow::{Context, Result};
use base64::{Engine, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};

/// One-way SHA-256 digest of `data`, Base64 encoded.
///
/// Used to store and compare password-equivalent credentials.
pub fn hash(data: impl AsRef<[u8]>) -> String {
    STANDARD.encode(Sha256::digest(data.as_ref()))
}

/// Lowercase hex encoding of raw bytes.
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

pub fn from_hex(text: &str) -> Result<Vec<u8>> {
    hex::decode(text.trim()).context("invalid hex string")
}
