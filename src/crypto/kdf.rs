use anyhow::{Context, Result, anyhow};
use getrandom::fill;
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use zeroize::Zeroizing;

use super::{ALGORITHM, DEFAULT_ITERATIONS, KEY_LEN, KEY_LENS, Key};
use crate::error::CryptoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    iterations: u32,
    key_len: usize,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            // 256 bit
            key_len: KEY_LEN,
        }
    }
}

impl KdfParams {
    pub fn new(iterations: u32, key_len: usize) -> Result<Self> {
        let params = Self {
            iterations,
            key_len,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn key_len(&self) -> usize {
        self.key_len
    }

    pub fn validate(&self) -> Result<()> {
        if self.iterations < 1 {
            anyhow::bail!("pbkdf2 iteration count must be >= 1");
        }
        if self.key_len < 1 {
            anyhow::bail!("derived key length must be >= 1");
        }
        Ok(())
    }
}

/// Fill buffer with cryptographically secure random bytes
fn secure_random(buf: &mut [u8]) -> Result<()> {
    fill(buf).map_err(|_| anyhow!("OS random generator unavailable"))
}

/// Generate a random salt of exactly `size` bytes
pub fn random_salt(size: usize) -> Result<Vec<u8>> {
    let mut salt = vec![0u8; size];
    secure_random(&mut salt)?;
    Ok(salt)
}

/// Derive a key from a password with PBKDF2-HMAC-SHA1.
///
/// Deterministic: both peers derive the same key from the same password,
/// salt and parameters.
pub fn derive_key(password: &str, salt: &[u8], kdf: KdfParams) -> Result<Key> {
    kdf.validate().context("invalid PBKDF2 parameters")?;

    let mut key = Zeroizing::new(vec![0u8; kdf.key_len]);
    pbkdf2_hmac::<Sha1>(password.as_bytes(), salt, kdf.iterations, &mut key);

    Ok(Key::from(key))
}

/// Generate a random key for `algorithm` without involving a password.
pub fn random_key(algorithm: &str, key_len: usize) -> Result<Key> {
    if !algorithm.eq_ignore_ascii_case(ALGORITHM) {
        return Err(CryptoError::UnknownAlgorithm(algorithm.to_string()).into());
    }
    if !KEY_LENS.contains(&key_len) {
        return Err(CryptoError::InvalidKeyLength(key_len).into());
    }

    let mut key = Zeroizing::new(vec![0u8; key_len]);
    secure_random(&mut key)?;
    Ok(Key::from(key))
}
