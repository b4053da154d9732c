//! Cryptographic primitives for the transport.
//!
//! Provides password-based key derivation, the stream cipher envelope and
//! the credential verification hash.

pub mod digest;
pub mod envelope;
pub mod kdf;
pub mod key;

pub use digest::{from_hex, hash, to_hex};
pub use envelope::{
    DecryptingReader, EncryptingWriter, decrypt, encrypt, wrap_for_decryption,
    wrap_for_encryption,
};
pub use kdf::{KdfParams, derive_key, random_key, random_salt};
pub use key::Key;

/// Block cipher used by the envelope.
pub const ALGORITHM: &str = "Camellia";
/// Default key length (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
/// Key lengths the cipher accepts (128, 192 and 256 bits).
pub const KEY_LENS: [usize; 3] = [16, 24, 32];
/// Cipher block length (16 bytes).
pub const BLOCK_LEN: usize = 16;
/// Default PBKDF2 iteration count.
pub const DEFAULT_ITERATIONS: u32 = 1000;
/// Salt length used when the caller has no preference (16 bytes).
pub const SALT_LEN: usize = 16;
