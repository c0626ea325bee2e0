//! Crypto error types.

/// Errors from cryptographic operations.
///
/// Decryption has no variant here: a blob that fails to open is reported
/// as `None` so callers treat it exactly like a key mismatch.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
}
