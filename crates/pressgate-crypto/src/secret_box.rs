//! Authenticated encryption of secrets at rest.
//!
//! Blob layout before base64: `[12-byte nonce][ciphertext + 16-byte tag]`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::CryptoError;

/// Domain separation for master-key derivation.
const KEY_DERIVATION_TAG: &[u8] = b"pressgate-host-key-v1";

/// Nonce size for ChaCha20-Poly1305.
pub const NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag size.
const TAG_SIZE: usize = 16;

/// Encrypts and decrypts short secrets under a per-deployment master key.
#[derive(Clone)]
pub struct SecretBox {
    cipher: ChaCha20Poly1305,
}

impl std::fmt::Debug for SecretBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBox")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl SecretBox {
    /// Derive the master key from an operator-supplied secret of any length.
    pub fn from_master_secret(secret: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(KEY_DERIVATION_TAG);
        hasher.update(secret.as_bytes());
        let digest = hasher.finalize();
        let mut key_bytes = [0u8; 32];
        key_bytes.copy_from_slice(&digest);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));
        key_bytes.zeroize();
        Self { cipher }
    }

    /// Encrypt a plaintext secret into an opaque base64 blob.
    ///
    /// Every call draws a fresh nonce, so encrypting the same value twice
    /// yields different blobs.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(blob))
    }

    /// Open a blob produced by [`SecretBox::encrypt`].
    ///
    /// Returns `None` for malformed base64, a truncated nonce or tag, a
    /// failed authentication check, or non-UTF-8 plaintext.
    pub fn decrypt(&self, blob: &str) -> Option<String> {
        let raw = STANDARD.decode(blob.trim()).ok()?;
        if raw.len() < NONCE_SIZE + TAG_SIZE {
            return None;
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .ok()?;
        String::from_utf8(plaintext).ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_box() -> SecretBox {
        SecretBox::from_master_secret("deployment-secret")
    }

    #[test]
    fn roundtrip() {
        let sb = test_box();
        for plaintext in ["", "abc123", "0123456789abcdef0123456789abcdef", "ünïcødé"] {
            let blob = sb.encrypt(plaintext).unwrap();
            assert_eq!(sb.decrypt(&blob).as_deref(), Some(plaintext));
        }
    }

    #[test]
    fn fresh_nonce_per_call() {
        let sb = test_box();
        let a = sb.encrypt("same").unwrap();
        let b = sb.encrypt("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn master_secret_length_is_irrelevant() {
        let short = SecretBox::from_master_secret("x");
        let long = SecretBox::from_master_secret(&"y".repeat(500));
        assert_eq!(short.decrypt(&short.encrypt("k").unwrap()).as_deref(), Some("k"));
        assert_eq!(long.decrypt(&long.encrypt("k").unwrap()).as_deref(), Some("k"));
    }

    #[test]
    fn wrong_master_secret_fails() {
        let blob = test_box().encrypt("abc123").unwrap();
        let other = SecretBox::from_master_secret("another-secret");
        assert!(other.decrypt(&blob).is_none());
    }

    #[test]
    fn truncated_blob_fails() {
        let sb = test_box();
        let blob = sb.encrypt("abc123").unwrap();
        let raw = STANDARD.decode(&blob).unwrap();

        let short_nonce = STANDARD.encode(&raw[..NONCE_SIZE - 1]);
        assert!(sb.decrypt(&short_nonce).is_none());

        let missing_tag_byte = STANDARD.encode(&raw[..raw.len() - 1]);
        assert!(sb.decrypt(&missing_tag_byte).is_none());
    }

    #[test]
    fn corrupted_blob_fails() {
        let sb = test_box();
        let blob = sb.encrypt("abc123").unwrap();
        let mut raw = STANDARD.decode(&blob).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert!(sb.decrypt(&STANDARD.encode(&raw)).is_none());
    }

    #[test]
    fn garbage_fails() {
        let sb = test_box();
        assert!(sb.decrypt("").is_none());
        assert!(sb.decrypt("not base64 !!").is_none());
        assert!(sb.decrypt("YWJj").is_none());
    }

    #[test]
    fn debug_is_redacted() {
        assert!(format!("{:?}", test_box()).contains("[REDACTED]"));
    }
}
