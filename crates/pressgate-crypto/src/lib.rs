//! `PressGate` Secret Encryption Library
//!
//! Keeps per-domain shared secrets encrypted at rest.
//!
//! ## Crypto primitives
//!
//! - **Master key**: SHA-256 over a domain tag and the operator-supplied
//!   secret, so any secret length yields a 32-byte key
//! - **Encryption**: ChaCha20-Poly1305 AEAD with a fresh random 12-byte nonce
//!   per call; the nonce is prepended to the ciphertext and the pair is
//!   base64-encoded as one opaque blob
//! - **Shared secrets**: 16 random bytes rendered as 32 hex characters

pub mod error;
pub mod secret_box;
pub mod secrets;

pub use error::CryptoError;
pub use secret_box::{NONCE_SIZE, SecretBox};
pub use secrets::{SHARED_SECRET_LEN, constant_time_str_eq, generate_shared_secret};
