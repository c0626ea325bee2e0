//! Shared-secret generation and comparison.

use rand::RngCore;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;

/// Length of a generated shared secret in hex characters.
pub const SHARED_SECRET_LEN: usize = 32;

/// Generate a fresh shared secret: 16 bytes from the OS RNG, hex-encoded.
pub fn generate_shared_secret() -> String {
    let mut bytes = [0u8; SHARED_SECRET_LEN / 2];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Compare two strings without leaking the position of the first mismatch.
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
