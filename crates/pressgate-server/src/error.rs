//! Error type shared by the gateway components.

use pressgate_core::db::DatabaseError;
use pressgate_crypto::CryptoError;

/// Failures that are not protocol outcomes.
///
/// Anything surfacing as a `GatewayError` becomes a generic 500 at the HTTP
/// boundary; authentication and validation results are never errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid domain: {0:?}")]
    InvalidDomain(String),
}
