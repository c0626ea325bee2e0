//! Terminal outcomes of a gateway call.

use std::fmt;
use std::path::PathBuf;

use pressgate_core::PackageKind;

use super::request::RequestRejection;

/// A package file ready to be streamed to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    pub kind: PackageKind,
    pub slug: String,
    pub version: String,
    pub file_name: String,
    pub path: PathBuf,
}

/// What the gateway decided. Transport layers map each variant to a status.
#[derive(Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    /// A strictly newer package exists on disk.
    UpdateAvailable(PackageRef),
    /// Authenticated, but nothing newer to hand out.
    NoUpdate,
    /// Plaintext key for the auth operation.
    KeyDelivered(String),
    /// Malformed input. Never counted against the caller.
    BadRequest(RequestRejection),
    /// Blocked address, wrong verb, or failed authentication.
    Forbidden,
}

impl fmt::Debug for GatewayOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpdateAvailable(package) => f.debug_tuple("UpdateAvailable").field(package).finish(),
            Self::NoUpdate => f.write_str("NoUpdate"),
            Self::KeyDelivered(_) => f.write_str("KeyDelivered([REDACTED])"),
            Self::BadRequest(reason) => f.debug_tuple("BadRequest").field(reason).finish(),
            Self::Forbidden => f.write_str("Forbidden"),
        }
    }
}
