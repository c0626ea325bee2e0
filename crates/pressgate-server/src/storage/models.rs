//! Data models for `PressGate` gateway storage.

use std::fmt;

use pressgate_core::PackageKind;
use serde::{Deserialize, Serialize};

/// A remote domain allowed to pull updates.
///
/// `key` and `old_key` are ciphertext blobs; the plaintext secret never
/// touches this struct.
#[derive(Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Host {
    pub domain: String,
    pub key: String,
    pub old_key: Option<String>,
    pub send_auth: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("domain", &self.domain)
            .field("key", &"[ENCRYPTED]")
            .field("rotation_pending", &self.old_key.is_some())
            .field("send_auth", &self.send_auth)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CatalogEntry {
    pub kind: String,
    pub slug: String,
    pub version: String,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttemptRecord {
    pub ip: String,
    pub login_attempts: i64,
    pub blacklisted: bool,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UpdateLogEntry {
    pub id: i64,
    pub domain: String,
    pub kind: String,
    pub date: i64,
    pub status: String,
}

/// Which gateway operation an audit row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Package(PackageKind),
    Auth,
}

impl LogKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Package(kind) => kind.as_str(),
            Self::Auth => "auth",
        }
    }
}

impl From<PackageKind> for LogKind {
    fn from(kind: PackageKind) -> Self {
        Self::Package(kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStatus {
    Success,
    Failed,
}

impl LogStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}
