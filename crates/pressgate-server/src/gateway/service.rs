//! Request handling for the update gateway.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use pressgate_core::db::unix_timestamp;
use pressgate_core::validate::archive_name;
use pressgate_core::version::is_newer;
use pressgate_core::{Config, PackageKind};
use pressgate_crypto::SecretBox;
use tracing::{debug, info, warn};

use super::outcome::{GatewayOutcome, PackageRef};
use super::request::{AuthRequest, GatewayRequest, PackageCheckRequest};
use crate::error::GatewayError;
use crate::keystore::KeyStore;
use crate::ledger::AttemptLedger;
use crate::storage::{GatewayDatabase, LogKind, LogStatus};

/// Who is calling and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub ip: IpAddr,
    /// Whether the transport verb was the read-only one (HTTP GET).
    pub read_only: bool,
}

/// Directories holding `{slug}_{version}.zip` archives.
#[derive(Debug, Clone)]
pub struct StorageRoots {
    pub plugin_dir: PathBuf,
    pub theme_dir: PathBuf,
}

impl StorageRoots {
    pub fn from_config(config: &Config) -> Self {
        Self {
            plugin_dir: config.plugin_dir.clone(),
            theme_dir: config.theme_dir.clone(),
        }
    }

    pub fn root(&self, kind: PackageKind) -> &Path {
        match kind {
            PackageKind::Plugin => &self.plugin_dir,
            PackageKind::Theme => &self.theme_dir,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateGateway {
    db: GatewayDatabase,
    keys: KeyStore,
    ledger: AttemptLedger,
    roots: StorageRoots,
}

impl UpdateGateway {
    pub const fn new(
        db: GatewayDatabase,
        keys: KeyStore,
        ledger: AttemptLedger,
        roots: StorageRoots,
    ) -> Self {
        Self {
            db,
            keys,
            ledger,
            roots,
        }
    }

    /// Wire every component from a loaded configuration.
    pub fn from_config(db: GatewayDatabase, config: &Config) -> Self {
        let keys = KeyStore::new(db.clone(), SecretBox::from_master_secret(&config.master_secret));
        let ledger = AttemptLedger::new(db.clone(), config.ledger.clone());
        Self::new(db, keys, ledger, StorageRoots::from_config(config))
    }

    pub const fn keys(&self) -> &KeyStore {
        &self.keys
    }

    pub const fn ledger(&self) -> &AttemptLedger {
        &self.ledger
    }

    pub async fn handle(
        &self,
        caller: &Caller,
        params: &HashMap<String, String>,
    ) -> Result<GatewayOutcome, GatewayError> {
        self.handle_at(caller, params, unix_timestamp()).await
    }

    /// Handle one call at time `now`.
    ///
    /// Order matters: verb and block checks, then syntax, then credentials.
    /// Only credential failures reach the ledger.
    pub async fn handle_at(
        &self,
        caller: &Caller,
        params: &HashMap<String, String>,
        now: i64,
    ) -> Result<GatewayOutcome, GatewayError> {
        let ip = caller.ip.to_string();

        if !caller.read_only {
            debug!(ip, "Rejected non-read-only verb");
            return Ok(GatewayOutcome::Forbidden);
        }
        if self.ledger.is_blocked(&ip, now).await? {
            info!(ip, "Rejected blocked address");
            return Ok(GatewayOutcome::Forbidden);
        }

        let request = match GatewayRequest::parse(params) {
            Ok(request) => request,
            Err(rejection) => {
                debug!(ip, %rejection, "Malformed request");
                return Ok(GatewayOutcome::BadRequest(rejection));
            }
        };

        match request {
            GatewayRequest::PackageCheck(check) => self.check_package(&ip, &check, now).await,
            GatewayRequest::Auth(auth) => self.authorize(&ip, &auth, now).await,
        }
    }

    async fn check_package(
        &self,
        ip: &str,
        request: &PackageCheckRequest,
        now: i64,
    ) -> Result<GatewayOutcome, GatewayError> {
        let log_kind = LogKind::from(request.kind);

        if !self.keys.verify(&request.domain, &request.key).await? {
            self.reject(ip, &request.domain, log_kind, now).await?;
            return Ok(GatewayOutcome::Forbidden);
        }

        let outcome = match self.newer_package(request).await? {
            Some(package) => {
                info!(
                    domain = %request.domain,
                    kind = %request.kind,
                    slug = %request.slug,
                    from = %request.version,
                    to = %package.version,
                    "Serving update"
                );
                GatewayOutcome::UpdateAvailable(package)
            }
            None => GatewayOutcome::NoUpdate,
        };

        self.db
            .append_update_log(&request.domain, log_kind, LogStatus::Success, now)
            .await?;

        Ok(outcome)
    }

    /// The catalog's package for this slug if it is strictly newer than what
    /// the caller runs and its archive is actually on disk.
    async fn newer_package(
        &self,
        request: &PackageCheckRequest,
    ) -> Result<Option<PackageRef>, GatewayError> {
        let Some(entry) = self
            .db
            .get_catalog_entry(request.kind, &request.slug)
            .await?
        else {
            return Ok(None);
        };
        if !is_newer(&entry.version, &request.version) {
            return Ok(None);
        }

        let file_name = archive_name(&request.slug, &entry.version);
        let path = self.roots.root(request.kind).join(&file_name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(PackageRef {
                kind: request.kind,
                slug: request.slug.clone(),
                version: entry.version,
                file_name,
                path,
            })),
            Ok(_) => {
                warn!(path = %path.display(), "Catalogued archive is not a regular file");
                Ok(None)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "Catalogued archive missing; catalog is stale");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn authorize(
        &self,
        ip: &str,
        request: &AuthRequest,
        now: i64,
    ) -> Result<GatewayOutcome, GatewayError> {
        let delivered = match &request.old_key {
            None => {
                if !self.keys.host_exists(&request.domain).await? {
                    self.reject(ip, &request.domain, LogKind::Auth, now).await?;
                    return Ok(GatewayOutcome::Forbidden);
                }
                let key = self.keys.take_auth_delivery(&request.domain, now).await?;
                if key.is_none() {
                    info!(domain = %request.domain, ip, "Auth delivery not enabled for host");
                    self.db
                        .append_update_log(&request.domain, LogKind::Auth, LogStatus::Failed, now)
                        .await?;
                    return Ok(GatewayOutcome::Forbidden);
                }
                key
            }
            Some(old_key) => self.keys.rotate(&request.domain, old_key, now).await?,
        };

        let Some(key) = delivered else {
            self.reject(ip, &request.domain, LogKind::Auth, now).await?;
            return Ok(GatewayOutcome::Forbidden);
        };

        self.db
            .append_update_log(&request.domain, LogKind::Auth, LogStatus::Success, now)
            .await?;
        Ok(GatewayOutcome::KeyDelivered(key))
    }

    /// Authentication failure: audit it and count it against the address.
    async fn reject(
        &self,
        ip: &str,
        domain: &str,
        kind: LogKind,
        now: i64,
    ) -> Result<(), GatewayError> {
        warn!(domain, ip, kind = kind.as_str(), "Authentication failed");
        self.db
            .append_update_log(domain, kind, LogStatus::Failed, now)
            .await?;
        self.ledger.record_failure(ip, now).await?;
        Ok(())
    }
}
