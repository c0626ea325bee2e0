//! The update run: check, download, install, verify.

use std::fmt;
use std::future::Future;
use std::path::Path;

use pressgate_core::PackageKind;
use pressgate_core::db::unix_timestamp;
use pressgate_core::version::is_newer;
use tracing::{info, warn};

use crate::client::{DownloadedPackage, PackageCheck, PackageSource};
use crate::error::ClientError;
use crate::status::RunStatus;

/// A locally installed plugin or theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledItem {
    pub slug: String,
    pub version: String,
}

/// Platform hooks for one kind of package.
pub trait UpdateTarget {
    fn kind(&self) -> PackageKind;

    /// Everything currently installed.
    fn installed(&self) -> Vec<InstalledItem>;

    /// Install the archive at `archive` over the existing `slug`.
    fn install(
        &mut self,
        slug: &str,
        archive: &Path,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Version installed right now, re-read from the platform.
    fn current_version(&self, slug: &str) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    NoUpdate,
    Updated { from: String, to: String },
    Unauthorized,
    /// Transport, install or verification failure.
    Failed(String),
}

impl ItemOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::NoUpdate | Self::Updated { .. })
    }
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoUpdate => f.write_str("up to date"),
            Self::Updated { from, to } => write!(f, "updated {from} -> {to}"),
            Self::Unauthorized => f.write_str("unauthorized"),
            Self::Failed(reason) => f.write_str(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub slug: String,
    pub outcome: ItemOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub kind: PackageKind,
    pub items: Vec<ItemReport>,
}

impl RunReport {
    /// True only if every item is up to date or verifiably updated.
    pub fn success(&self) -> bool {
        self.items.iter().all(|item| item.outcome.is_success())
    }

    pub fn updated(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item.outcome, ItemOutcome::Updated { .. }))
            .count()
    }

    pub fn message(&self) -> String {
        let failed: Vec<String> = self
            .items
            .iter()
            .filter(|item| !item.outcome.is_success())
            .map(|item| format!("{} ({})", item.slug, item.outcome))
            .collect();
        if failed.is_empty() {
            format!(
                "{} {}s checked, {} updated",
                self.items.len(),
                self.kind,
                self.updated()
            )
        } else {
            format!(
                "{} of {} {} updates failed: {}",
                failed.len(),
                self.items.len(),
                self.kind,
                failed.join(", ")
            )
        }
    }

    pub fn status(&self) -> RunStatus {
        RunStatus {
            success: self.success(),
            message: self.message(),
            finished_at: unix_timestamp(),
        }
    }
}

/// Check every installed item against `source` and install what is newer.
///
/// An unconfigured source aborts before anything is touched. Item failures
/// never stop the run; they only mark it failed. Either way the run's
/// [`RunStatus`] is written to `status_path`.
pub async fn run_updates<S, T>(
    source: &S,
    target: &mut T,
    status_path: &Path,
) -> Result<RunReport, ClientError>
where
    S: PackageSource + Sync,
    T: UpdateTarget + Send,
{
    let kind = target.kind();
    if !source.is_configured() {
        warn!(%kind, "Update run skipped: gateway not configured");
        let status = RunStatus {
            success: false,
            message: format!("{kind} updates skipped: {}", ClientError::NotConfigured),
            finished_at: unix_timestamp(),
        };
        save_status(&status, status_path);
        return Err(ClientError::NotConfigured);
    }

    let mut items = Vec::new();
    for item in target.installed() {
        let outcome = match source.check(kind, &item.slug, &item.version).await {
            Ok(PackageCheck::NoUpdate) => ItemOutcome::NoUpdate,
            Ok(PackageCheck::UpdateAvailable(package)) => {
                install_verified(target, &item, package).await
            }
            Err(ClientError::Unauthorized) => ItemOutcome::Unauthorized,
            Err(e) => ItemOutcome::Failed(e.to_string()),
        };

        if outcome.is_success() {
            info!(%kind, slug = %item.slug, %outcome, "Item processed");
        } else {
            warn!(%kind, slug = %item.slug, %outcome, "Item failed");
        }
        items.push(ItemReport {
            slug: item.slug,
            outcome,
        });
    }

    let report = RunReport { kind, items };
    info!(%kind, success = report.success(), updated = report.updated(), "Update run finished");
    save_status(&report.status(), status_path);
    Ok(report)
}

/// A status that cannot be written must not discard the run's report.
fn save_status(status: &RunStatus, path: &Path) {
    if let Err(e) = status.save(path) {
        warn!(path = %path.display(), error = %e, "Failed to save run status");
    }
}

async fn install_verified<T: UpdateTarget>(
    target: &mut T,
    item: &InstalledItem,
    package: DownloadedPackage,
) -> ItemOutcome {
    let installed = target.install(&item.slug, package.path()).await;
    // The temporary archive goes away whatever the installer did.
    drop(package);
    if let Err(e) = installed {
        return ItemOutcome::Failed(e.to_string());
    }

    match target.current_version(&item.slug) {
        Some(now) if is_newer(&now, &item.version) => ItemOutcome::Updated {
            from: item.version.clone(),
            to: now,
        },
        Some(now) => ItemOutcome::Failed(format!("install did not bump version ({now})")),
        None => ItemOutcome::Failed("missing after install".to_string()),
    }
}
