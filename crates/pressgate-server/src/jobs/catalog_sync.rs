//! Directory-to-catalog reconciliation.
//!
//! The catalog is a derived view of the storage roots: every archive named
//! `{slug}_{version}.zip` yields one row per slug, and rows for slugs no
//! longer on disk are dropped.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use pressgate_core::PackageKind;
use pressgate_core::validate::parse_archive_name;
use pressgate_core::version::is_newer;
use tracing::{debug, info};

use super::JobError;
use crate::gateway::StorageRoots;
use crate::ledger::AttemptLedger;
use crate::storage::GatewayDatabase;

/// Counters from one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Distinct slugs found across both roots.
    pub packages: usize,
    pub upserted: u64,
    pub removed: u64,
    /// Ledger records dropped by housekeeping.
    pub purged: u64,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} packages, {} updated, {} removed, {} ledger records purged",
            self.packages, self.upserted, self.removed, self.purged
        )
    }
}

#[derive(Debug, Clone)]
pub struct CatalogSync {
    db: GatewayDatabase,
    ledger: AttemptLedger,
    roots: StorageRoots,
}

impl CatalogSync {
    pub const fn new(db: GatewayDatabase, ledger: AttemptLedger, roots: StorageRoots) -> Self {
        Self { db, ledger, roots }
    }

    /// Reconcile both catalogs with disk, then run ledger housekeeping.
    ///
    /// Both roots are scanned before anything is written, so an unreadable
    /// root aborts the run with the catalog untouched.
    pub async fn run(&self, now: i64) -> Result<SyncReport, JobError> {
        let mut scans = Vec::with_capacity(PackageKind::ALL.len());
        for kind in PackageKind::ALL {
            scans.push((kind, scan_root(self.roots.root(kind)).await?));
        }

        let mut report = SyncReport::default();
        for (kind, observed) in scans {
            let diff = self.db.sync_catalog(kind, &observed, now).await?;
            info!(
                kind = %kind,
                packages = observed.len(),
                upserted = diff.upserted,
                removed = diff.removed,
                "Catalog synchronised"
            );
            report.packages += observed.len();
            report.upserted += diff.upserted;
            report.removed += diff.removed;
        }

        report.purged = self.ledger.purge_stale(now).await?;
        Ok(report)
    }
}

/// Newest archive version per slug under `root`.
///
/// Files are visited in lexicographic order; anything not shaped like a
/// package archive is ignored.
async fn scan_root(root: &Path) -> Result<BTreeMap<String, String>, JobError> {
    let unreadable = |source| JobError::StorageRoot {
        path: root.to_path_buf(),
        source,
    };

    let mut dir = tokio::fs::read_dir(root).await.map_err(unreadable)?;
    let mut names = Vec::new();
    while let Some(entry) = dir.next_entry().await.map_err(unreadable)? {
        if !entry.file_type().await.map_err(unreadable)?.is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(name) => debug!(name = ?name, "Skipping non UTF-8 file name"),
        }
    }
    names.sort();

    let mut newest: BTreeMap<String, String> = BTreeMap::new();
    for name in &names {
        let Some((slug, version)) = parse_archive_name(name) else {
            debug!(name, "Skipping file that is not a package archive");
            continue;
        };
        match newest.get(slug) {
            Some(current) if !is_newer(version, current) => {}
            _ => {
                newest.insert(slug.to_string(), version.to_string());
            }
        }
    }
    Ok(newest)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use pressgate_core::config::LedgerConfig;
    use tempfile::TempDir;

    use super::*;

    const NOW: i64 = 1_750_000_000;
    const DAY: i64 = 24 * 60 * 60;

    struct Fixture {
        sync: CatalogSync,
        db: GatewayDatabase,
        storage: TempDir,
    }

    async fn fixture() -> Fixture {
        let db = GatewayDatabase::open_in_memory().await.unwrap();
        let storage = tempfile::tempdir().unwrap();
        let roots = StorageRoots {
            plugin_dir: storage.path().join("plugins"),
            theme_dir: storage.path().join("themes"),
        };
        std::fs::create_dir_all(&roots.plugin_dir).unwrap();
        std::fs::create_dir_all(&roots.theme_dir).unwrap();
        let ledger = AttemptLedger::new(db.clone(), LedgerConfig::default());
        Fixture {
            sync: CatalogSync::new(db.clone(), ledger, roots),
            db,
            storage,
        }
    }

    impl Fixture {
        fn touch(&self, dir: &str, name: &str) {
            std::fs::write(self.storage.path().join(dir).join(name), b"zip").unwrap();
        }

        async fn catalog(&self, kind: PackageKind) -> Vec<(String, String)> {
            self.db
                .list_catalog(kind)
                .await
                .unwrap()
                .into_iter()
                .map(|e| (e.slug, e.version))
                .collect()
        }
    }

    fn rows(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(s, v)| ((*s).to_string(), (*v).to_string()))
            .collect()
    }

    #[tokio::test]
    async fn mirrors_storage_roots() {
        let fx = fixture().await;
        fx.touch("plugins", "foo_1.0.zip");
        fx.touch("plugins", "foo_2.0.zip");
        fx.touch("plugins", "bar_0.1.zip");
        fx.touch("themes", "twentyten_1.5.zip");
        fx.db
            .upsert_catalog_entry(PackageKind::Plugin, "gone", "9.9", NOW - DAY)
            .await
            .unwrap();

        let report = fx.sync.run(NOW).await.unwrap();

        assert_eq!(
            fx.catalog(PackageKind::Plugin).await,
            rows(&[("bar", "0.1"), ("foo", "2.0")])
        );
        assert_eq!(
            fx.catalog(PackageKind::Theme).await,
            rows(&[("twentyten", "1.5")])
        );
        assert_eq!(
            report,
            SyncReport {
                packages: 3,
                upserted: 3,
                removed: 1,
                purged: 0,
            }
        );
    }

    #[tokio::test]
    async fn newest_version_wins_over_scan_order() {
        let fx = fixture().await;
        // "foo_10.0" sorts before "foo_9.0".
        fx.touch("plugins", "foo_9.0.zip");
        fx.touch("plugins", "foo_10.0.zip");

        fx.sync.run(NOW).await.unwrap();
        assert_eq!(fx.catalog(PackageKind::Plugin).await, rows(&[("foo", "10.0")]));
    }

    #[tokio::test]
    async fn ignores_foreign_files() {
        let fx = fixture().await;
        fx.touch("plugins", "readme.txt");
        fx.touch("plugins", "noversion.zip");
        fx.touch("plugins", "bad_1.x.zip");
        fx.touch("plugins", "my_plugin_3.2.1.zip");
        std::fs::create_dir(fx.storage.path().join("plugins").join("nested_1.0.zip")).unwrap();

        fx.sync.run(NOW).await.unwrap();
        assert_eq!(
            fx.catalog(PackageKind::Plugin).await,
            rows(&[("my_plugin", "3.2.1")])
        );
    }

    #[tokio::test]
    async fn second_run_is_idempotent() {
        let fx = fixture().await;
        fx.touch("plugins", "foo_1.0.zip");

        fx.sync.run(NOW).await.unwrap();
        let report = fx.sync.run(NOW + 60).await.unwrap();
        assert_eq!(report.upserted, 0);
        assert_eq!(report.removed, 0);
    }

    #[tokio::test]
    async fn missing_root_leaves_catalog_untouched() {
        let fx = fixture().await;
        fx.touch("plugins", "foo_2.0.zip");
        fx.db
            .upsert_catalog_entry(PackageKind::Plugin, "foo", "1.0", NOW - DAY)
            .await
            .unwrap();
        std::fs::remove_dir(fx.storage.path().join("themes")).unwrap();

        let err = fx.sync.run(NOW).await.unwrap_err();
        assert!(matches!(err, JobError::StorageRoot { .. }), "got {err:?}");
        assert_eq!(fx.catalog(PackageKind::Plugin).await, rows(&[("foo", "1.0")]));
    }

    #[tokio::test]
    async fn runs_ledger_housekeeping() {
        let fx = fixture().await;
        for _ in 0..3 {
            fx.db
                .record_failed_attempt("198.51.100.9", 3, NOW - 8 * DAY)
                .await
                .unwrap();
        }
        fx.db
            .record_failed_attempt("198.51.100.10", 3, NOW - 4 * DAY)
            .await
            .unwrap();
        fx.db
            .record_failed_attempt("198.51.100.11", 3, NOW - DAY)
            .await
            .unwrap();

        let report = fx.sync.run(NOW).await.unwrap();
        assert_eq!(report.purged, 2);
        assert!(fx.db.get_attempt("198.51.100.9").await.unwrap().is_none());
        assert!(fx.db.get_attempt("198.51.100.11").await.unwrap().is_some());
    }
}
