//! Catalog queries.

use std::collections::BTreeMap;

use pressgate_core::PackageKind;
use pressgate_core::db::DatabaseError;

use super::db::GatewayDatabase;
use super::models::CatalogEntry;

/// Changes applied by [`GatewayDatabase::sync_catalog`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogDiff {
    /// Rows inserted or whose version changed.
    pub upserted: u64,
    /// Rows removed because their slug no longer exists on disk.
    pub removed: u64,
}

impl GatewayDatabase {
    /// Insert a catalog row or update its version.
    pub async fn upsert_catalog_entry(
        &self,
        kind: PackageKind,
        slug: &str,
        version: &str,
        now: i64,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO catalog (kind, slug, version, updated_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(kind, slug) DO UPDATE SET version = excluded.version, updated_at = excluded.updated_at",
        )
        .bind(kind.as_str())
        .bind(slug)
        .bind(version)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Get the catalog row for a slug, if any.
    pub async fn get_catalog_entry(
        &self,
        kind: PackageKind,
        slug: &str,
    ) -> Result<Option<CatalogEntry>, DatabaseError> {
        let entry = sqlx::query_as::<_, CatalogEntry>(
            "SELECT * FROM catalog WHERE kind = ? AND slug = ?",
        )
        .bind(kind.as_str())
        .bind(slug)
        .fetch_optional(self.pool())
        .await?;

        Ok(entry)
    }

    /// List the catalog for one kind ordered by slug.
    pub async fn list_catalog(&self, kind: PackageKind) -> Result<Vec<CatalogEntry>, DatabaseError> {
        let entries = sqlx::query_as::<_, CatalogEntry>(
            "SELECT * FROM catalog WHERE kind = ? ORDER BY slug",
        )
        .bind(kind.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(entries)
    }

    /// Make the catalog for `kind` mirror `observed` (slug -> version) in a
    /// single transaction: upsert every observed slug, delete every other.
    pub async fn sync_catalog(
        &self,
        kind: PackageKind,
        observed: &BTreeMap<String, String>,
        now: i64,
    ) -> Result<CatalogDiff, DatabaseError> {
        let mut tx = self.pool().begin().await?;
        let mut diff = CatalogDiff::default();

        let existing: Vec<(String, String)> =
            sqlx::query_as("SELECT slug, version FROM catalog WHERE kind = ?")
                .bind(kind.as_str())
                .fetch_all(&mut *tx)
                .await?;
        let existing: BTreeMap<String, String> = existing.into_iter().collect();

        for (slug, version) in observed {
            if existing.get(slug) == Some(version) {
                continue;
            }
            sqlx::query(
                "INSERT INTO catalog (kind, slug, version, updated_at) VALUES (?, ?, ?, ?) \
                 ON CONFLICT(kind, slug) DO UPDATE SET version = excluded.version, updated_at = excluded.updated_at",
            )
            .bind(kind.as_str())
            .bind(slug)
            .bind(version)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            diff.upserted += 1;
        }

        for slug in existing.keys().filter(|slug| !observed.contains_key(*slug)) {
            let result = sqlx::query("DELETE FROM catalog WHERE kind = ? AND slug = ?")
                .bind(kind.as_str())
                .bind(slug)
                .execute(&mut *tx)
                .await?;
            diff.removed += result.rows_affected();
        }

        tx.commit().await?;

        Ok(diff)
    }
}
