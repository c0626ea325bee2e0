//! Update log queries.

use pressgate_core::db::DatabaseError;

use super::db::GatewayDatabase;
use super::models::{LogKind, LogStatus, UpdateLogEntry};

impl GatewayDatabase {
    /// Append an authentication outcome to the audit log.
    pub async fn append_update_log(
        &self,
        domain: &str,
        kind: LogKind,
        status: LogStatus,
        now: i64,
    ) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO update_logs (domain, kind, date, status) VALUES (?, ?, ?, ?)")
            .bind(domain)
            .bind(kind.as_str())
            .bind(now)
            .bind(status.as_str())
            .execute(self.pool())
            .await?;

        Ok(())
    }

    /// Most recent log row for a domain and kind.
    pub async fn latest_status(
        &self,
        domain: &str,
        kind: LogKind,
    ) -> Result<Option<UpdateLogEntry>, DatabaseError> {
        let entry = sqlx::query_as::<_, UpdateLogEntry>(
            "SELECT * FROM update_logs WHERE domain = ? AND kind = ? ORDER BY date DESC, id DESC LIMIT 1",
        )
        .bind(domain)
        .bind(kind.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(entry)
    }

    /// Most recent log row for every (domain, kind) pair.
    pub async fn latest_statuses(&self) -> Result<Vec<UpdateLogEntry>, DatabaseError> {
        let entries = sqlx::query_as::<_, UpdateLogEntry>(
            "SELECT l.* FROM update_logs l \
             WHERE l.id = ( \
                 SELECT i.id FROM update_logs i \
                 WHERE i.domain = l.domain AND i.kind = l.kind \
                 ORDER BY i.date DESC, i.id DESC LIMIT 1 \
             ) \
             ORDER BY l.domain, l.kind",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(entries)
    }

    /// Full log history for a domain, newest first.
    pub async fn list_update_logs(
        &self,
        domain: &str,
        limit: u32,
    ) -> Result<Vec<UpdateLogEntry>, DatabaseError> {
        let entries = sqlx::query_as::<_, UpdateLogEntry>(
            "SELECT * FROM update_logs WHERE domain = ? ORDER BY date DESC, id DESC LIMIT ?",
        )
        .bind(domain)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(entries)
    }
}
