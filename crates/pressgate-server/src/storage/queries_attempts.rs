//! Attempt ledger queries.

use pressgate_core::db::DatabaseError;

use super::db::GatewayDatabase;
use super::models::AttemptRecord;

impl GatewayDatabase {
    /// Count one authentication failure against `ip`.
    ///
    /// A single upsert statement so concurrent failures from the same
    /// address never lose an increment. The record becomes blacklisted once
    /// the count reaches `max_attempts`.
    pub async fn record_failed_attempt(
        &self,
        ip: &str,
        max_attempts: i64,
        now: i64,
    ) -> Result<AttemptRecord, DatabaseError> {
        let record = sqlx::query_as::<_, AttemptRecord>(
            "INSERT INTO attempts (ip, login_attempts, blacklisted, timestamp) \
             VALUES (?1, 1, CASE WHEN 1 >= ?2 THEN 1 ELSE 0 END, ?3) \
             ON CONFLICT(ip) DO UPDATE SET \
                 login_attempts = attempts.login_attempts + 1, \
                 blacklisted = CASE WHEN attempts.login_attempts + 1 >= ?2 THEN 1 ELSE 0 END, \
                 timestamp = ?3 \
             RETURNING ip, login_attempts, blacklisted, timestamp",
        )
        .bind(ip)
        .bind(max_attempts)
        .bind(now)
        .fetch_one(self.pool())
        .await?;

        Ok(record)
    }

    /// Get the ledger record for an address.
    pub async fn get_attempt(&self, ip: &str) -> Result<Option<AttemptRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, AttemptRecord>("SELECT * FROM attempts WHERE ip = ?")
            .bind(ip)
            .fetch_optional(self.pool())
            .await?;

        Ok(record)
    }

    /// Reset a blacklisted record whose block started before `blocked_before`.
    ///
    /// Conditional on the record still being blocked and stale, so a fresh
    /// block written concurrently is never cleared.
    pub async fn clear_expired_block(
        &self,
        ip: &str,
        blocked_before: i64,
        now: i64,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE attempts SET login_attempts = 0, blacklisted = 0, timestamp = ? \
             WHERE ip = ? AND blacklisted = 1 AND timestamp < ?",
        )
        .bind(now)
        .bind(ip)
        .bind(blocked_before)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete blocked records older than `blocked_before` and unblocked
    /// records untouched since `unblocked_before`.
    pub async fn purge_attempts(
        &self,
        blocked_before: i64,
        unblocked_before: i64,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "DELETE FROM attempts \
             WHERE (blacklisted = 1 AND timestamp < ?) OR (blacklisted = 0 AND timestamp < ?)",
        )
        .bind(blocked_before)
        .bind(unblocked_before)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    /// Remove the record for an address.
    pub async fn delete_attempt(&self, ip: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM attempts WHERE ip = ?")
            .bind(ip)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Blacklisted records whose block started at or after `since`.
    pub async fn list_blocked_attempts(
        &self,
        since: i64,
    ) -> Result<Vec<AttemptRecord>, DatabaseError> {
        let records = sqlx::query_as::<_, AttemptRecord>(
            "SELECT * FROM attempts WHERE blacklisted = 1 AND timestamp >= ? ORDER BY timestamp DESC",
        )
        .bind(since)
        .fetch_all(self.pool())
        .await?;

        Ok(records)
    }
}
