//! Per-address authentication failure ledger.
//!
//! Each address moves through three states:
//!
//! - `Clean`: no record, or fewer than `max_attempts` failures
//! - `Blocked`: blacklisted and still inside the block window
//! - `ExpiredBlock`: blacklisted but the window has elapsed; collapses to
//!   `Clean` the next time the address is checked
//!
//! Stale records are purged only by the housekeeping job, never on the
//! authentication path.

use pressgate_core::config::LedgerConfig;
use pressgate_core::db::DatabaseError;
use tracing::{info, warn};

use crate::storage::{AttemptRecord, GatewayDatabase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerState {
    Clean,
    Blocked,
    ExpiredBlock,
}

impl LedgerState {
    /// Classify a record at time `now`.
    pub fn of(record: Option<&AttemptRecord>, now: i64, block_window_secs: i64) -> Self {
        match record {
            Some(r) if r.blacklisted && now - r.timestamp <= block_window_secs => Self::Blocked,
            Some(r) if r.blacklisted => Self::ExpiredBlock,
            _ => Self::Clean,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttemptLedger {
    db: GatewayDatabase,
    config: LedgerConfig,
}

impl AttemptLedger {
    pub const fn new(db: GatewayDatabase, config: LedgerConfig) -> Self {
        Self { db, config }
    }

    pub const fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Count an authentication failure from `ip`.
    pub async fn record_failure(&self, ip: &str, now: i64) -> Result<AttemptRecord, DatabaseError> {
        let record = self
            .db
            .record_failed_attempt(ip, self.config.max_attempts, now)
            .await?;
        if record.blacklisted && record.login_attempts == self.config.max_attempts {
            warn!(ip, attempts = record.login_attempts, "Address blocked");
        }
        Ok(record)
    }

    /// Whether `ip` is currently blocked.
    ///
    /// An elapsed block is cleared here (attempts reset to zero) and reported
    /// as not blocked.
    pub async fn is_blocked(&self, ip: &str, now: i64) -> Result<bool, DatabaseError> {
        let record = self.db.get_attempt(ip).await?;
        match LedgerState::of(record.as_ref(), now, self.config.block_window_secs) {
            LedgerState::Clean => Ok(false),
            LedgerState::Blocked => Ok(true),
            LedgerState::ExpiredBlock => {
                let cutoff = now - self.config.block_window_secs;
                if self.db.clear_expired_block(ip, cutoff, now).await? {
                    info!(ip, "Block expired");
                }
                Ok(false)
            }
        }
    }

    /// Housekeeping: drop long-expired blocks and idle unblocked records.
    pub async fn purge_stale(&self, now: i64) -> Result<u64, DatabaseError> {
        let purged = self
            .db
            .purge_attempts(
                now - self.config.blocked_retention_secs,
                now - self.config.unblocked_retention_secs,
            )
            .await?;
        if purged > 0 {
            info!(purged, "Purged stale ledger records");
        }
        Ok(purged)
    }

    /// Administrator override: forget everything about `ip`.
    pub async fn unblock(&self, ip: &str) -> Result<bool, DatabaseError> {
        let removed = self.db.delete_attempt(ip).await?;
        if removed {
            info!(ip, "Address unblocked by administrator");
        }
        Ok(removed)
    }

    /// Addresses currently inside their block window.
    pub async fn list_blocked(&self, now: i64) -> Result<Vec<AttemptRecord>, DatabaseError> {
        self.db
            .list_blocked_attempts(now - self.config.block_window_secs)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const DAY: i64 = 24 * 60 * 60;
    const T0: i64 = 1_750_000_000;

    async fn setup() -> (AttemptLedger, GatewayDatabase) {
        let db = GatewayDatabase::open_in_memory().await.unwrap();
        (AttemptLedger::new(db.clone(), LedgerConfig::default()), db)
    }

    #[tokio::test]
    async fn fewer_than_three_failures_is_clean() {
        let (ledger, _db) = setup().await;
        assert!(!ledger.is_blocked("1.2.3.4", T0).await.unwrap());

        ledger.record_failure("1.2.3.4", T0).await.unwrap();
        ledger.record_failure("1.2.3.4", T0 + 1).await.unwrap();
        assert!(!ledger.is_blocked("1.2.3.4", T0 + 2).await.unwrap());
    }

    #[tokio::test]
    async fn third_failure_blocks() {
        let (ledger, _db) = setup().await;
        for i in 0..3 {
            ledger.record_failure("1.2.3.4", T0 + i).await.unwrap();
        }
        assert!(ledger.is_blocked("1.2.3.4", T0 + 10).await.unwrap());
        assert!(!ledger.is_blocked("5.6.7.8", T0 + 10).await.unwrap());
    }

    #[tokio::test]
    async fn block_expires_and_resets_counter() {
        let (ledger, db) = setup().await;
        for _ in 0..3 {
            ledger.record_failure("1.2.3.4", T0).await.unwrap();
        }

        // Exactly at the window edge it still holds.
        assert!(ledger.is_blocked("1.2.3.4", T0 + 3 * DAY).await.unwrap());

        assert!(!ledger.is_blocked("1.2.3.4", T0 + 3 * DAY + 1).await.unwrap());
        let record = db.get_attempt("1.2.3.4").await.unwrap().unwrap();
        assert_eq!(record.login_attempts, 0);
        assert!(!record.blacklisted);

        // Counting starts over.
        ledger.record_failure("1.2.3.4", T0 + 4 * DAY).await.unwrap();
        assert!(!ledger.is_blocked("1.2.3.4", T0 + 4 * DAY).await.unwrap());
    }

    #[test]
    fn state_classification() {
        let record = |attempts, blacklisted, timestamp| AttemptRecord {
            ip: "ip".into(),
            login_attempts: attempts,
            blacklisted,
            timestamp,
        };
        assert_eq!(LedgerState::of(None, T0, DAY), LedgerState::Clean);
        assert_eq!(LedgerState::of(Some(&record(2, false, T0)), T0, DAY), LedgerState::Clean);
        assert_eq!(LedgerState::of(Some(&record(3, true, T0)), T0 + DAY, DAY), LedgerState::Blocked);
        assert_eq!(
            LedgerState::of(Some(&record(3, true, T0)), T0 + DAY + 1, DAY),
            LedgerState::ExpiredBlock
        );
    }

    #[tokio::test]
    async fn concurrent_failures_are_all_counted() {
        let (ledger, db) = setup().await;
        let results = tokio::join!(
            ledger.record_failure("9.9.9.9", T0),
            ledger.record_failure("9.9.9.9", T0),
            ledger.record_failure("9.9.9.9", T0),
            ledger.record_failure("9.9.9.9", T0),
        );
        assert!(results.0.is_ok() && results.1.is_ok() && results.2.is_ok() && results.3.is_ok());
        let record = db.get_attempt("9.9.9.9").await.unwrap().unwrap();
        assert_eq!(record.login_attempts, 4);
        assert!(record.blacklisted);
    }

    #[tokio::test]
    async fn purge_respects_retention_windows() {
        let (ledger, db) = setup().await;
        for _ in 0..3 {
            ledger.record_failure("blocked", T0).await.unwrap();
        }
        ledger.record_failure("idle", T0).await.unwrap();

        // Four days on: idle record is past 3 days, block is within 7.
        assert_eq!(ledger.purge_stale(T0 + 4 * DAY).await.unwrap(), 1);
        assert!(db.get_attempt("idle").await.unwrap().is_none());
        assert!(db.get_attempt("blocked").await.unwrap().is_some());

        assert_eq!(ledger.purge_stale(T0 + 8 * DAY).await.unwrap(), 1);
        assert!(db.get_attempt("blocked").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unblock_and_list() {
        let (ledger, _db) = setup().await;
        for _ in 0..3 {
            ledger.record_failure("1.1.1.1", T0).await.unwrap();
        }
        assert_eq!(ledger.list_blocked(T0 + 1).await.unwrap().len(), 1);
        assert!(ledger.list_blocked(T0 + 4 * DAY).await.unwrap().is_empty());

        assert!(ledger.unblock("1.1.1.1").await.unwrap());
        assert!(!ledger.is_blocked("1.1.1.1", T0 + 1).await.unwrap());
    }
}
