//! Host queries. Callers pass ciphertext; nothing here sees a plaintext key.

use super::db::GatewayDatabase;
use super::models::Host;
use pressgate_core::db::DatabaseError;

impl GatewayDatabase {
    /// Register a new host with its first encrypted key.
    pub async fn create_host(
        &self,
        domain: &str,
        key_ciphertext: &str,
        send_auth: bool,
        now: i64,
    ) -> Result<Host, DatabaseError> {
        sqlx::query(
            "INSERT INTO hosts (domain, key, old_key, send_auth, created_at, updated_at) VALUES (?, ?, NULL, ?, ?, ?)",
        )
        .bind(domain)
        .bind(key_ciphertext)
        .bind(send_auth)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_host(domain).await
    }

    /// Get a host by domain.
    pub async fn get_host(&self, domain: &str) -> Result<Host, DatabaseError> {
        self.find_host(domain)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Host {domain}")))
    }

    /// Look up a host by domain, `None` if unknown.
    pub async fn find_host(&self, domain: &str) -> Result<Option<Host>, DatabaseError> {
        let host = sqlx::query_as::<_, Host>("SELECT * FROM hosts WHERE domain = ?")
            .bind(domain)
            .fetch_optional(self.pool())
            .await?;

        Ok(host)
    }

    /// List all hosts ordered by domain.
    pub async fn list_hosts(&self) -> Result<Vec<Host>, DatabaseError> {
        let hosts = sqlx::query_as::<_, Host>("SELECT * FROM hosts ORDER BY domain")
            .fetch_all(self.pool())
            .await?;

        Ok(hosts)
    }

    /// Administrator key regeneration: install a new key and park the
    /// previous one in `old_key` so the remote host can still rotate.
    pub async fn replace_host_key(
        &self,
        domain: &str,
        new_key_ciphertext: &str,
        now: i64,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE hosts SET old_key = key, key = ?, updated_at = ? WHERE domain = ?",
        )
        .bind(new_key_ciphertext)
        .bind(now)
        .bind(domain)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Compare-and-swap used by key rotation.
    ///
    /// Succeeds only while both stored ciphertexts are still exactly the
    /// ones the caller read, so two concurrent rotations presenting the same
    /// old key cannot both win. Clears `old_key` on success.
    pub async fn swap_host_key(
        &self,
        domain: &str,
        expected_key: &str,
        expected_old_key: Option<&str>,
        new_key_ciphertext: &str,
        now: i64,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE hosts SET key = ?, old_key = NULL, updated_at = ? WHERE domain = ? AND key = ? AND old_key IS ?",
        )
        .bind(new_key_ciphertext)
        .bind(now)
        .bind(domain)
        .bind(expected_key)
        .bind(expected_old_key)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Set the single-use auth delivery flag.
    pub async fn set_send_auth(
        &self,
        domain: &str,
        send_auth: bool,
        now: i64,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE hosts SET send_auth = ?, updated_at = ? WHERE domain = ?")
            .bind(send_auth)
            .bind(now)
            .bind(domain)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Atomically consume the auth delivery flag.
    ///
    /// Returns `true` for exactly one caller while the flag is set.
    pub async fn take_send_auth(&self, domain: &str, now: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE hosts SET send_auth = 0, updated_at = ? WHERE domain = ? AND send_auth = 1",
        )
        .bind(now)
        .bind(domain)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Remove a host together with its update log history.
    pub async fn delete_host(&self, domain: &str) -> Result<bool, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM update_logs WHERE domain = ?")
            .bind(domain)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM hosts WHERE domain = ?")
            .bind(domain)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}
