//! Per-domain shared secrets, encrypted at rest.
//!
//! Plaintext keys exist only transiently: when generated, when compared
//! against a caller-supplied key, and when handed back to the caller once.

use pressgate_core::db::{DatabaseError, unix_timestamp};
use pressgate_core::validate::normalize_domain;
use pressgate_crypto::{SecretBox, constant_time_str_eq, generate_shared_secret};
use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::storage::{GatewayDatabase, Host};

#[derive(Debug, Clone)]
pub struct KeyStore {
    db: GatewayDatabase,
    secret_box: SecretBox,
}

impl KeyStore {
    pub const fn new(db: GatewayDatabase, secret_box: SecretBox) -> Self {
        Self { db, secret_box }
    }

    /// Decrypted current key for `domain`, `None` if the host is unknown
    /// or its stored key no longer decrypts.
    pub async fn get(&self, domain: &str) -> Result<Option<String>, GatewayError> {
        let Some(host) = self.db.find_host(domain).await? else {
            return Ok(None);
        };
        Ok(self.open(&host.domain, &host.key))
    }

    /// Whether `supplied` is the current key for `domain`.
    pub async fn verify(&self, domain: &str, supplied: &str) -> Result<bool, GatewayError> {
        Ok(self
            .get(domain)
            .await?
            .is_some_and(|stored| constant_time_str_eq(&stored, supplied)))
    }

    pub async fn host_exists(&self, domain: &str) -> Result<bool, GatewayError> {
        Ok(self.db.find_host(domain).await?.is_some())
    }

    /// Register a host and return its first key in plaintext.
    ///
    /// With `send_auth` set, the host may fetch this key once over the
    /// auth channel.
    pub async fn create_host(&self, domain: &str, send_auth: bool) -> Result<String, GatewayError> {
        let domain = canonical_domain(domain)?;
        let key = generate_shared_secret();
        let ciphertext = self.secret_box.encrypt(&key)?;
        self.db
            .create_host(&domain, &ciphertext, send_auth, unix_timestamp())
            .await?;
        info!(%domain, send_auth, "Host created");
        Ok(key)
    }

    /// Administrator regeneration: issue a new key for an existing host.
    ///
    /// The previous key is kept as `old_key` so the remote site can still
    /// prove ownership and rotate onto a fresh key.
    pub async fn issue(&self, domain: &str) -> Result<String, GatewayError> {
        let domain = canonical_domain(domain)?;
        let key = generate_shared_secret();
        let ciphertext = self.secret_box.encrypt(&key)?;
        if !self
            .db
            .replace_host_key(&domain, &ciphertext, unix_timestamp())
            .await?
        {
            return Err(DatabaseError::NotFound(format!("Host {domain}")).into());
        }
        info!(%domain, "Host key regenerated");
        Ok(key)
    }

    /// Two-phase rotation.
    ///
    /// `supplied_old_key` must match the current key or the pending old key.
    /// On match a fresh key replaces both and is returned in plaintext; on
    /// mismatch, or when a concurrent rotation won the race, nothing changes
    /// and `None` is returned.
    pub async fn rotate(
        &self,
        domain: &str,
        supplied_old_key: &str,
        now: i64,
    ) -> Result<Option<String>, GatewayError> {
        let Some(host) = self.db.find_host(domain).await? else {
            return Ok(None);
        };
        if !self.matches_any(&host, supplied_old_key) {
            debug!(domain, "Rotation rejected: old key mismatch");
            return Ok(None);
        }

        let key = generate_shared_secret();
        let ciphertext = self.secret_box.encrypt(&key)?;
        let swapped = self
            .db
            .swap_host_key(
                domain,
                &host.key,
                host.old_key.as_deref(),
                &ciphertext,
                now,
            )
            .await?;
        if !swapped {
            warn!(domain, "Rotation lost a concurrent update");
            return Ok(None);
        }

        info!(domain, "Host key rotated");
        Ok(Some(key))
    }

    pub async fn send_auth_enabled(&self, domain: &str) -> Result<bool, GatewayError> {
        Ok(self
            .db
            .find_host(domain)
            .await?
            .is_some_and(|host| host.send_auth))
    }

    pub async fn set_send_auth(&self, domain: &str, enabled: bool) -> Result<bool, GatewayError> {
        let domain = canonical_domain(domain)?;
        Ok(self
            .db
            .set_send_auth(&domain, enabled, unix_timestamp())
            .await?)
    }

    /// Single-use key delivery.
    ///
    /// Consumes the host's `send_auth` flag and returns the current key.
    /// Only the first caller after the flag was set receives it.
    pub async fn take_auth_delivery(
        &self,
        domain: &str,
        now: i64,
    ) -> Result<Option<String>, GatewayError> {
        if !self.db.take_send_auth(domain, now).await? {
            return Ok(None);
        }
        let key = self.get(domain).await?;
        if key.is_some() {
            info!(domain, "Key delivered over auth channel");
        }
        Ok(key)
    }

    pub async fn delete_host(&self, domain: &str) -> Result<bool, GatewayError> {
        let domain = canonical_domain(domain)?;
        let deleted = self.db.delete_host(&domain).await?;
        if deleted {
            info!(%domain, "Host deleted");
        }
        Ok(deleted)
    }

    pub async fn list_hosts(&self) -> Result<Vec<Host>, GatewayError> {
        Ok(self.db.list_hosts().await?)
    }

    fn matches_any(&self, host: &Host, supplied: &str) -> bool {
        let current = self.open(&host.domain, &host.key);
        let previous = host
            .old_key
            .as_deref()
            .and_then(|blob| self.open(&host.domain, blob));
        [current, previous]
            .into_iter()
            .flatten()
            .any(|stored| constant_time_str_eq(&stored, supplied))
    }

    fn open(&self, domain: &str, blob: &str) -> Option<String> {
        let plaintext = self.secret_box.decrypt(blob);
        if plaintext.is_none() {
            warn!(domain, "Stored key failed to decrypt");
        }
        plaintext
    }
}

/// Hosts are stored under the same lowercase form the gateway looks up.
fn canonical_domain(domain: &str) -> Result<String, GatewayError> {
    normalize_domain(domain).ok_or_else(|| GatewayError::InvalidDomain(domain.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn setup() -> (KeyStore, GatewayDatabase) {
        let db = GatewayDatabase::open_in_memory().await.unwrap();
        let store = KeyStore::new(db.clone(), SecretBox::from_master_secret("test-master"));
        (store, db)
    }

    #[tokio::test]
    async fn created_key_is_encrypted_at_rest() {
        let (store, db) = setup().await;
        let key = store.create_host("example.com", false).await.unwrap();

        let host = db.get_host("example.com").await.unwrap();
        assert_ne!(host.key, key);
        assert!(!host.key.contains(&key));
        assert_eq!(store.get("example.com").await.unwrap(), Some(key.clone()));
        assert!(store.verify("example.com", &key).await.unwrap());
        assert!(!store.verify("example.com", "wrong").await.unwrap());
    }

    #[tokio::test]
    async fn unknown_domain_has_no_key() {
        let (store, _db) = setup().await;
        assert_eq!(store.get("nobody.com").await.unwrap(), None);
        assert!(!store.verify("nobody.com", "anything").await.unwrap());
        assert!(store.issue("nobody.com").await.is_err());
    }

    #[tokio::test]
    async fn undecryptable_key_behaves_as_missing() {
        let (store, db) = setup().await;
        db.create_host("example.com", "garbage-ciphertext", false, 1)
            .await
            .unwrap();
        assert_eq!(store.get("example.com").await.unwrap(), None);
        assert_eq!(store.rotate("example.com", "anything", 10).await.unwrap(), None);

        let other_master = KeyStore::new(db.clone(), SecretBox::from_master_secret("other"));
        let key = other_master.create_host("other.com", false).await.unwrap();
        assert!(!store.verify("other.com", &key).await.unwrap());
    }

    #[tokio::test]
    async fn rotate_succeeds_once_per_old_key() {
        let (store, _db) = setup().await;
        let original = store.create_host("example.com", false).await.unwrap();

        let rotated = store.rotate("example.com", &original, 10).await.unwrap().unwrap();
        assert_ne!(rotated, original);
        assert_eq!(store.get("example.com").await.unwrap(), Some(rotated.clone()));

        // Stale old key: refused, current key untouched.
        assert_eq!(store.rotate("example.com", &original, 10).await.unwrap(), None);
        assert_eq!(store.get("example.com").await.unwrap(), Some(rotated));
    }

    #[tokio::test]
    async fn rotate_after_admin_regeneration() {
        let (store, db) = setup().await;
        let held_by_site = store.create_host("example.com", false).await.unwrap();
        let regenerated = store.issue("example.com").await.unwrap();
        assert!(db.get_host("example.com").await.unwrap().old_key.is_some());

        // The site still holds the pre-regeneration key and trades it in.
        let fresh = store.rotate("example.com", &held_by_site, 10).await.unwrap().unwrap();
        assert_ne!(fresh, regenerated);
        assert_eq!(store.get("example.com").await.unwrap(), Some(fresh));
        assert!(db.get_host("example.com").await.unwrap().old_key.is_none());

        // Neither retired key works any more.
        assert_eq!(store.rotate("example.com", &held_by_site, 10).await.unwrap(), None);
        assert_eq!(store.rotate("example.com", &regenerated, 10).await.unwrap(), None);
    }

    #[tokio::test]
    async fn rotate_mismatch_changes_nothing() {
        let (store, db) = setup().await;
        let key = store.create_host("example.com", false).await.unwrap();
        let before = db.get_host("example.com").await.unwrap();

        assert_eq!(store.rotate("example.com", "not-the-key", 10).await.unwrap(), None);

        let after = db.get_host("example.com").await.unwrap();
        assert_eq!(before.key, after.key);
        assert_eq!(store.get("example.com").await.unwrap(), Some(key));
    }

    #[tokio::test]
    async fn concurrent_rotations_yield_one_winner() {
        let (store, _db) = setup().await;
        let original = store.create_host("example.com", false).await.unwrap();

        let (a, b) = tokio::join!(
            store.rotate("example.com", &original, 10),
            store.rotate("example.com", &original, 10)
        );
        let winners: Vec<String> = [a.unwrap(), b.unwrap()].into_iter().flatten().collect();
        assert_eq!(winners.len(), 1);
        assert_eq!(store.get("example.com").await.unwrap(), Some(winners[0].clone()));
    }

    #[tokio::test]
    async fn auth_delivery_is_single_use() {
        let (store, _db) = setup().await;
        let key = store.create_host("example.com", true).await.unwrap();
        assert!(store.send_auth_enabled("example.com").await.unwrap());

        assert_eq!(store.take_auth_delivery("example.com", 10).await.unwrap(), Some(key));
        assert!(!store.send_auth_enabled("example.com").await.unwrap());
        assert_eq!(store.take_auth_delivery("example.com", 10).await.unwrap(), None);

        assert!(store.set_send_auth("example.com", true).await.unwrap());
        assert!(store.take_auth_delivery("example.com", 10).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_and_list_hosts() {
        let (store, _db) = setup().await;
        store.create_host("b.example.com", false).await.unwrap();
        store.create_host("a.example.com", true).await.unwrap();

        let domains: Vec<_> = store
            .list_hosts()
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.domain)
            .collect();
        assert_eq!(domains, vec!["a.example.com", "b.example.com"]);

        assert!(store.delete_host("a.example.com").await.unwrap());
        assert!(!store.delete_host("a.example.com").await.unwrap());
        assert!(!store.host_exists("a.example.com").await.unwrap());
    }

    #[tokio::test]
    async fn host_domains_are_stored_lowercase() {
        let (store, db) = setup().await;
        let key = store.create_host("Example.COM", false).await.unwrap();

        let host = db.get_host("example.com").await.unwrap();
        assert_eq!(host.domain, "example.com");
        assert!(store.verify("example.com", &key).await.unwrap());

        assert!(store.set_send_auth("EXAMPLE.com", true).await.unwrap());
        assert!(store.issue("Example.Com").await.is_ok());
        assert!(store.create_host("example.com", false).await.is_err());
        assert!(store.delete_host("Example.COM").await.unwrap());
    }

    #[tokio::test]
    async fn malformed_domains_are_refused() {
        let (store, _db) = setup().await;
        for domain in ["not a domain/../x", "localhost", "", "-bad.example.com"] {
            let err = store.create_host(domain, false).await.unwrap_err();
            assert!(matches!(err, GatewayError::InvalidDomain(_)), "{domain}: {err}");
        }
        assert!(store.list_hosts().await.unwrap().is_empty());
        assert!(matches!(
            store.delete_host("not a domain").await,
            Err(GatewayError::InvalidDomain(_))
        ));
    }

    #[tokio::test]
    async fn key_changes_use_the_callers_clock() {
        let (store, db) = setup().await;
        let key = store.create_host("example.com", true).await.unwrap();

        store.take_auth_delivery("example.com", 4_000).await.unwrap();
        assert_eq!(db.get_host("example.com").await.unwrap().updated_at, 4_000);

        store.rotate("example.com", &key, 5_000).await.unwrap().unwrap();
        assert_eq!(db.get_host("example.com").await.unwrap().updated_at, 5_000);
    }
}
