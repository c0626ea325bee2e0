//! Configuration resolution for `PressGate`.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Config file (explicit path, else `~/.config/pressgate/config.json`)
//! 3. Environment variables
//! 4. CLI arguments (applied by the binaries, highest priority)

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::kind::PackageKind;

const DAY_SECS: i64 = 24 * 60 * 60;

/// Complete `PressGate` configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub database_path: PathBuf,
    pub plugin_dir: PathBuf,
    pub theme_dir: PathBuf,
    /// Directory holding the per-job lock files.
    pub lock_dir: PathBuf,
    /// Deployment secret the at-rest encryption key is derived from.
    pub master_secret: String,
    pub ledger: LedgerConfig,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_path: default_database_path(),
            plugin_dir: PathBuf::from("storage/plugins"),
            theme_dir: PathBuf::from("storage/themes"),
            lock_dir: std::env::temp_dir(),
            master_secret: String::new(),
            ledger: LedgerConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr)
            .field("database_path", &self.database_path)
            .field("plugin_dir", &self.plugin_dir)
            .field("theme_dir", &self.theme_dir)
            .field("lock_dir", &self.lock_dir)
            .field("master_secret", &"[REDACTED]")
            .field("ledger", &self.ledger)
            .field("log_level", &self.log_level)
            .finish()
    }
}

/// Brute-force ledger thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Failures at which an address becomes blocked.
    pub max_attempts: i64,
    /// How long a block lasts before it lazily clears.
    pub block_window_secs: i64,
    /// Blocked records older than this are purged by housekeeping.
    pub blocked_retention_secs: i64,
    /// Unblocked records untouched for this long are purged by housekeeping.
    pub unblocked_retention_secs: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            block_window_secs: 3 * DAY_SECS,
            blocked_retention_secs: 7 * DAY_SECS,
            unblocked_retention_secs: 3 * DAY_SECS,
        }
    }
}

impl Config {
    /// Storage root holding the archives of the given kind.
    pub fn storage_root(&self, kind: PackageKind) -> &Path {
        match kind {
            PackageKind::Plugin => &self.plugin_dir,
            PackageKind::Theme => &self.theme_dir,
        }
    }

    /// Reject configurations the binaries cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.master_secret.trim().is_empty() {
            return Err(Error::Config(
                "master_secret is empty (set PRESSGATE_MASTER_SECRET)".into(),
            ));
        }
        if self.ledger.max_attempts < 1 {
            return Err(Error::Config("ledger.max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit_path: Option<&Path>) -> Result<Config> {
    let mut config = match explicit_path {
        Some(path) => load_config_file(path)?,
        None => match global_config_path() {
            Some(path) if path.exists() => load_config_file(&path)?,
            _ => Config::default(),
        },
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pressgate").join("config.json"))
}

fn default_database_path() -> PathBuf {
    dirs::data_dir().map_or_else(
        || PathBuf::from("pressgate.db"),
        |p| p.join("pressgate").join("pressgate.db"),
    )
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}

/// Apply `PRESSGATE_*` overrides using the given variable lookup.
pub fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("PRESSGATE_MASTER_SECRET") {
        config.master_secret = val;
    }
    if let Some(val) = var("PRESSGATE_DATABASE") {
        config.database_path = PathBuf::from(val);
    }
    if let Some(val) = var("PRESSGATE_PLUGIN_DIR") {
        config.plugin_dir = PathBuf::from(val);
    }
    if let Some(val) = var("PRESSGATE_THEME_DIR") {
        config.theme_dir = PathBuf::from(val);
    }
    if let Some(val) = var("PRESSGATE_LOCK_DIR") {
        config.lock_dir = PathBuf::from(val);
    }
    if let Some(val) = var("PRESSGATE_LISTEN_ADDR") {
        if let Ok(addr) = val.parse() {
            config.listen_addr = addr;
        }
    }
    if let Some(val) = var("PRESSGATE_LOG_LEVEL") {
        config.log_level = val;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn default_ledger_windows() {
        let config = Config::default();
        assert_eq!(config.ledger.max_attempts, 3);
        assert_eq!(config.ledger.block_window_secs, 3 * DAY_SECS);
        assert_eq!(config.ledger.blocked_retention_secs, 7 * DAY_SECS);
        assert_eq!(config.ledger.unblocked_retention_secs, 3 * DAY_SECS);
    }

    #[test]
    fn empty_master_secret_is_rejected() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let config = Config {
            master_secret: "s3cret".into(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"plugin_dir": "/srv/plugins", "ledger": {"max_attempts": 5}}"#,
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.plugin_dir, PathBuf::from("/srv/plugins"));
        assert_eq!(config.theme_dir, PathBuf::from("storage/themes"));
        assert_eq!(config.ledger.max_attempts, 5);
        assert_eq!(config.ledger.block_window_secs, 3 * DAY_SECS);
    }

    #[test]
    fn env_overrides_win() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PRESSGATE_MASTER_SECRET", "from-env"),
            ("PRESSGATE_THEME_DIR", "/srv/themes"),
            ("PRESSGATE_LISTEN_ADDR", "127.0.0.1:9000"),
        ]);
        let mut config = Config::default();
        apply_env_overrides(&mut config, |name| vars.get(name).map(ToString::to_string));

        assert_eq!(config.master_secret, "from-env");
        assert_eq!(config.storage_root(PackageKind::Theme), Path::new("/srv/themes"));
        assert_eq!(config.listen_addr.port(), 9000);
    }

    #[test]
    fn debug_redacts_master_secret() {
        let config = Config {
            master_secret: "very-secret".into(),
            ..Config::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
