//! Outcome of the last update run, persisted for display elsewhere.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    pub success: bool,
    /// Short human-readable summary.
    pub message: String,
    /// Unix timestamp of the end of the run.
    pub finished_at: i64,
}

impl RunStatus {
    /// Load the last saved status. Returns `None` if nothing was saved yet.
    pub fn load(path: &Path) -> Result<Option<Self>, ClientError> {
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    /// Save atomically: readers never see a half-written file.
    pub fn save(&self, path: &Path) -> Result<(), ClientError> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        let json = serde_json::to_string_pretty(self)?;

        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::fs::write(tmp.path(), json)?;
        tmp.persist(path).map_err(|e| ClientError::Io(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status").join("plugins.json");
        let status = RunStatus {
            success: false,
            message: "1 of 3 updates failed: akismet (install failed)".into(),
            finished_at: 1_750_000_000,
        };

        status.save(&path).unwrap();
        assert_eq!(RunStatus::load(&path).unwrap(), Some(status));
    }

    #[test]
    fn save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("themes.json");
        for success in [false, true] {
            RunStatus {
                success,
                message: String::new(),
                finished_at: 0,
            }
            .save(&path)
            .unwrap();
        }
        assert!(RunStatus::load(&path).unwrap().unwrap().success);
    }

    #[test]
    fn load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(RunStatus::load(&dir.path().join("nope.json")).unwrap(), None);
    }

    #[test]
    fn load_corrupted_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(RunStatus::load(&path), Err(ClientError::Json(_))));
    }
}
