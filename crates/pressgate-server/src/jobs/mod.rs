//! Single-instance background jobs.
//!
//! Every job runs under a [`JobLock`] keyed by its name, so overlapping
//! scheduler firings, manual runs and self-relaunched workers collapse into
//! one running instance.

mod catalog_sync;
mod lock;
mod runner;

use std::io;
use std::path::PathBuf;

use pressgate_core::db::DatabaseError;

pub use catalog_sync::{CatalogSync, SyncReport};
pub use lock::{FileJobLock, JobLock, JobLockGuard};
pub use runner::{Job, JobOutcome, JobReport, run_job, spawn_worker};

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Storage root {} is unreadable: {source}", path.display())]
    StorageRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Failed to launch worker: {0}")]
    Spawn(#[source] io::Error),
}
