//! Job dispatch under the job lock, and detached worker launch.

use std::fmt;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};

use clap::ValueEnum;
use tracing::info;

use super::catalog_sync::{CatalogSync, SyncReport};
use super::lock::JobLock;
use super::JobError;
use crate::gateway::StorageRoots;
use crate::ledger::AttemptLedger;
use crate::storage::GatewayDatabase;

/// The background jobs `pressgate-cron` can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Job {
    /// Reconcile the catalog with the storage roots, then purge the ledger.
    SyncCatalog,
    /// Purge stale attempt-ledger records only.
    PurgeBlacklist,
}

impl Job {
    /// Command-line name, also the lock name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::SyncCatalog => "sync-catalog",
            Self::PurgeBlacklist => "purge-blacklist",
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobReport {
    Sync(SyncReport),
    Purge { purged: u64 },
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(report) => fmt::Display::fmt(report, f),
            Self::Purge { purged } => write!(f, "{purged} ledger records purged"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed(JobReport),
    /// Another instance holds the lock; nothing was done.
    AlreadyRunning,
}

/// Run `job` if its lock can be claimed.
pub async fn run_job<L: JobLock>(
    job: Job,
    lock: &L,
    db: &GatewayDatabase,
    ledger: &AttemptLedger,
    roots: &StorageRoots,
    now: i64,
) -> Result<JobOutcome, JobError> {
    let Some(guard) = lock.claim(job.name()) else {
        info!(job = job.name(), "Job already running");
        return Ok(JobOutcome::AlreadyRunning);
    };

    info!(job = job.name(), pid = std::process::id(), "Job started");
    let result = match job {
        Job::SyncCatalog => CatalogSync::new(db.clone(), ledger.clone(), roots.clone())
            .run(now)
            .await
            .map(JobReport::Sync),
        Job::PurgeBlacklist => ledger
            .purge_stale(now)
            .await
            .map(|purged| JobReport::Purge { purged })
            .map_err(JobError::from),
    };
    lock.release(Some(guard));

    let report = result?;
    info!(job = job.name(), %report, "Job completed");
    Ok(JobOutcome::Completed(report))
}

/// Relaunch the current executable as a detached foreground run of `job`.
///
/// The child gets its own process group and null stdio, so it outlives the
/// caller and writes nothing to the caller's terminal. Returns the child PID.
pub fn spawn_worker(job: Job, config_path: Option<&Path>) -> Result<u32, JobError> {
    let exe = std::env::current_exe().map_err(JobError::Spawn)?;

    let mut command = Command::new(exe);
    command.arg(job.name());
    if let Some(path) = config_path {
        command.arg("--config").arg(path);
    }
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0);

    let child = command.spawn().map_err(JobError::Spawn)?;
    info!(job = job.name(), pid = child.id(), "Worker launched");
    Ok(child.id())
}
