//! Process-level job locks.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use tracing::{debug, warn};

/// Mutual exclusion for named jobs across OS processes.
///
/// Neither probing nor claiming ever blocks. A failed claim means "do not
/// run", whether another instance holds the lock or the lock could not be
/// taken at all.
pub trait JobLock {
    type Guard;

    /// Whether nobody currently holds the lock for `job`.
    fn can_launch(&self, job: &str) -> bool;

    /// Take the lock for `job`, or `None` if it is unavailable.
    fn claim(&self, job: &str) -> Option<Self::Guard>;

    /// Give the lock back. `None` is a no-op.
    fn release(&self, guard: Option<Self::Guard>);
}

/// `flock(2)` on one file per job.
///
/// The kernel drops the lock with the owning descriptor, so a crashed job
/// never leaves a stale lock behind. The file holds the owner's PID.
#[derive(Debug, Clone)]
pub struct FileJobLock {
    dir: PathBuf,
}

/// Ownership of a job lock; dropping it also unlocks.
pub struct JobLockGuard {
    lock: Flock<File>,
    job: String,
}

impl fmt::Debug for JobLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobLockGuard").field("job", &self.job).finish()
    }
}

impl FileJobLock {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn lock_path(&self, job: &str) -> PathBuf {
        self.dir.join(format!("pressgate-{job}.lock"))
    }

    fn try_lock(&self, job: &str) -> Option<Flock<File>> {
        let path = self.lock_path(job);
        let file = match open_lock_file(&path) {
            Ok(file) => file,
            Err(e) => {
                warn!(job, path = %path.display(), error = %e, "Cannot open job lock file");
                return None;
            }
        };

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => Some(lock),
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => {
                debug!(job, "Job lock held by another process");
                None
            }
            Err((_, errno)) => {
                warn!(job, error = %errno, "Failed to lock job file");
                None
            }
        }
    }
}

impl JobLock for FileJobLock {
    type Guard = JobLockGuard;

    fn can_launch(&self, job: &str) -> bool {
        // Dropping the probe lock releases it straight away.
        self.try_lock(job).is_some()
    }

    fn claim(&self, job: &str) -> Option<JobLockGuard> {
        let mut lock = self.try_lock(job)?;
        let pid = std::process::id();
        if let Err(e) = write_pid(&mut lock, pid) {
            warn!(job, error = %e, "Failed to record owner PID in lock file");
        }
        debug!(job, pid, "Job lock claimed");
        Some(JobLockGuard {
            lock,
            job: job.to_string(),
        })
    }

    fn release(&self, guard: Option<JobLockGuard>) {
        let Some(JobLockGuard { lock, job }) = guard else {
            return;
        };
        match lock.unlock() {
            Ok(_) => debug!(job, "Job lock released"),
            // The descriptor is closed when the returned lock drops, which
            // releases it regardless.
            Err((_, errno)) => warn!(job, error = %errno, "Explicit unlock failed"),
        }
    }
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .mode(0o600)
        .open(path)
}

/// Truncate only once the lock is held, so a losing claimer never wipes the
/// owner's PID.
fn write_pid(file: &mut File, pid: u32) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{pid}")?;
    file.flush()
}
