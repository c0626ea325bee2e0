//! `PressGate` background job runner.
//!
//! Meant for crontab entries such as
//! `0 3 * * * pressgate-cron sync-catalog --worker`.
//! With `--worker` the invocation returns immediately after handing the job
//! to a detached process, and does nothing if an instance is already running.

use std::path::PathBuf;

use clap::Parser;

use pressgate_core::config::load_config;
use pressgate_core::db::unix_timestamp;
use pressgate_core::tracing_init::init_tracing;
use pressgate_server::gateway::StorageRoots;
use pressgate_server::jobs::{FileJobLock, Job, JobLock, JobOutcome, run_job, spawn_worker};
use pressgate_server::ledger::AttemptLedger;
use pressgate_server::storage::GatewayDatabase;

#[derive(Parser, Debug)]
#[command(name = "pressgate-cron")]
#[command(version, about = "Run a PressGate background job")]
struct Args {
    /// Job to run
    #[arg(value_enum)]
    job: Job,

    /// Hand the job to a detached background process and return at once
    #[arg(long)]
    worker: bool,

    /// JSON config file (defaults to ~/.config/pressgate/config.json if present)
    #[arg(long, env = "PRESSGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "PRESSGATE_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    config.validate()?;
    let locks = FileJobLock::new(&config.lock_dir);

    if args.worker {
        if locks.can_launch(args.job.name()) {
            spawn_worker(args.job, args.config.as_deref())?;
        }
        return Ok(());
    }

    init_tracing(
        &format!("pressgate_server={}", config.log_level),
        args.log_json,
    );

    let db = GatewayDatabase::open(&config.database_path).await?;
    let ledger = AttemptLedger::new(db.clone(), config.ledger.clone());
    let roots = StorageRoots::from_config(&config);

    let outcome = run_job(args.job, &locks, &db, &ledger, &roots, unix_timestamp()).await?;
    print_outcome(args.job, &outcome);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_outcome(job: Job, outcome: &JobOutcome) {
    match outcome {
        JobOutcome::Completed(report) => println!("{job} completed: {report}"),
        JobOutcome::AlreadyRunning => println!("{job} is already running"),
    }
}
