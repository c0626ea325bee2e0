//! `PressGate` remote update client.
//!
//! The side of the protocol that runs on a managed site: ask the gateway
//! about each installed plugin or theme, download what is newer, hand it to
//! the platform installer and verify the version actually moved.

mod client;
mod error;
mod status;
mod updater;

pub use client::{DownloadedPackage, GatewayClient, GatewayClientConfig, PackageCheck, PackageSource};
pub use error::ClientError;
pub use status::RunStatus;
pub use updater::{InstalledItem, ItemOutcome, ItemReport, RunReport, UpdateTarget, run_updates};
