//! `PressGate` gateway library
//!
//! Everything behind the two binaries:
//! - SQLite storage for hosts, catalog, attempt ledger and audit log
//! - Encrypted per-domain key store with single-use delivery and rotation
//! - Brute-force attempt ledger
//! - The update gateway protocol and its HTTP transport
//! - Single-instance background jobs (catalog sync, ledger housekeeping)

pub mod error;
pub mod gateway;
pub mod http;
pub mod jobs;
pub mod keystore;
pub mod ledger;
pub mod storage;
