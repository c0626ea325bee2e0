//! SQLite storage for the `PressGate` gateway.
//!
//! Provides persistence for hosts, the package catalog, the attempt ledger
//! and the update audit log.

mod db;
mod models;
mod queries_attempts;
mod queries_catalog;
mod queries_hosts;
mod queries_logs;


pub use db::GatewayDatabase;
pub use models::*;
pub use pressgate_core::db::DatabaseError;
pub use queries_catalog::CatalogDiff;
