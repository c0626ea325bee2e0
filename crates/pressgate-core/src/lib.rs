//! `PressGate` Core Library
//!
//! Shared functionality for `PressGate` components:
//! - Package kinds and dotted-numeric version ordering
//! - Syntactic validation of gateway request fields
//! - Configuration resolution and hierarchy
//! - `SQLite` pool helpers and common error types

pub mod config;
pub mod db;
pub mod error;
pub mod kind;
pub mod tracing_init;
pub mod validate;
pub mod version;

pub use config::Config;
pub use error::{Error, Result};
pub use kind::PackageKind;
pub use version::compare_versions;
