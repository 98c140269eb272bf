//! # Infra Common
//!
//! Shared infrastructure for the sipverdict crates:
//!
//! - `errors`: the common error type and error-context helpers
//! - `logging`: subscriber setup and per-operation log contexts
//! - `config`: layered configuration loading (defaults, file, environment)

pub mod config;
pub mod errors;
pub mod logging;

pub use errors::types::{Error, Result};
pub use logging::context::LogContext;
pub use logging::setup::{setup_logging, LoggingConfig};
