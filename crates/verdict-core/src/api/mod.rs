//! Host-facing entry points
//!
//! - [`CallVerdictService`]: async service object, one per worker
//! - [`VerdictWorker`]: blocking wrapper for synchronous hosts

pub mod service;
pub mod worker;

pub use service::{CallOutcome, CallVerdictService, CallVerdictServiceBuilder, HandlerTimings};
pub use worker::VerdictWorker;
