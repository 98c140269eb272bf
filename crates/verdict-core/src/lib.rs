//! # SIP Verdict Core
//!
//! Per-call admission filter for a SIP proxy host.
//!
//! For each inbound request the filter extracts a fixed set of headers,
//! parses the address-bearing ones into structured form, queues the record
//! for the audit log and asks a verdict source whether the call may proceed.
//! The host receives `1` (proceed), `0` (forbidden) or no verdict at all when
//! a mandatory header is missing.
//!
//! ## Architecture
//!
//! - `headers`: SIP URI, Via and Diversion value parsers
//! - `extract`: host request view and header record extraction
//! - `policy`: verdict sources (policy round trip, static allow-list)
//! - `audit`: asynchronous JSON-array audit log
//! - `config`: layered configuration
//! - `api`: the per-worker service and its blocking wrapper
//!
//! ## Example
//!
//! ```no_run
//! use verdict_core::{InboundRequest, VerdictConfig, VerdictWorker};
//!
//! let worker = VerdictWorker::init(0, VerdictConfig::allow_list(["+919560690446"]))?;
//! let request = InboundRequest::new("INVITE", "sip:svc@proxy.example.com")
//!     .with_header("From", "<sip:+919560690446@carrier.example.com>;tag=1")
//!     .with_header("To", "<sip:svc@proxy.example.com>");
//! assert_eq!(worker.handle(&request), Some(1));
//! worker.shutdown();
//! # Ok::<(), verdict_core::VerdictError>(())
//! ```

pub mod api;
pub mod audit;
pub mod common;
pub mod config;
pub mod extract;
pub mod headers;
pub mod policy;

// Re-export key types
pub use api::{CallOutcome, CallVerdictService, CallVerdictServiceBuilder, HandlerTimings, VerdictWorker};
pub use common::errors::{Result, VerdictError};
pub use common::types::*;
pub use config::{VerdictConfig, VerdictMode};
pub use extract::{extract, Extraction, InboundRequest, SipRequestView};
pub use headers::{parse_diversion, parse_uri, parse_via};
pub use policy::{to_response_code, VerdictSource};
