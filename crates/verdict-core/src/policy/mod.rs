//! Verdict sources
//!
//! A [`VerdictSource`] turns a [`CallHeaderRecord`] into a [`Verdict`]. Two
//! sources exist:
//!
//! - [`PolicyRoundTripClient`]: asks an external policy service over a
//!   request/reply channel (NATS by default)
//! - [`AllowListSource`]: matches the From user part against a static list

pub mod allow_list;
pub mod channel;
#[cfg(feature = "nats")]
pub mod nats;
pub mod round_trip;
pub mod verdict;

pub use allow_list::AllowListSource;
pub use channel::RequestChannel;
#[cfg(feature = "nats")]
pub use nats::{Connection, Connector, NatsChannel, NatsConnector, RequestFailure};
pub use round_trip::PolicyRoundTripClient;
pub use verdict::{decision_from_reply, to_response_code};

use crate::common::types::{CallHeaderRecord, Verdict};
use async_trait::async_trait;

/// Trait for anything that can decide on a call
#[async_trait]
pub trait VerdictSource: Send + Sync {
    /// Decide on one call. Infallible: sources map their own failures to a reject.
    async fn decide(&self, record: &CallHeaderRecord) -> Verdict;

    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Release resources held by the source
    async fn shutdown(&self) {}
}
