//! Timeout-bounded round trip to the external policy service

use super::channel::RequestChannel;
use super::verdict::decision_from_reply;
use super::VerdictSource;
use crate::common::errors::{Result, VerdictError};
use crate::common::types::{CallHeaderRecord, Decision, Verdict};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Default bound on one policy round trip
pub const DEFAULT_ROUND_TRIP_TIMEOUT: Duration = Duration::from_secs(1);

/// Sends a [`CallHeaderRecord`] to the policy service and turns its reply into a verdict.
///
/// Fail-closed: timeouts, transport errors and serialization errors all
/// produce a reject.
pub struct PolicyRoundTripClient {
    channel: Arc<dyn RequestChannel>,
    subject: String,
    timeout: Duration,
}

impl PolicyRoundTripClient {
    pub fn new(channel: Arc<dyn RequestChannel>, subject: impl Into<String>, timeout: Duration) -> Self {
        Self {
            channel,
            subject: subject.into(),
            timeout,
        }
    }

    /// Serialize the record, publish it and wait for the reply payload.
    ///
    /// When the timeout fires the pending request is dropped, so a reply that
    /// arrives later is discarded by the channel.
    pub async fn round_trip(&self, record: &CallHeaderRecord) -> Result<Bytes> {
        let payload = Bytes::from(serde_json::to_vec(record)?);
        debug!(
            "Publishing {} byte record on '{}' via {}",
            payload.len(),
            self.subject,
            self.channel.name()
        );

        match tokio::time::timeout(self.timeout, self.channel.request(&self.subject, payload)).await {
            Ok(reply) => reply,
            Err(_) => Err(VerdictError::PolicyTimeout(self.timeout)),
        }
    }

    /// Run the round trip and map its outcome to a verdict
    pub async fn decide(&self, record: &CallHeaderRecord) -> Verdict {
        let started = Instant::now();

        let decision = match self.round_trip(record).await {
            Ok(reply) => {
                let decision = decision_from_reply(&reply);
                info!(
                    "Policy reply {:?} for call {} -> {}",
                    String::from_utf8_lossy(&reply),
                    record.call_id.as_deref().unwrap_or("-"),
                    decision
                );
                decision
            }
            Err(e) if e.is_policy_failure() => {
                warn!(
                    "Policy round trip failed for call {}, rejecting: {}",
                    record.call_id.as_deref().unwrap_or("-"),
                    e
                );
                Decision::Reject
            }
            Err(e) => {
                error!(
                    "Unexpected error during policy round trip for call {}, rejecting: {}",
                    record.call_id.as_deref().unwrap_or("-"),
                    e
                );
                Decision::Reject
            }
        };

        Verdict {
            decision,
            elapsed: started.elapsed(),
        }
    }
}

#[async_trait]
impl VerdictSource for PolicyRoundTripClient {
    async fn decide(&self, record: &CallHeaderRecord) -> Verdict {
        PolicyRoundTripClient::decide(self, record).await
    }

    fn name(&self) -> &'static str {
        "policy-round-trip"
    }

    async fn shutdown(&self) {
        if let Err(e) = self.channel.close().await {
            warn!("Error closing policy channel {}: {}", self.channel.name(), e);
        }
    }
}
