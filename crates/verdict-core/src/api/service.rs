//! Per-worker verdict service

use crate::audit::{AuditSink, JsonArrayStore};
use crate::common::errors::Result;
use crate::common::types::{CallHeaderRecord, Verdict};
use crate::config::{VerdictConfig, VerdictMode};
use crate::extract::{extract, Extraction, SipRequestView};
use crate::policy::{to_response_code, AllowListSource, VerdictSource};
use infra_common::LogContext;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, Instrument, Level};

/// Time spent in each stage of one call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerTimings {
    pub parse: Duration,
    pub audit_enqueue: Duration,
    pub decision: Duration,
    pub delay: Duration,
    pub total: Duration,
}

/// Everything produced for one call
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub record: CallHeaderRecord,
    pub verdict: Verdict,
    pub response_code: i32,
    pub timings: HandlerTimings,
}

/// Builder for [`CallVerdictService`]
pub struct CallVerdictServiceBuilder {
    config: VerdictConfig,
    source: Option<Arc<dyn VerdictSource>>,
}

impl CallVerdictServiceBuilder {
    pub fn new(config: VerdictConfig) -> Self {
        Self { config, source: None }
    }

    /// Use this source instead of the one selected by `config.mode`
    pub fn verdict_source(mut self, source: Arc<dyn VerdictSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Validate the configuration, create the verdict source and start the
    /// audit consumer. Must run within a Tokio runtime.
    pub async fn build(self) -> Result<CallVerdictService> {
        self.config.validate()?;

        let source = match self.source {
            Some(source) => source,
            None => source_from_config(&self.config)?,
        };

        let audit = if self.config.audit.enabled {
            let store = JsonArrayStore::new(self.config.audit.path.clone());
            Some(AuditSink::start(store, self.config.audit.queue_capacity)?)
        } else {
            None
        };

        info!(
            "Verdict service ready: source={}, audit={}, delay={:?}",
            source.name(),
            audit.as_ref().map(|a| a.path().display().to_string()).unwrap_or_else(|| "off".into()),
            self.config.delay()
        );

        Ok(CallVerdictService {
            delay: self.config.delay(),
            config: self.config,
            source,
            audit,
        })
    }
}

fn source_from_config(config: &VerdictConfig) -> Result<Arc<dyn VerdictSource>> {
    match config.mode {
        VerdictMode::AllowList => Ok(Arc::new(AllowListSource::new(
            config.allow_list.identities.iter().cloned(),
        ))),
        VerdictMode::RoundTrip => round_trip_source(config),
    }
}

#[cfg(feature = "nats")]
fn round_trip_source(config: &VerdictConfig) -> Result<Arc<dyn VerdictSource>> {
    use crate::policy::{NatsChannel, PolicyRoundTripClient};

    let channel = Arc::new(NatsChannel::new(config.policy.servers.clone(), config.connect_timeout()));
    Ok(Arc::new(PolicyRoundTripClient::new(
        channel,
        config.policy.subject.clone(),
        config.round_trip_timeout(),
    )))
}

#[cfg(not(feature = "nats"))]
fn round_trip_source(_config: &VerdictConfig) -> Result<Arc<dyn VerdictSource>> {
    Err(crate::common::errors::VerdictError::ConfigError(
        "round_trip mode needs the `nats` feature or an explicit verdict source".into(),
    ))
}

/// The filter a host worker owns: created once at worker start, shared by
/// reference across calls, shut down when the worker exits.
pub struct CallVerdictService {
    config: VerdictConfig,
    source: Arc<dyn VerdictSource>,
    audit: Option<AuditSink>,
    delay: Duration,
}

impl CallVerdictService {
    /// Build the service selected by `config`
    pub async fn init(config: VerdictConfig) -> Result<Self> {
        CallVerdictServiceBuilder::new(config).build().await
    }

    pub fn builder(config: VerdictConfig) -> CallVerdictServiceBuilder {
        CallVerdictServiceBuilder::new(config)
    }

    pub fn config(&self) -> &VerdictConfig {
        &self.config
    }

    /// Host entry point.
    ///
    /// `Some(1)` proceed, `Some(0)` forbidden, `None` when a mandatory header
    /// is missing and the host should apply its default handling.
    pub async fn handle<R: SipRequestView + ?Sized>(&self, request: &R) -> Option<i32> {
        match self.handle_detailed(request).await {
            Ok(outcome) => Some(outcome.response_code),
            Err(e) => {
                error!("No verdict for {} {}: {}", request.method(), request.ruri(), e);
                None
            }
        }
    }

    /// Like [`handle`](Self::handle) but returns the record, verdict and timings.
    ///
    /// The only error is [`MissingMandatoryHeader`](crate::VerdictError::MissingMandatoryHeader).
    pub async fn handle_detailed<R: SipRequestView + ?Sized>(&self, request: &R) -> Result<CallOutcome> {
        let started = Instant::now();

        let Extraction { record, parse_time } = extract(request)?;

        let ctx = LogContext::with_operation("verdict", "handle")
            .with_field("method", record.method.clone())
            .with_optional_field("call_id", record.call_id.clone());
        let span = ctx.span(Level::INFO);

        async move {
            info!("Header parsing time: {:.2} ms", ms(parse_time));

            let enqueue_started = Instant::now();
            if let Some(audit) = &self.audit {
                audit.submit(record.clone()).await;
            }
            let audit_enqueue = enqueue_started.elapsed();
            info!("Log saving time: {:.2} ms", ms(audit_enqueue));

            let verdict = self.source.decide(&record).await;

            let delay_started = Instant::now();
            if !self.delay.is_zero() {
                info!("Delaying response by {} ms", self.delay.as_millis());
                tokio::time::sleep(self.delay).await;
            }
            let delay = delay_started.elapsed();

            let response_code = to_response_code(&verdict);
            let timings = HandlerTimings {
                parse: parse_time,
                audit_enqueue,
                decision: verdict.elapsed,
                delay,
                total: started.elapsed(),
            };

            info!(
                "Verdict {} (code {}) from {} in {:.2} ms; total time including delay: {:.2} ms",
                verdict.decision,
                response_code,
                self.source.name(),
                ms(timings.decision),
                ms(timings.total)
            );

            Ok(CallOutcome {
                record,
                verdict,
                response_code,
                timings,
            })
        }
        .instrument(span)
        .await
    }

    /// Flush the audit queue and release the verdict source
    pub async fn shutdown(&self) {
        if let Some(audit) = &self.audit {
            audit.shutdown().await;
        }
        self.source.shutdown().await;
        info!("Verdict service stopped");
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
