//! Blocking adapter for hosts that call the filter synchronously

use super::service::{CallVerdictService, CallVerdictServiceBuilder};
use crate::common::errors::{Result, VerdictError};
use crate::config::VerdictConfig;
use crate::extract::SipRequestView;
use crate::policy::VerdictSource;
use infra_common::logging::log_welcome;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tracing::info;

/// One host worker: a small runtime plus the service it drives.
///
/// [`handle`](Self::handle) blocks the calling thread until the verdict is
/// ready, bounded by the policy round-trip timeout plus the configured delay.
/// The audit consumer keeps running on the runtime's own thread between calls.
pub struct VerdictWorker {
    rank: usize,
    runtime: Runtime,
    service: CallVerdictService,
}

impl VerdictWorker {
    /// Worker start hook: installs logging, starts the runtime and builds the
    /// service selected by `config`
    pub fn init(rank: usize, config: VerdictConfig) -> Result<Self> {
        Self::start(rank, config, None)
    }

    /// Worker start hook with an explicit verdict source
    pub fn with_source(rank: usize, config: VerdictConfig, source: Arc<dyn VerdictSource>) -> Result<Self> {
        Self::start(rank, config, Some(source))
    }

    fn start(rank: usize, config: VerdictConfig, source: Option<Arc<dyn VerdictSource>>) -> Result<Self> {
        infra_common::setup_logging(&config.logging)?;
        log_welcome(&config.logging.app_name, env!("CARGO_PKG_VERSION"));

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name(format!("sipverdict-worker-{}", rank))
            .enable_all()
            .build()
            .map_err(|e| VerdictError::Runtime(format!("cannot start worker {} runtime: {}", rank, e)))?;

        let mut builder = CallVerdictServiceBuilder::new(config);
        if let Some(source) = source {
            builder = builder.verdict_source(source);
        }
        let service = runtime.block_on(builder.build())?;
        info!("Worker {} initialised", rank);

        Ok(Self { rank, runtime, service })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn service(&self) -> &CallVerdictService {
        &self.service
    }

    /// Synchronous host entry point, see [`CallVerdictService::handle`]
    pub fn handle<R: SipRequestView + ?Sized>(&self, request: &R) -> Option<i32> {
        self.runtime.block_on(self.service.handle(request))
    }

    /// Worker exit hook: drains the audit queue and closes the policy channel
    pub fn shutdown(self) {
        self.runtime.block_on(self.service.shutdown());
        info!("Worker {} stopped", self.rank);
    }
}
