//! Audit log of extracted header records
//!
//! Records are pushed onto a bounded queue drained by a single background
//! consumer, which performs the read-modify-write of the [`JsonArrayStore`].
//! The verdict path only pays for the enqueue; failures are logged and never
//! reach the caller.
//!
//! When the queue is full, up to `capacity` records wait in deferred send
//! tasks. Past that, [`AuditSink::submit`] waits for room in the queue, so a
//! sustained overload slows the calls down instead of growing memory. Every
//! append rewrites the whole file, so the consumer gets slower as the log grows.

pub mod store;

pub use store::JsonArrayStore;

use crate::common::errors::{Result, VerdictError};
use crate::common::types::CallHeaderRecord;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Default capacity of the audit queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Background writer for [`CallHeaderRecord`]s
pub struct AuditSink {
    tx: Mutex<Option<mpsc::Sender<CallHeaderRecord>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Permits for records waiting in deferred send tasks
    overflow: Arc<Semaphore>,
    capacity: usize,
    path: PathBuf,
}

impl AuditSink {
    /// Start the consumer task. Must be called within a Tokio runtime.
    pub fn start(store: JsonArrayStore, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(VerdictError::ConfigError("audit queue capacity must be positive".into()));
        }

        let path = store.path().to_path_buf();
        let (tx, rx) = mpsc::channel(capacity);
        let worker = tokio::spawn(run_consumer(Arc::new(store), rx));

        info!("Audit sink writing to {}", path.display());
        Ok(Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            overflow: Arc::new(Semaphore::new(capacity)),
            capacity,
            path,
        })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Records currently waiting in deferred send tasks
    pub fn pending_deferrals(&self) -> usize {
        self.capacity - self.overflow.available_permits()
    }

    /// Queue a record without waiting for it to be written.
    ///
    /// When the queue is full the record is handed to a task that waits for
    /// room, so it is delayed rather than dropped. When `capacity` such tasks
    /// are already pending, the caller waits for room itself.
    pub async fn submit(&self, record: CallHeaderRecord) {
        let tx = self.tx.lock().clone();
        let Some(tx) = tx else {
            warn!("Audit sink is shut down, dropping record");
            return;
        };

        let record = match tx.try_send(record) {
            Ok(()) => return,
            Err(TrySendError::Closed(_)) => {
                warn!("Audit consumer stopped, dropping record");
                return;
            }
            Err(TrySendError::Full(record)) => record,
        };

        match self.overflow.clone().try_acquire_owned() {
            Ok(permit) => {
                debug!("Audit queue full, deferring record");
                tokio::spawn(async move {
                    if tx.send(record).await.is_err() {
                        warn!("Audit consumer stopped before deferred record was queued");
                    }
                    drop(permit);
                });
            }
            Err(_) => {
                warn!("Audit queue and {} deferrals full, waiting for room", self.capacity);
                if tx.send(record).await.is_err() {
                    warn!("Audit consumer stopped, dropping record");
                }
            }
        }
    }

    /// Stop accepting records and wait until everything queued has been written
    pub async fn shutdown(&self) {
        self.tx.lock().take();
        let worker = self.worker.lock().take();

        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!("Audit consumer task failed: {}", e);
            }
            info!("Audit sink drained");
        }
    }
}

async fn run_consumer(store: Arc<JsonArrayStore>, mut rx: mpsc::Receiver<CallHeaderRecord>) {
    while let Some(record) = rx.recv().await {
        let store = store.clone();
        let written = tokio::task::spawn_blocking(move || {
            let entry = serde_json::to_value(&record)?;
            store.append(entry)
        })
        .await;

        match written {
            Ok(Ok(total)) => debug!("Audit log now holds {} entries", total),
            Ok(Err(e)) => warn!("Error saving audit record: {}", e),
            Err(e) => error!("Audit write task panicked: {}", e),
        }
    }
    debug!("Audit queue closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{extract, InboundRequest};

    fn record(call_id: &str) -> CallHeaderRecord {
        let request = InboundRequest::new("INVITE", "sip:bob@example.com")
            .with_header("From", "sip:alice@example.com")
            .with_header("To", "sip:bob@example.com")
            .with_header("Call-ID", call_id);
        extract(&request).unwrap().record
    }

    #[tokio::test]
    async fn test_records_written_after_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonArrayStore::new(dir.path().join("save/headers.json"));
        let sink = AuditSink::start(store.clone(), 4).unwrap();

        for i in 0..10 {
            sink.submit(record(&format!("call-{}", i))).await;
        }
        sink.shutdown().await;

        let entries = store.load();
        assert_eq!(entries.len(), 10);
        assert!(entries.iter().all(|e| e["Method"] == "INVITE"));
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonArrayStore::new(dir.path().join("headers.json"));
        let sink = AuditSink::start(store.clone(), 1).unwrap();
        sink.shutdown().await;

        sink.submit(record("late")).await;
        sink.shutdown().await;
        assert!(store.load().is_empty());
    }

    #[tokio::test]
    async fn test_deferrals_are_capped() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonArrayStore::new(dir.path().join("headers.json"));
        let sink = AuditSink::start(store.clone(), 2).unwrap();

        // Nothing yields on the current-thread runtime until the queue and
        // the deferral permits are both used up
        for i in 0..4 {
            sink.submit(record(&format!("burst-{}", i))).await;
        }
        assert_eq!(sink.pending_deferrals(), 2);

        for i in 4..20 {
            sink.submit(record(&format!("burst-{}", i))).await;
            assert!(sink.pending_deferrals() <= 2);
        }
        sink.shutdown().await;

        assert_eq!(store.load().len(), 20);
        assert_eq!(sink.pending_deferrals(), 0);
    }

    #[tokio::test]
    async fn test_zero_capacity_rejected() {
        let store = JsonArrayStore::new("/tmp/unused.json");
        assert!(matches!(AuditSink::start(store, 0), Err(VerdictError::ConfigError(_))));
    }
}
