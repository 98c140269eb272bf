//! NATS request/reply channel for the policy service

use super::channel::RequestChannel;
use crate::common::errors::{Result, VerdictError};
use async_nats::client::RequestErrorKind;
use async_nats::connection::State;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Default time allowed for establishing a connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Why a request on an open connection failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestFailure {
    /// The server gave up waiting for a reply; the connection is still usable
    TimedOut,
    /// Nobody is subscribed to the subject; the connection is still usable
    NoResponders,
    /// Any other failure; the connection is dropped
    Broken(String),
}

/// An open messaging connection
#[async_trait]
pub trait Connection: Send + Sync {
    async fn request(&self, subject: &str, payload: Bytes) -> std::result::Result<Bytes, RequestFailure>;

    /// Whether the connection is known to be lost
    fn is_disconnected(&self) -> bool;

    async fn flush(&self) -> Result<()>;
}

/// Opens connections for a [`NatsChannel`]
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: Connection + 'static;

    async fn connect(&self) -> Result<Self::Connection>;

    /// Server addresses, for logs
    fn target(&self) -> String;
}

/// Connects to a list of NATS servers
pub struct NatsConnector {
    servers: Vec<String>,
    connect_timeout: Duration,
}

impl NatsConnector {
    pub fn new(servers: Vec<String>, connect_timeout: Duration) -> Self {
        Self {
            servers,
            connect_timeout,
        }
    }

    pub fn servers(&self) -> &[String] {
        &self.servers
    }
}

#[async_trait]
impl Connector for NatsConnector {
    type Connection = async_nats::Client;

    async fn connect(&self) -> Result<async_nats::Client> {
        if self.servers.is_empty() {
            return Err(VerdictError::ConfigError("no NATS servers configured".into()));
        }

        let addrs = self.target();
        async_nats::ConnectOptions::new()
            .connection_timeout(self.connect_timeout)
            .connect(addrs.as_str())
            .await
            .map_err(|e| VerdictError::PolicyTransport(format!("connect to {} failed: {}", addrs, e)))
    }

    fn target(&self) -> String {
        self.servers.join(",")
    }
}

#[async_trait]
impl Connection for async_nats::Client {
    async fn request(&self, subject: &str, payload: Bytes) -> std::result::Result<Bytes, RequestFailure> {
        match async_nats::Client::request(self, subject.to_string(), payload).await {
            Ok(message) => Ok(message.payload),
            Err(e) => Err(match e.kind() {
                RequestErrorKind::TimedOut => RequestFailure::TimedOut,
                RequestErrorKind::NoResponders => RequestFailure::NoResponders,
                _ => RequestFailure::Broken(e.to_string()),
            }),
        }
    }

    fn is_disconnected(&self) -> bool {
        matches!(self.connection_state(), State::Disconnected)
    }

    async fn flush(&self) -> Result<()> {
        async_nats::Client::flush(self)
            .await
            .map_err(|e| VerdictError::PolicyTransport(format!("flush failed: {}", e)))
    }
}

/// Request channel with a lazily established, reused connection.
///
/// The connection is opened on the first request. A failed attempt is not
/// remembered. When the connection is found disconnected, or a request fails
/// for a reason other than a timeout or a missing responder, it is dropped and
/// a fresh one is opened on the next call.
pub struct NatsChannel<C: Connector = NatsConnector> {
    connector: C,
    connection: Mutex<Option<Arc<C::Connection>>>,
}

impl NatsChannel {
    pub fn new(servers: Vec<String>, connect_timeout: Duration) -> Self {
        Self::with_connector(NatsConnector::new(servers, connect_timeout))
    }
}

impl<C: Connector> NatsChannel<C> {
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector,
            connection: Mutex::new(None),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Current connection, reconnecting when the previous one was lost
    async fn connection(&self) -> Result<Arc<C::Connection>> {
        let mut guard = self.connection.lock().await;

        if let Some(connection) = guard.as_ref() {
            if !connection.is_disconnected() {
                return Ok(connection.clone());
            }
            warn!("Connection to {} lost, reconnecting", self.connector.target());
            guard.take();
        }

        debug!("Connecting to {}", self.connector.target());
        let connection = Arc::new(self.connector.connect().await?);
        info!("Connected to {}", self.connector.target());

        *guard = Some(connection.clone());
        Ok(connection)
    }

    /// Forget the current connection so the next call opens a new one
    async fn invalidate(&self) {
        if self.connection.lock().await.take().is_some() {
            debug!("Dropped connection to {} after request failure", self.connector.target());
        }
    }
}

#[async_trait]
impl<C: Connector> RequestChannel for NatsChannel<C> {
    async fn request(&self, subject: &str, payload: Bytes) -> Result<Bytes> {
        let connection = self.connection().await?;

        match connection.request(subject, payload).await {
            Ok(reply) => Ok(reply),
            Err(RequestFailure::TimedOut) => Err(VerdictError::PolicyTransport(format!(
                "request on '{}' timed out",
                subject
            ))),
            Err(RequestFailure::NoResponders) => Err(VerdictError::PolicyTransport(format!(
                "no responders on '{}'",
                subject
            ))),
            Err(RequestFailure::Broken(reason)) => {
                self.invalidate().await;
                Err(VerdictError::PolicyTransport(format!(
                    "request on '{}' failed: {}",
                    subject, reason
                )))
            }
        }
    }

    async fn close(&self) -> Result<()> {
        let connection = self.connection.lock().await.take();
        if let Some(connection) = connection {
            connection.flush().await?;
            info!("Channel to {} closed", self.connector.target());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "nats"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct ConnectionState {
        disconnected: AtomicBool,
        flushed: AtomicBool,
        failure: parking_lot::Mutex<Option<RequestFailure>>,
    }

    /// Replies with the number of the connect attempt that opened it
    struct FakeConnection {
        attempt: usize,
        state: Arc<ConnectionState>,
    }

    #[async_trait]
    impl Connection for FakeConnection {
        async fn request(&self, _subject: &str, _payload: Bytes) -> std::result::Result<Bytes, RequestFailure> {
            let failure = self.state.failure.lock().clone();
            match failure {
                Some(failure) => Err(failure),
                None => Ok(Bytes::from(self.attempt.to_string())),
            }
        }

        fn is_disconnected(&self) -> bool {
            self.state.disconnected.load(Ordering::SeqCst)
        }

        async fn flush(&self) -> Result<()> {
            self.state.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Refuses the first `refuse` attempts, then hands out fake connections
    #[derive(Default)]
    struct FakeConnector {
        refuse: usize,
        attempts: AtomicUsize,
        opened: parking_lot::Mutex<Vec<Arc<ConnectionState>>>,
    }

    impl FakeConnector {
        fn refusing(refuse: usize) -> Self {
            Self {
                refuse,
                ..Default::default()
            }
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }

        fn opened(&self, index: usize) -> Arc<ConnectionState> {
            self.opened.lock()[index].clone()
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        type Connection = FakeConnection;

        async fn connect(&self) -> Result<FakeConnection> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.refuse {
                return Err(VerdictError::PolicyTransport("connection refused".into()));
            }
            let state = Arc::new(ConnectionState::default());
            self.opened.lock().push(state.clone());
            Ok(FakeConnection { attempt, state })
        }

        fn target(&self) -> String {
            "fake://policy".into()
        }
    }

    async fn ask(channel: &NatsChannel<FakeConnector>) -> Result<String> {
        let reply = channel.request("sip.verdict.request", Bytes::from_static(b"{}")).await?;
        Ok(String::from_utf8_lossy(&reply).into_owned())
    }

    #[test]
    fn test_nats_channel_creation() {
        let channel = NatsChannel::new(
            vec!["nats://127.0.0.1:4222".to_string(), "nats://127.0.0.2:4222".to_string()],
            DEFAULT_CONNECT_TIMEOUT,
        );
        assert_eq!(channel.connector().servers().len(), 2);
        assert_eq!(channel.connector().target(), "nats://127.0.0.1:4222,nats://127.0.0.2:4222");
        assert_eq!(channel.name(), "nats");
    }

    #[tokio::test]
    async fn test_no_servers_is_config_error() {
        let channel = NatsChannel::new(Vec::new(), DEFAULT_CONNECT_TIMEOUT);
        let err = channel.request("sip.verdict.request", Bytes::new()).await.unwrap_err();
        assert!(matches!(err, VerdictError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_close_without_connection_is_noop() {
        let channel = NatsChannel::new(vec!["nats://127.0.0.1:4222".into()], DEFAULT_CONNECT_TIMEOUT);
        assert!(channel.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_connection_is_reused() {
        let channel = NatsChannel::with_connector(FakeConnector::default());
        assert_eq!(ask(&channel).await.unwrap(), "1");
        assert_eq!(ask(&channel).await.unwrap(), "1");
        assert_eq!(channel.connector().attempts(), 1);
    }

    #[tokio::test]
    async fn test_failed_connect_is_retried_on_next_call() {
        let channel = NatsChannel::with_connector(FakeConnector::refusing(1));

        let err = ask(&channel).await.unwrap_err();
        assert!(matches!(err, VerdictError::PolicyTransport(_)));

        assert_eq!(ask(&channel).await.unwrap(), "2");
        assert_eq!(channel.connector().attempts(), 2);
    }

    #[tokio::test]
    async fn test_reconnects_after_disconnect() {
        let channel = NatsChannel::with_connector(FakeConnector::default());
        assert_eq!(ask(&channel).await.unwrap(), "1");

        channel.connector().opened(0).disconnected.store(true, Ordering::SeqCst);

        assert_eq!(ask(&channel).await.unwrap(), "2");
        assert_eq!(channel.connector().attempts(), 2);
    }

    #[tokio::test]
    async fn test_broken_request_drops_connection() {
        let channel = NatsChannel::with_connector(FakeConnector::default());
        assert_eq!(ask(&channel).await.unwrap(), "1");

        *channel.connector().opened(0).failure.lock() = Some(RequestFailure::Broken("connection reset".into()));
        assert!(ask(&channel).await.is_err());

        assert_eq!(ask(&channel).await.unwrap(), "2");
        assert_eq!(channel.connector().attempts(), 2);
    }

    #[tokio::test]
    async fn test_timeouts_keep_connection() {
        let channel = NatsChannel::with_connector(FakeConnector::default());
        assert_eq!(ask(&channel).await.unwrap(), "1");

        let state = channel.connector().opened(0);
        for failure in [RequestFailure::TimedOut, RequestFailure::NoResponders] {
            *state.failure.lock() = Some(failure);
            assert!(matches!(ask(&channel).await, Err(VerdictError::PolicyTransport(_))));
        }

        *state.failure.lock() = None;
        assert_eq!(ask(&channel).await.unwrap(), "1");
        assert_eq!(channel.connector().attempts(), 1);
    }

    #[tokio::test]
    async fn test_close_flushes_and_next_call_reconnects() {
        let channel = NatsChannel::with_connector(FakeConnector::default());
        assert_eq!(ask(&channel).await.unwrap(), "1");

        channel.close().await.unwrap();
        assert!(channel.connector().opened(0).flushed.load(Ordering::SeqCst));

        assert_eq!(ask(&channel).await.unwrap(), "2");
    }
}
