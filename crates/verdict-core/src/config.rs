//! Configuration for the verdict service

use crate::audit::DEFAULT_QUEUE_CAPACITY;
use crate::common::errors::{Result, VerdictError};
use infra_common::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment prefix for overrides, e.g. `SIPVERDICT__POLICY__TIMEOUT_MS=750`
pub const ENV_PREFIX: &str = "SIPVERDICT";

/// Where verdicts come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictMode {
    /// Ask the external policy service
    RoundTrip,
    /// Match the From user part against `allow_list.identities`
    AllowList,
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerdictConfig {
    pub mode: VerdictMode,
    pub policy: PolicyConfig,
    pub allow_list: AllowListConfig,
    pub audit: AuditConfig,
    /// Artificial delay before the verdict is returned, in milliseconds
    pub delay_ms: u64,
    pub logging: LoggingConfig,
}

/// Policy service connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// NATS server URLs
    pub servers: Vec<String>,
    /// Subject the records are published on
    pub subject: String,
    /// Bound on one round trip, in milliseconds
    pub timeout_ms: u64,
    /// Bound on opening a connection, in milliseconds
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AllowListConfig {
    /// From user parts that are allowed
    pub identities: Vec<String>,
}

/// Audit log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub path: PathBuf,
    pub queue_capacity: usize,
}

impl Default for VerdictConfig {
    fn default() -> Self {
        Self {
            mode: VerdictMode::RoundTrip,
            policy: PolicyConfig::default(),
            allow_list: AllowListConfig::default(),
            audit: AuditConfig::default(),
            delay_ms: 50,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://127.0.0.1:4222".to_string()],
            subject: "sip.verdict.request".to_string(),
            timeout_ms: 1000,
            connect_timeout_ms: 500,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("/usr/local/etc/opensips/python/save/headers.json"),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl VerdictConfig {
    /// Load defaults, then `path` if given, then `SIPVERDICT__*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Self = infra_common::config::load_layered(&Self::default(), path, ENV_PREFIX)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration for the static allow-list mode
    pub fn allow_list<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: VerdictMode::AllowList,
            allow_list: AllowListConfig {
                identities: identities.into_iter().map(Into::into).collect(),
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.mode == VerdictMode::RoundTrip {
            if self.policy.servers.is_empty() {
                return Err(VerdictError::ConfigError("policy.servers must not be empty".into()));
            }
            if self.policy.subject.trim().is_empty() {
                return Err(VerdictError::ConfigError("policy.subject must not be empty".into()));
            }
            if self.policy.timeout_ms == 0 {
                return Err(VerdictError::ConfigError("policy.timeout_ms must be positive".into()));
            }
        }
        if self.audit.enabled && self.audit.queue_capacity == 0 {
            return Err(VerdictError::ConfigError("audit.queue_capacity must be positive".into()));
        }
        infra_common::logging::parse_log_level(&self.logging.level)?;
        Ok(())
    }

    pub fn round_trip_timeout(&self) -> Duration {
        Duration::from_millis(self.policy.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.policy.connect_timeout_ms)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}
