//! Error types for the verdict-core library

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerdictError {
    #[error("Missing mandatory header: {0}")]
    MissingMandatoryHeader(&'static str),

    #[error("Policy service did not reply within {0:?}")]
    PolicyTimeout(Duration),

    #[error("Policy transport failure: {0}")]
    PolicyTransport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Audit sink failure: {0}")]
    AuditSink(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error(transparent)]
    Infra(#[from] infra_common::Error),
}

impl VerdictError {
    /// Failures of the policy round trip, all of which map to a reject
    pub fn is_policy_failure(&self) -> bool {
        matches!(
            self,
            VerdictError::PolicyTimeout(_)
                | VerdictError::PolicyTransport(_)
                | VerdictError::Serialization(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, VerdictError>;
