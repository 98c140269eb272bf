use crate::errors::types::{Error, Result};
use std::fmt;

/// Where an error happened: component, operation and optional details
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Component where the error occurred
    pub component: String,
    /// Operation that was being performed
    pub operation: String,
    /// Additional context information
    pub details: Option<String>,
}

impl ErrorContext {
    pub fn new<S: Into<String>, T: Into<String>>(component: S, operation: T) -> Self {
        ErrorContext {
            component: component.into(),
            operation: operation.into(),
            details: None,
        }
    }

    pub fn with_details<S: Into<String>>(mut self, details: S) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in component '{}' during operation '{}'", self.component, self.operation)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

/// Extension trait for attaching an [`ErrorContext`] to errors
pub trait ErrorExt {
    /// Add context to an error
    fn context(self, ctx: ErrorContext) -> Error;

    /// Add simple context with component and operation
    fn with_context<S: Into<String>, T: Into<String>>(self, component: S, operation: T) -> Error
    where
        Self: Sized,
    {
        self.context(ErrorContext::new(component, operation))
    }
}

impl ErrorExt for Error {
    fn context(self, ctx: ErrorContext) -> Error {
        match self {
            // Keep the variant for configuration errors so callers can still match on it
            Error::Config(msg) => Error::Config(format!("{} [{}]", msg, ctx)),
            other => Error::Custom(format!("{} [{}]", other, ctx)),
        }
    }
}

/// Context helpers for `Result` values
pub trait ResultExt<T> {
    fn context(self, ctx: ErrorContext) -> Result<T>;

    fn with_context<S: Into<String>, U: Into<String>>(self, component: S, operation: U) -> Result<T>
    where
        Self: Sized,
    {
        self.context(ErrorContext::new(component, operation))
    }
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, ctx: ErrorContext) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}
