//! Error handling for the pulse relay
//!
//! This module defines the crate-wide error type and a Result alias.
//! Per-line and per-observer failures have their own local types
//! ([`crate::pipeline::DecodeError`], [`crate::broadcast::DeliveryError`])
//! because they never escape the component that produced them.

use thiserror::Error;

/// Main error type for relay operations
#[derive(Error, Debug)]
pub enum RelayError {
    /// The device stream could not be obtained (bad path, permissions, no device)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The device stream failed or closed while the link was open
    #[error("Link fault on {device}: {message}")]
    LinkFault { device: String, message: String },

    /// The supervisor was asked to do something its current state forbids
    #[error("Invalid link state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: crate::types::LinkState,
    },

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<RelayError>,
    },
}

impl RelayError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        RelayError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error means the device could not be opened at all
    pub fn is_configuration(&self) -> bool {
        match self {
            RelayError::Config(_) | RelayError::Serial(_) => true,
            RelayError::WithContext { source, .. } => source.is_configuration(),
            _ => false,
        }
    }
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<RelayError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: RelayError = e.into();
            err.with_context(context)
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: RelayError = e.into();
            err.with_context(f())
        })
    }
}
