//! Error types for the weaver
//!
//! Usage errors (configuration, pointcut, kind) are programmer errors and are
//! raised synchronously where the misuse happens. [`Exception`] is the one
//! error that belongs to the intercepted program: originals raise it and
//! after-throw advice may capture it.

use crate::weaver::Handle;
use thiserror::Error;

/// An error raised by an intercepted callable (or re-raised by advice)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{class}: {message}")]
pub struct Exception {
    /// Exception class name (e.g., "RuntimeError")
    pub class: String,
    /// Human-readable message
    pub message: String,
}

impl Exception {
    /// Create an exception with an explicit class name
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
        }
    }

    /// Create an exception of the generic `Exception` class
    pub fn message(message: impl Into<String>) -> Self {
        Self::new("Exception", message)
    }
}

/// Errors produced by the weaver, the dispatch engine and the patcher
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WeaverError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Pointcut error: {0}")]
    Pointcut(String),

    #[error("`{capability}` error: the interceptor does not support the `{kind}` kind")]
    Kind { capability: String, kind: String },

    #[error("No advice binding registered under handle {0}")]
    UnknownHandle(Handle),

    #[error("Patcher error: {0}")]
    Patcher(String),

    #[error(transparent)]
    Raised(#[from] Exception),
}

impl WeaverError {
    pub(crate) fn kind(capability: &str, kind: impl std::fmt::Display) -> Self {
        WeaverError::Kind {
            capability: capability.to_string(),
            kind: kind.to_string(),
        }
    }

    /// The raised exception, if this error carries one
    pub fn as_exception(&self) -> Option<&Exception> {
        match self {
            WeaverError::Raised(exception) => Some(exception),
            _ => None,
        }
    }
}

/// Result type for weaver operations
pub type Result<T> = std::result::Result<T, WeaverError>;
