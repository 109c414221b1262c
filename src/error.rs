//! Error handling for the dataflow runtime
//!
//! This module defines the crate error type and a Result alias used by
//! values, message trees, ports, the scheduler and the configuration layer.
//!
//! Queue-full and queue-empty are deliberately absent: they are the normal
//! back-pressure and idle signals and are resolved by blocking.

use crate::dataflow::port::PortDirection;
use crate::dataflow::value::ValueKind;
use thiserror::Error;

/// Main error type for dataflow operations
#[derive(Error, Debug)]
pub enum DataflowError {
    /// A value was requested as a type other than the one it stores
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: ValueKind, found: ValueKind },

    /// Read-only name lookup on a message node found no such child
    #[error("Child not found: {0}")]
    NotFound(String),

    /// Read-only index lookup past the last child
    #[error("Child index {index} out of range (node has {len} children)")]
    IndexOutOfRange { index: usize, len: usize },

    /// A component tried to register a port name twice
    #[error("Port name already in use: {0}")]
    PortNameCollision(String),

    /// No port with this name exists on the component
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Operation is not valid for the port's direction
    #[error("Port '{port}' is not an {expected} port")]
    WrongDirection {
        port: String,
        expected: PortDirection,
    },

    /// A connected queue has no receiver left
    #[error("Port '{0}' is disconnected")]
    Disconnected(String),

    /// Optional timeout elapsed on a queue operation
    #[error("Timed out waiting on port '{0}'")]
    Timeout(String),

    /// Errors reported by a bus driver
    #[error("Bus error: {0}")]
    Bus(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<DataflowError>,
    },
}

impl DataflowError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        DataflowError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &DataflowError {
        match self {
            DataflowError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias for dataflow operations
pub type Result<T> = std::result::Result<T, DataflowError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
