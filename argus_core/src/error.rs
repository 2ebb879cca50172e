//! Unified error handling for the Argus fabric.
//!
//! One error enum covers endpoint setup, the sample protocol and file
//! writers, so every fallible operation in the workspace returns
//! [`ArgusResult`].

use thiserror::Error;

/// Main error type for Argus operations.
#[derive(Debug, Error)]
pub enum ArgusError {
    /// Another live Sink already owns the node at this address.
    #[error("address '{0}' is already bound by a live sink (run the janitor if that sink is dead)")]
    AddressInUse(String),

    /// This endpoint handle is already bound or attached to an address.
    #[error("endpoint is already bound to '{0}'")]
    AlreadyBound(String),

    /// Operation requires a bound endpoint.
    #[error("endpoint is not bound: {0}")]
    NotBound(String),

    /// No region exists at the given address.
    #[error("no node found at address '{0}'")]
    NotFound(String),

    /// Region allocation or mapping failed.
    #[error("insufficient memory for region '{name}': {reason}")]
    InsufficientMemory { name: String, reason: String },

    /// A typed write would exceed the node's advertised payload region.
    #[error("payload too large: need {needed} bytes, node advertises {available}")]
    PayloadTooLarge { needed: usize, available: usize },

    /// Shared memory layout or mapping invariant violated.
    #[error("memory error: {0}")]
    Memory(String),

    /// I/O failure from a file writer.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArgusError {
    /// Create a memory error with a custom message.
    pub fn memory<S: Into<String>>(msg: S) -> Self {
        ArgusError::Memory(msg.into())
    }

    /// Create a not-bound error with a custom message.
    pub fn not_bound<S: Into<String>>(msg: S) -> Self {
        ArgusError::NotBound(msg.into())
    }
}

/// Convenience type alias for Results using ArgusError.
pub type ArgusResult<T> = std::result::Result<T, ArgusError>;
