//! Error types for secret service operations.

use secretbus_core::ConfigError;
use thiserror::Error;

use crate::bus::BusError;

/// Errors that can occur during secret service operations.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The caller passed something invalid. Never reaches the bus.
    #[error("Usage error: {0}")]
    Usage(String),

    /// The bus could not be reached or returned something unreadable.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service reported an error.
    #[error("Remote error {name}: {message}")]
    Remote { name: String, message: String },

    /// No transport session could be agreed with the service.
    #[error("Session negotiation failed: {0}")]
    Negotiation(String),

    /// A secret payload failed its integrity check.
    #[error("Secret integrity check failed: {0}")]
    Integrity(String),

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SecretError {
    /// Whether this error concerns the transport session.
    pub fn is_session_error(&self) -> bool {
        matches!(self, SecretError::Negotiation(_) | SecretError::Integrity(_))
    }

    /// Whether this is a caller cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SecretError::Cancelled)
    }

    /// Remote fault name, if any.
    pub fn remote_name(&self) -> Option<&str> {
        match self {
            SecretError::Remote { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl From<BusError> for SecretError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Fault { name, message } => SecretError::Remote { name, message },
            BusError::Disconnected(msg) | BusError::Malformed(msg) => SecretError::Transport(msg),
        }
    }
}

/// Convenience result alias for secret service operations.
pub type Result<T> = std::result::Result<T, SecretError>;
