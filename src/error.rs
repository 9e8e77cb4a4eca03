//! Bridge error types.

use crate::protocol::{ErrorCode, Operation};
use crate::shared::RequestId;
use thiserror::Error;

/// Every way a client call can end other than success.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("{operation} timed out after {elapsed_ms}ms")]
    Timeout { operation: Operation, elapsed_ms: u64 },

    /// Not embedded in a parent frame, so there is nothing to talk to.
    #[error("No parent frame to send {0} to")]
    NoParentFrame(Operation),

    #[error("Bridge has been destroyed")]
    Destroyed,

    #[error("Request {0} was cancelled")]
    Cancelled(RequestId),

    /// The provider answered with `ERROR`. Displays the provider's message verbatim.
    #[error("{message}")]
    Remote { code: ErrorCode, message: String },

    #[error("Unexpected {received} in answer to {expected}")]
    UnexpectedResponse {
        expected: Operation,
        received: &'static str,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl BridgeError {
    /// The protocol-level error code this failure corresponds to.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::Remote { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Error returned by a [`WalletHandler`](crate::provider::WalletHandler).
///
/// Relayed to the client as an `ERROR` response carrying `code` and `message`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct WalletError {
    pub code: ErrorCode,
    pub message: String,
}

impl WalletError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn user_rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UserRejected, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unsupported, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

impl From<String> for WalletError {
    fn from(message: String) -> Self {
        Self::internal(message)
    }
}

impl From<&str> for WalletError {
    fn from(message: &str) -> Self {
        Self::internal(message)
    }
}
