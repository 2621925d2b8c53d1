// ABOUTME: Error types for script loading, provider initialization and sign-in operations
// ABOUTME: Separates vendor-raised failures from the normalized errors surfaced to callers

use serde_json::Value;
use thiserror::Error;

use crate::provider::ProviderKind;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Failed to load script: {url}")]
    ResourceLoadFailed { url: String },

    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("{0} sign-in is not initialized")]
    NotInitialized(ProviderKind),

    #[error("Another {0} operation is already in progress")]
    OperationInProgress(ProviderKind),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("{0} session controller has been disposed")]
    Disposed(ProviderKind),
}

/// A failure raised by a vendor SDK, before normalization.
///
/// `Error` mirrors a thrown error object that carries a message. `Thrown` is
/// any other rejected value; it never reaches callers as-is and is replaced by
/// a provider-specific default message.
#[derive(Debug, Clone, PartialEq)]
pub enum VendorError {
    Error { message: String },
    Thrown(Value),
}

impl VendorError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Message of the vendor error, or `fallback` when the vendor threw a non-error value
    pub fn message_or(&self, fallback: &str) -> String {
        match self {
            Self::Error { message } if !message.is_empty() => message.clone(),
            _ => fallback.to_string(),
        }
    }

    pub fn into_initialization_failed(self, fallback: &str) -> AuthError {
        AuthError::InitializationFailed(self.message_or(fallback))
    }

    pub fn into_operation_failed(self, fallback: &str) -> AuthError {
        AuthError::OperationFailed(self.message_or(fallback))
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::MalformedResponse(err.to_string())
    }
}
