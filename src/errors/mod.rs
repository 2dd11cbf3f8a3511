//! Error handling module for the admin client.
//!
//! Transport failures are captured as [`ApiFailure`] and folded into the closed
//! [`StoreError`] set that stores expose to views.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    pub const SERVER_ERROR: &str = "SERVER_ERROR";
    pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";
    pub const ACCOUNT_INACTIVE: &str = "ACCOUNT_INACTIVE";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
}

/// User-facing messages shared by every store.
pub mod messages {
    pub const SESSION_EXPIRED: &str = "Session expired. Please sign in again.";
    pub const NO_SESSION: &str = "No active session";
    pub const NETWORK: &str = "Connection error. Please check your internet connection.";
    pub const FORBIDDEN: &str = "You do not have permission to perform this action.";
}

/// Error recorded in a store's `last_error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend unreachable
    Network(String),
    /// Non-2xx answer other than authentication problems
    Server(String),
    /// Bad credentials or an expired session
    InvalidCredentials(String),
    /// Account exists but is not active
    AccountInactive(String),
    /// Rejected input
    Validation(String),
}

impl StoreError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::Network(_) => codes::NETWORK_ERROR,
            StoreError::Server(_) => codes::SERVER_ERROR,
            StoreError::InvalidCredentials(_) => codes::INVALID_CREDENTIALS,
            StoreError::AccountInactive(_) => codes::ACCOUNT_INACTIVE,
            StoreError::Validation(_) => codes::VALIDATION_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        match self {
            StoreError::Network(msg)
            | StoreError::Server(msg)
            | StoreError::InvalidCredentials(msg)
            | StoreError::AccountInactive(msg)
            | StoreError::Validation(msg) => msg,
        }
    }

    pub fn no_session() -> Self {
        StoreError::InvalidCredentials(messages::NO_SESSION.to_string())
    }

    /// Map a failed request, using `fallback` when the server gave no message.
    pub fn from_failure(failure: &ApiFailure, fallback: &str) -> Self {
        match failure {
            ApiFailure::Transport(_) => StoreError::Network(messages::NETWORK.to_string()),
            ApiFailure::Decode(_) => StoreError::Server(fallback.to_string()),
            ApiFailure::Status { status, body } => {
                let message = body.message_or(fallback);
                match *status {
                    StatusCode::UNAUTHORIZED => {
                        StoreError::InvalidCredentials(messages::SESSION_EXPIRED.to_string())
                    }
                    StatusCode::FORBIDDEN => StoreError::Server(messages::FORBIDDEN.to_string()),
                    StatusCode::BAD_REQUEST => StoreError::Validation(message),
                    _ => StoreError::Server(message),
                }
            }
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for StoreError {}

/// Error body returned by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorBody {
    fn message_or(&self, fallback: &str) -> String {
        self.message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}

/// Failure of a single HTTP round trip.
#[derive(Debug)]
pub enum ApiFailure {
    /// Connection, TLS or body transfer problem
    Transport(String),
    /// Backend answered with a non-success status
    Status { status: StatusCode, body: ErrorBody },
    /// Success status but an unreadable payload
    Decode(String),
}

impl ApiFailure {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiFailure::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiFailure::Transport(msg) => write!(f, "transport error: {}", msg),
            ApiFailure::Status { status, body } => match &body.message {
                Some(msg) => write!(f, "HTTP {}: {}", status.as_u16(), msg),
                None => write!(f, "HTTP {}", status.as_u16()),
            },
            ApiFailure::Decode(msg) => write!(f, "decode error: {}", msg),
        }
    }
}

impl std::error::Error for ApiFailure {}

impl From<reqwest::Error> for ApiFailure {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("HTTP transport error: {:?}", err);
        if err.is_decode() {
            ApiFailure::Decode(err.to_string())
        } else {
            ApiFailure::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiFailure {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        ApiFailure::Decode(format!("JSON error: {}", err))
    }
}
