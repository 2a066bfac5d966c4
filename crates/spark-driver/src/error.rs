//! Error types for spark-driver.

use thiserror::Error;

/// Errors that can occur when talking to the wallet backend.
#[derive(Debug, Error)]
pub enum DriverError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The backend answered with an error body (`{"code": .., "message": ..}`).
    #[error("RPC error {code}: {message}")]
    Rpc { code: String, message: String },

    /// Connection to the backend failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Amount is missing, conflicting or out of range.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Invoice string could not be interpreted.
    #[error("Invalid invoice: {0}")]
    InvalidInvoice(String),

    /// Event stream error.
    #[error("SSE error: {0}")]
    Sse(String),

    /// The event subscription gave up after exhausting its retries.
    #[error("Event subscription failed after {attempts} attempts")]
    SubscriptionFailed { attempts: u32 },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Response did not have the expected shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl DriverError {
    /// Whether this error came from the network layer rather than the backend
    /// or the caller's input.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Connection(_) | Self::Sse(_) | Self::SubscriptionFailed { .. }
        )
    }

    /// Whether this error was raised before any request left the process.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidAmount(_) | Self::InvalidInvoice(_))
    }
}
