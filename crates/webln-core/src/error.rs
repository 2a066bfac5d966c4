//! Error taxonomy shared by every context of the bridge.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a WebLN request can end with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeblnError {
    /// Malformed or inconsistent request.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Amount missing, conflicting or out of bounds.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The user refused, or the domain is blocked.
    #[error("request denied: {0}")]
    UserDenied(String),

    /// Another prompt is already waiting for the user.
    #[error("a prompt is already active")]
    PromptBusy,

    /// The wallet backend answered with an error.
    #[error("backend error {code}: {message}")]
    Backend { code: String, message: String },

    /// The backend or another context could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// The operation is not offered by this wallet.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// No backend credentials are configured.
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// Local failure not caused by the request, e.g. storage.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Wire classification of [`WeblnError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    InvalidAmount,
    UserDenied,
    PromptBusy,
    Backend,
    Transport,
    Unsupported,
    NotConfigured,
    Internal,
}

/// Error as posted in a window response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub kind: ErrorKind,
    pub message: String,
    /// Backend error code, only for [`ErrorKind::Backend`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl WeblnError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::InvalidAmount(_) => ErrorKind::InvalidAmount,
            Self::UserDenied(_) => ErrorKind::UserDenied,
            Self::PromptBusy => ErrorKind::PromptBusy,
            Self::Backend { .. } => ErrorKind::Backend,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::NotConfigured(_) => ErrorKind::NotConfigured,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Raised before anything reached the backend.
    pub fn is_local(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation
                | ErrorKind::InvalidAmount
                | ErrorKind::UserDenied
                | ErrorKind::PromptBusy
                | ErrorKind::Unsupported
                | ErrorKind::NotConfigured
        )
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self::UserDenied(reason.into())
    }

    pub fn to_wire(&self) -> WireError {
        let (message, code) = match self {
            Self::Backend { code, message } => (message.clone(), Some(code.clone())),
            Self::PromptBusy => (self.to_string(), None),
            Self::Validation(m)
            | Self::InvalidAmount(m)
            | Self::UserDenied(m)
            | Self::Transport(m)
            | Self::Unsupported(m)
            | Self::NotConfigured(m)
            | Self::Internal(m) => (m.clone(), None),
        };
        WireError {
            kind: self.kind(),
            message,
            code,
        }
    }
}

impl From<WireError> for WeblnError {
    fn from(wire: WireError) -> Self {
        let WireError {
            kind,
            message,
            code,
        } = wire;
        match kind {
            ErrorKind::Validation => Self::Validation(message),
            ErrorKind::InvalidAmount => Self::InvalidAmount(message),
            ErrorKind::UserDenied => Self::UserDenied(message),
            ErrorKind::PromptBusy => Self::PromptBusy,
            ErrorKind::Backend => Self::Backend {
                code: code.unwrap_or_default(),
                message,
            },
            ErrorKind::Transport => Self::Transport(message),
            ErrorKind::Unsupported => Self::Unsupported(message),
            ErrorKind::NotConfigured => Self::NotConfigured(message),
            ErrorKind::Internal => Self::Internal(message),
        }
    }
}

impl From<&WeblnError> for WireError {
    fn from(error: &WeblnError) -> Self {
        error.to_wire()
    }
}

#[cfg(feature = "spark")]
impl From<spark_driver::DriverError> for WeblnError {
    fn from(error: spark_driver::DriverError) -> Self {
        use spark_driver::DriverError;

        match error {
            DriverError::Rpc { code, message } => Self::Backend { code, message },
            DriverError::InvalidAmount(m) => Self::InvalidAmount(m),
            DriverError::InvalidInvoice(m) => Self::Validation(m),
            DriverError::Config(m) => Self::NotConfigured(m),
            DriverError::UnexpectedResponse(m) => Self::Backend {
                code: "unexpected_response".to_string(),
                message: m,
            },
            other => Self::Transport(other.to_string()),
        }
    }
}
