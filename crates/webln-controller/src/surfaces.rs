//! User-facing collaborators of the controller.
//!
//! Prompts, notifications and context menus are rendered elsewhere; the
//! controller only talks to these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use spark_driver::bolt11;
use spark_driver::{DecodedInvoice, WalletEvent};
use tracing::info;
use webln_core::{CorrelationId, InvoiceOptions, Origin, TabId, WeblnError};

/// What the user is being asked about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromptKind {
    Enable,
    Pay {
        invoice: String,
        /// Backend decoding, if it succeeded.
        decoded: Option<DecodedInvoice>,
    },
    Invoice {
        options: InvoiceOptions,
        /// Satoshi.
        proposed_amount: u64,
        proposed_memo: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptRequest {
    pub id: CorrelationId,
    pub origin: Origin,
    pub tab: Option<TabId>,
    #[serde(flatten)]
    pub kind: PromptKind,
}

/// The user's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum PromptDecision {
    /// Go ahead, optionally overriding amount (satoshi) and description.
    Approve {
        #[serde(default)]
        amount: Option<u64>,
        #[serde(default)]
        description: Option<String>,
    },
    /// Refuse; `remember` blocks the domain.
    Deny {
        #[serde(default)]
        remember: bool,
    },
}

impl PromptDecision {
    pub fn approve() -> Self {
        Self::Approve {
            amount: None,
            description: None,
        }
    }

    pub fn deny() -> Self {
        Self::Deny { remember: false }
    }
}

#[async_trait]
pub trait PromptSurface: Send + Sync {
    async fn prompt(&self, request: PromptRequest) -> Result<PromptDecision, WeblnError>;
}

/// Approves every prompt without overrides.
#[derive(Debug, Clone, Default)]
pub struct ApproveAll;

#[async_trait]
impl PromptSurface for ApproveAll {
    async fn prompt(&self, request: PromptRequest) -> Result<PromptDecision, WeblnError> {
        info!("Auto-approving prompt {} from {}", request.id, request.origin);
        Ok(PromptDecision::approve())
    }
}

/// Denies every prompt.
#[derive(Debug, Clone, Default)]
pub struct DenyAll;

#[async_trait]
impl PromptSurface for DenyAll {
    async fn prompt(&self, request: PromptRequest) -> Result<PromptDecision, WeblnError> {
        info!("Auto-denying prompt {} from {}", request.id, request.origin);
        Ok(PromptDecision::deny())
    }
}

/// A desktop-style notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn payment_received(event: &WalletEvent) -> Self {
        match event {
            WalletEvent::PaymentReceived {
                amount,
                description,
                ..
            } => {
                let message = if description.is_empty() {
                    format!("{} received", format_msat(*amount))
                } else {
                    format!("{} received for \"{}\"", format_msat(*amount), description)
                };
                Self::new("Payment received", message)
            }
        }
    }
}

/// Render millisatoshi the way the wallet UI does.
pub fn format_msat(msat: u64) -> String {
    if msat % 1000 == 0 {
        format!("{} sat", msat / 1000)
    } else {
        format!("{:.3} sat", msat as f64 / 1000.0)
    }
}

/// Effects the executor triggers after an action.
#[async_trait]
pub trait BehaviorSurface: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), WeblnError>;

    /// Return the wallet UI to its home screen.
    async fn navigate_home(&self, tab: Option<TabId>) -> Result<(), WeblnError>;

    /// Reset the browser action badge/popup for the tab.
    async fn cleanup_browser_action(&self, tab: Option<TabId>) -> Result<(), WeblnError>;

    /// Attach data to the action currently shown for the tab.
    async fn save_to_current_action(&self, tab: Option<TabId>, data: Value)
        -> Result<(), WeblnError>;
}

/// Discards every effect.
#[derive(Debug, Clone, Default)]
pub struct NoOpBehaviors;

#[async_trait]
impl BehaviorSurface for NoOpBehaviors {
    async fn notify(&self, _notification: Notification) -> Result<(), WeblnError> {
        Ok(())
    }

    async fn navigate_home(&self, _tab: Option<TabId>) -> Result<(), WeblnError> {
        Ok(())
    }

    async fn cleanup_browser_action(&self, _tab: Option<TabId>) -> Result<(), WeblnError> {
        Ok(())
    }

    async fn save_to_current_action(
        &self,
        _tab: Option<TabId>,
        _data: Value,
    ) -> Result<(), WeblnError> {
        Ok(())
    }
}

/// Logs every effect.
#[derive(Debug, Clone, Default)]
pub struct LoggingBehaviors;

#[async_trait]
impl BehaviorSurface for LoggingBehaviors {
    async fn notify(&self, notification: Notification) -> Result<(), WeblnError> {
        info!("[notify] {}: {}", notification.title, notification.message);
        Ok(())
    }

    async fn navigate_home(&self, tab: Option<TabId>) -> Result<(), WeblnError> {
        info!("[navigate] home ({:?})", tab);
        Ok(())
    }

    async fn cleanup_browser_action(&self, tab: Option<TabId>) -> Result<(), WeblnError> {
        info!("[browser-action] cleanup ({:?})", tab);
        Ok(())
    }

    async fn save_to_current_action(
        &self,
        tab: Option<TabId>,
        data: Value,
    ) -> Result<(), WeblnError> {
        info!("[current-action] {:?} <- {}", tab, data);
        Ok(())
    }
}

/// Context menu entry to offer for right-clicked text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum ContextMenuHint {
    /// Text is a payment request.
    PayInvoice { invoice: String },
    /// Text is an amount in satoshi.
    MakeInvoice { amount: u64 },
    Nothing,
}

impl ContextMenuHint {
    /// Classify right-clicked text.
    pub fn classify(text: &str) -> Self {
        let text = text.trim();
        if bolt11::looks_like_invoice(text) {
            return Self::PayInvoice {
                invoice: bolt11::strip_scheme(text).to_string(),
            };
        }

        let lowered = text.to_ascii_lowercase();
        let digits = lowered
            .trim_end_matches("sats")
            .trim_end_matches("sat")
            .trim()
            .replace([',', '_', ' '], "");
        match digits.parse::<u64>() {
            Ok(amount) if amount > 0 => Self::MakeInvoice { amount },
            _ => Self::Nothing,
        }
    }
}

#[async_trait]
pub trait ContextMenuSurface: Send + Sync {
    async fn update(&self, tab: Option<TabId>, hint: ContextMenuHint);
}

/// Logs context menu changes.
#[derive(Debug, Clone, Default)]
pub struct LoggingContextMenu;

#[async_trait]
impl ContextMenuSurface for LoggingContextMenu {
    async fn update(&self, tab: Option<TabId>, hint: ContextMenuHint) {
        info!("[context-menu] {:?}: {:?}", tab, hint);
    }
}
