//! Links between the relay and the controller.
//!
//! Relays reach the controller through [`ControllerLink`]; the controller
//! reaches a registered relay through [`TabLink`]. Both model a one-shot
//! message with a reply.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::Action;
use crate::error::WeblnError;
use crate::origin::{Origin, TabId};

/// Messages a relay sends to the controller.
#[async_trait]
pub trait ControllerLink: Send + Sync {
    /// Submit an action and wait for its result.
    async fn submit(&self, action: Action) -> Result<Value, WeblnError>;

    /// Whether `domain` is blocked.
    async fn is_blocked(&self, domain: &str) -> Result<bool, WeblnError>;

    /// Text under a right-click, used to toggle context menu entries.
    async fn context_menu_hint(&self, tab: Option<TabId>, text: String);
}

/// Commands the controller sends to a relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum TabCommand {
    /// Report the page's origin.
    GetOrigin,
    /// Type `text` into the given element, or the focused one.
    Paste {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        element_id: Option<String>,
        text: String,
    },
    /// Drop any cached authorization state.
    InvalidateBlocked,
}

/// Reply to a [`TabCommand`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum TabReply {
    Origin(Origin),
    Done,
}

#[async_trait]
pub trait TabLink: Send + Sync {
    async fn command(&self, command: TabCommand) -> Result<TabReply, WeblnError>;
}
