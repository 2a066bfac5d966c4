//! Actions submitted to the controller.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::origin::{Origin, TabId};

/// Correlation id carried unchanged through every hop of a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// A fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Invoice request parameters, in satoshi.
///
/// `amount` fixes the value; otherwise the user picks one, proposed from
/// `default_amount` and bounded by `minimum_amount`/`maximum_amount`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceOptions {
    #[serde(
        default,
        deserialize_with = "crate::wire::lenient_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<u64>,
    #[serde(
        default,
        deserialize_with = "crate::wire::lenient_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub minimum_amount: Option<u64>,
    #[serde(
        default,
        deserialize_with = "crate::wire::lenient_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub maximum_amount: Option<u64>,
    #[serde(
        default,
        deserialize_with = "crate::wire::lenient_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_amount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_memo: Option<String>,
}

/// Fallback proposal when a site gives no hint at all.
pub const FALLBACK_INVOICE_AMOUNT: u64 = 100;

impl InvoiceOptions {
    pub fn fixed(amount: u64) -> Self {
        Self {
            amount: Some(amount),
            ..Default::default()
        }
    }

    /// Amount to propose to the user.
    pub fn proposed_amount(&self) -> u64 {
        self.amount
            .or(self.default_amount)
            .or(self.maximum_amount)
            .or(self.minimum_amount)
            .unwrap_or(FALLBACK_INVOICE_AMOUNT)
    }

    /// Whether `amount` lies within the declared bounds.
    pub fn accepts(&self, amount: u64) -> bool {
        self.minimum_amount.map_or(true, |min| amount >= min)
            && self.maximum_amount.map_or(true, |max| amount <= max)
    }
}

impl From<u64> for InvoiceOptions {
    fn from(amount: u64) -> Self {
        Self::fixed(amount)
    }
}

/// What an action asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    /// Authorize the origin.
    Enable,
    /// Node identity, no side effects.
    Info,
    /// Pay a BOLT11 invoice.
    Pay { invoice: String },
    /// Create an invoice.
    Invoice(InvoiceOptions),
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Info => "info",
            Self::Pay { .. } => "pay",
            Self::Invoice(_) => "invoice",
        }
    }

    /// Whether the user has to be asked before this runs.
    pub fn needs_prompt(&self) -> bool {
        matches!(self, Self::Pay { .. } | Self::Invoice(_))
    }
}

/// A request as the controller sees it. Consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: CorrelationId,
    pub origin: Origin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab: Option<TabId>,
    /// Input element an invoice should be pasted into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(flatten)]
    pub kind: ActionKind,
}

impl Action {
    pub fn new(id: CorrelationId, origin: Origin, kind: ActionKind) -> Self {
        Self {
            id,
            origin,
            tab: None,
            element_id: None,
            kind,
        }
    }

    pub fn in_tab(mut self, tab: TabId) -> Self {
        self.tab = Some(tab);
        self
    }

    pub fn with_element(mut self, element_id: impl Into<String>) -> Self {
        self.element_id = Some(element_id.into());
        self
    }

    pub fn domain(&self) -> &str {
        &self.origin.domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_ids_are_unique() {
        assert_ne!(CorrelationId::new(), CorrelationId::new());
        assert_eq!(CorrelationId::from("abc").as_str(), "abc");
    }

    #[test]
    fn test_proposed_amount_precedence() {
        assert_eq!(InvoiceOptions::default().proposed_amount(), 100);
        let options = InvoiceOptions {
            minimum_amount: Some(10),
            maximum_amount: Some(500),
            ..Default::default()
        };
        assert_eq!(options.proposed_amount(), 500);
        let options = InvoiceOptions {
            default_amount: Some(42),
            ..options
        };
        assert_eq!(options.proposed_amount(), 42);
        assert_eq!(InvoiceOptions::fixed(7).proposed_amount(), 7);
    }

    #[test]
    fn test_bounds() {
        let options = InvoiceOptions {
            minimum_amount: Some(10),
            maximum_amount: Some(20),
            ..Default::default()
        };
        assert!(options.accepts(10));
        assert!(options.accepts(20));
        assert!(!options.accepts(9));
        assert!(!options.accepts(21));
        assert!(InvoiceOptions::default().accepts(u64::MAX));
    }

    #[test]
    fn test_action_serialization() {
        let action = Action::new(
            CorrelationId::from("1"),
            Origin::new("a.example", "A"),
            ActionKind::Pay {
                invoice: "lnbc1".to_string(),
            },
        )
        .in_tab(TabId(3));

        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["kind"], "pay");
        assert_eq!(json["invoice"], "lnbc1");
        assert_eq!(json["tab"], 3);

        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn test_prompt_classification() {
        assert!(!ActionKind::Enable.needs_prompt());
        assert!(!ActionKind::Info.needs_prompt());
        assert!(ActionKind::Invoice(InvoiceOptions::default()).needs_prompt());
    }
}
