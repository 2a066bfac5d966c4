//! Post-action effects.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::ActionKind;

/// An effect run after an action completes. Failures never change the
/// action's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Behavior {
    NotifyPaymentSuccess,
    NotifyPaymentError,
    NotifyInvoiceError,
    NavigateHome,
    /// Paste the created invoice into the originating page.
    PasteInvoice,
    CleanupBrowserAction,
    SaveInvoiceToCurrentAction,
}

impl Behavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotifyPaymentSuccess => "notify-payment-success",
            Self::NotifyPaymentError => "notify-payment-error",
            Self::NotifyInvoiceError => "notify-invoice-error",
            Self::NavigateHome => "navigate-home",
            Self::PasteInvoice => "paste-invoice",
            Self::CleanupBrowserAction => "cleanup-browser-action",
            Self::SaveInvoiceToCurrentAction => "save-invoice-to-current-action",
        }
    }
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered effects for each outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorPlan {
    #[serde(default)]
    pub success: Vec<Behavior>,
    #[serde(default)]
    pub failure: Vec<Behavior>,
}

impl BehaviorPlan {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(success: Vec<Behavior>, failure: Vec<Behavior>) -> Self {
        Self { success, failure }
    }

    pub fn pay() -> Self {
        use Behavior::*;
        Self::new(
            vec![NotifyPaymentSuccess, NavigateHome],
            vec![NotifyPaymentError, NavigateHome],
        )
    }

    pub fn invoice() -> Self {
        use Behavior::*;
        Self::new(
            vec![PasteInvoice, CleanupBrowserAction, SaveInvoiceToCurrentAction],
            vec![NotifyInvoiceError, CleanupBrowserAction],
        )
    }

    /// Default plan for an action kind.
    pub fn for_kind(kind: &ActionKind) -> Self {
        match kind {
            ActionKind::Pay { .. } => Self::pay(),
            ActionKind::Invoice(_) => Self::invoice(),
            ActionKind::Enable | ActionKind::Info => Self::none(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.success.is_empty() && self.failure.is_empty()
    }

    pub fn for_outcome(&self, succeeded: bool) -> &[Behavior] {
        if succeeded {
            &self.success
        } else {
            &self.failure
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plans() {
        let pay = BehaviorPlan::for_kind(&ActionKind::Pay {
            invoice: "lnbc1".to_string(),
        });
        assert_eq!(
            pay.for_outcome(true),
            &[Behavior::NotifyPaymentSuccess, Behavior::NavigateHome]
        );
        assert_eq!(
            pay.for_outcome(false),
            &[Behavior::NotifyPaymentError, Behavior::NavigateHome]
        );
        assert!(BehaviorPlan::for_kind(&ActionKind::Info).is_empty());
        assert!(BehaviorPlan::for_kind(&ActionKind::Enable).is_empty());
    }

    #[test]
    fn test_plan_parses_kebab_case() {
        let plan: BehaviorPlan = serde_json::from_str(
            r#"{"success": ["paste-invoice", "cleanup-browser-action", "save-invoice-to-current-action"],
                "failure": ["notify-invoice-error", "cleanup-browser-action"]}"#,
        )
        .unwrap();
        assert_eq!(plan, BehaviorPlan::invoice());
        assert_eq!(Behavior::PasteInvoice.to_string(), "paste-invoice");
    }
}
