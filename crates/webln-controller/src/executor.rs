//! Runs one wallet operation and its follow-up behaviors.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use spark_driver::{bolt11, check_pay_amount, InvoiceRequest, LightningDriver, PayRequest};
use tracing::{debug, info, warn};
use webln_core::{Behavior, BehaviorPlan, CorrelationId, TabCommand, TabId, TabLink, WeblnError};

use crate::surfaces::{format_msat, BehaviorSurface, Notification};

/// A single wallet operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Operation {
    Info,
    Summary,
    ListFunds,
    ListInvoices,
    ListPayments,
    Decode {
        invoice: String,
    },
    Pay {
        invoice: String,
        #[serde(default)]
        amount_msat: Option<u64>,
        #[serde(default)]
        description: Option<String>,
    },
    MakeInvoice {
        /// Satoshi.
        amount: u64,
        description: String,
        #[serde(default)]
        minimum: Option<u64>,
        #[serde(default)]
        maximum: Option<u64>,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Summary => "summary",
            Self::ListFunds => "list_funds",
            Self::ListInvoices => "list_invoices",
            Self::ListPayments => "list_payments",
            Self::Decode { .. } => "decode",
            Self::Pay { .. } => "pay",
            Self::MakeInvoice { .. } => "make_invoice",
        }
    }

    /// Check parameters without touching the backend.
    pub fn validate(&self) -> Result<(), WeblnError> {
        match self {
            Self::Decode { invoice } if bolt11::strip_scheme(invoice).is_empty() => {
                Err(WeblnError::Validation("invoice is empty".to_string()))
            }
            Self::Pay {
                invoice,
                amount_msat,
                ..
            } => {
                let invoice = bolt11::strip_scheme(invoice);
                if invoice.is_empty() {
                    return Err(WeblnError::Validation("invoice is empty".to_string()));
                }
                check_pay_amount(invoice, amount_msat.filter(|m| *m > 0))?;
                Ok(())
            }
            Self::MakeInvoice {
                amount,
                minimum,
                maximum,
                ..
            } => {
                if *amount == 0 {
                    return Err(WeblnError::InvalidAmount(
                        "invoice amount must be positive".to_string(),
                    ));
                }
                if let Some(min) = minimum.filter(|min| amount < min) {
                    return Err(WeblnError::InvalidAmount(format!(
                        "{} sat is below the minimum of {} sat",
                        amount, min
                    )));
                }
                if let Some(max) = maximum.filter(|max| amount > max) {
                    return Err(WeblnError::InvalidAmount(format!(
                        "{} sat is above the maximum of {} sat",
                        amount, max
                    )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Who an operation runs for.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    pub action: Option<CorrelationId>,
    pub tab: Option<TabId>,
    /// Element that should receive a pasted invoice.
    pub element_id: Option<String>,
    /// Relay of the originating tab, if registered.
    pub tab_link: Option<Arc<dyn TabLink>>,
}

impl ExecutionContext {
    /// Context for calls from the wallet UI itself.
    pub fn privileged() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("action", &self.action)
            .field("tab", &self.tab)
            .field("element_id", &self.element_id)
            .field("tab_link", &self.tab_link.is_some())
            .finish()
    }
}

/// Executes operations against the active driver.
pub struct ActionExecutor<D: LightningDriver> {
    driver: Arc<D>,
    behaviors: Arc<dyn BehaviorSurface>,
}

impl<D: LightningDriver> Clone for ActionExecutor<D> {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
            behaviors: self.behaviors.clone(),
        }
    }
}

impl<D: LightningDriver> ActionExecutor<D> {
    pub fn new(driver: Arc<D>, behaviors: Arc<dyn BehaviorSurface>) -> Self {
        Self { driver, behaviors }
    }

    pub fn driver(&self) -> &Arc<D> {
        &self.driver
    }

    /// Validate, perform exactly one driver call, then run the behaviors for
    /// the outcome in order.
    pub async fn execute(
        &self,
        ctx: &ExecutionContext,
        operation: Operation,
        plan: &BehaviorPlan,
    ) -> Result<Value, WeblnError> {
        operation.validate()?;

        let name = operation.name();
        debug!("Executing {} for {:?}", name, ctx.action);
        let result = self.call(operation).await;

        match &result {
            Ok(_) => info!("{} succeeded", name),
            Err(e) => warn!("{} failed: {}", name, e),
        }

        for behavior in plan.for_outcome(result.is_ok()) {
            if let Err(e) = self.run_behavior(*behavior, ctx, &result).await {
                warn!("Behavior {} failed: {}", behavior, e);
            }
        }

        result
    }

    async fn call(&self, operation: Operation) -> Result<Value, WeblnError> {
        let driver = &self.driver;
        let value = match operation {
            Operation::Info => to_value(driver.get_info().await?)?,
            Operation::Summary => to_value(driver.summary().await?)?,
            Operation::ListFunds => to_value(driver.list_funds().await?)?,
            Operation::ListInvoices => to_value(driver.list_invoices().await?)?,
            Operation::ListPayments => to_value(driver.list_payments().await?)?,
            Operation::Decode { invoice } => to_value(driver.decode(&invoice).await?)?,
            Operation::Pay {
                invoice,
                amount_msat,
                description,
            } => {
                let mut request = PayRequest::new(invoice);
                if let Some(msat) = amount_msat {
                    request = request.with_amount(msat);
                }
                if let Some(description) = description {
                    request = request.with_description(description);
                }
                to_value(driver.pay(request).await?)?
            }
            Operation::MakeInvoice {
                amount,
                description,
                ..
            } => {
                let msat = amount.checked_mul(1000).ok_or_else(|| {
                    WeblnError::InvalidAmount(format!("{} sat is out of range", amount))
                })?;
                to_value(
                    driver
                        .make_invoice(InvoiceRequest::new(msat, description))
                        .await?,
                )?
            }
        };
        Ok(value)
    }

    async fn run_behavior(
        &self,
        behavior: Behavior,
        ctx: &ExecutionContext,
        result: &Result<Value, WeblnError>,
    ) -> Result<(), WeblnError> {
        debug!("Running behavior {}", behavior);
        match behavior {
            Behavior::NotifyPaymentSuccess => {
                let message = match result {
                    Ok(value) => {
                        let paid = value["msatoshi_paid"].as_u64().unwrap_or_default();
                        let fees = value["msatoshi_fees"].as_u64().unwrap_or_default();
                        format!("{} paid ({} fees)", format_msat(paid), format_msat(fees))
                    }
                    Err(_) => "Payment sent".to_string(),
                };
                self.behaviors
                    .notify(Notification::new("Payment sent", message))
                    .await
            }
            Behavior::NotifyPaymentError => {
                self.behaviors
                    .notify(Notification::new("Payment failed", error_message(result)))
                    .await
            }
            Behavior::NotifyInvoiceError => {
                self.behaviors
                    .notify(Notification::new(
                        "Failed to create invoice",
                        error_message(result),
                    ))
                    .await
            }
            Behavior::NavigateHome => self.behaviors.navigate_home(ctx.tab).await,
            Behavior::CleanupBrowserAction => self.behaviors.cleanup_browser_action(ctx.tab).await,
            Behavior::SaveInvoiceToCurrentAction => {
                let data = result.as_ref().map_err(Clone::clone)?;
                self.behaviors
                    .save_to_current_action(ctx.tab, serde_json::json!({ "invoiceData": data }))
                    .await
            }
            Behavior::PasteInvoice => {
                let bolt11 = result
                    .as_ref()
                    .map_err(Clone::clone)?
                    .get("bolt11")
                    .and_then(Value::as_str)
                    .ok_or_else(|| WeblnError::Validation("result has no invoice".to_string()))?
                    .to_string();
                let link = ctx
                    .tab_link
                    .as_ref()
                    .ok_or_else(|| WeblnError::Validation("no tab to paste into".to_string()))?;
                link.command(TabCommand::Paste {
                    element_id: ctx.element_id.clone(),
                    text: bolt11,
                })
                .await
                .map(|_| ())
            }
        }
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, WeblnError> {
    serde_json::to_value(value).map_err(|e| WeblnError::Internal(e.to_string()))
}

fn error_message(result: &Result<Value, WeblnError>) -> String {
    match result {
        Err(WeblnError::Backend { message, .. }) => message.clone(),
        Err(e) => e.to_string(),
        Ok(_) => String::new(),
    }
}
