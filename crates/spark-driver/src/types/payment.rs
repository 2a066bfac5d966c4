//! Outgoing payments.

use serde::{Deserialize, Serialize};

/// Label used when paying an invoice without a description.
pub const DEFAULT_PAY_LABEL: &str = "unnamed invoice";

/// Parameters for paying an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayRequest {
    pub bolt11: String,
    /// Explicit amount in millisatoshi. Only allowed for any-amount invoices.
    pub msatoshi: Option<u64>,
    pub description: Option<String>,
}

impl PayRequest {
    pub fn new(bolt11: impl Into<String>) -> Self {
        Self {
            bolt11: bolt11.into(),
            msatoshi: None,
            description: None,
        }
    }

    pub fn with_amount(mut self, msatoshi: u64) -> Self {
        self.msatoshi = Some(msatoshi);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// `pay` response.
#[derive(Debug, Deserialize)]
pub(crate) struct RawPayResult {
    pub payment_preimage: String,
    pub msatoshi: u64,
    pub msatoshi_sent: u64,
}

/// Outcome of a successful payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    /// Total sent including fees, in millisatoshi.
    pub msatoshi_paid: u64,
    /// Sent minus requested, in millisatoshi.
    pub msatoshi_fees: u64,
    pub preimage: String,
}

impl From<RawPayResult> for PaymentResult {
    fn from(raw: RawPayResult) -> Self {
        Self {
            msatoshi_paid: raw.msatoshi_sent,
            msatoshi_fees: raw.msatoshi_sent.saturating_sub(raw.msatoshi),
            preimage: raw.payment_preimage,
        }
    }
}

/// `listpayments` response.
#[derive(Debug, Deserialize)]
pub(crate) struct RawPaymentList {
    #[serde(default)]
    pub payments: Vec<PaymentRecord>,
}

/// A payment as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub status: String,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub msatoshi: u64,
    #[serde(default)]
    pub msatoshi_sent: u64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub payment_preimage: Option<String>,
    #[serde(default)]
    pub payment_hash: Option<String>,
}

impl PaymentRecord {
    pub fn is_complete(&self) -> bool {
        self.status == "complete"
    }
}
