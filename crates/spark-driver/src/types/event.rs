//! Server-pushed wallet events.

use serde::{Deserialize, Serialize};

/// Name of the frame emitted when one of our invoices gets paid.
pub const INVOICE_PAID_EVENT: &str = "inv-paid";

/// Payload of an `inv-paid` frame.
#[derive(Debug, Deserialize)]
pub(crate) struct RawInvoicePaid {
    #[serde(default)]
    pub description: String,
    pub msatoshi_received: u64,
    pub payment_hash: String,
}

/// Normalized event delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WalletEvent {
    /// One of our invoices was paid.
    PaymentReceived {
        /// Amount received in millisatoshi.
        amount: u64,
        description: String,
        hash: String,
    },
}

impl From<RawInvoicePaid> for WalletEvent {
    fn from(raw: RawInvoicePaid) -> Self {
        WalletEvent::PaymentReceived {
            amount: raw.msatoshi_received,
            description: raw.description,
            hash: raw.payment_hash,
        }
    }
}

impl WalletEvent {
    /// Payment hash the event refers to.
    pub fn hash(&self) -> &str {
        match self {
            WalletEvent::PaymentReceived { hash, .. } => hash,
        }
    }
}
