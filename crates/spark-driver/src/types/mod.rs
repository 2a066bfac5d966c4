//! Request and response types for the spark backend.
//!
//! `Raw*` types mirror the backend's native field names; the public types are
//! the canonical shapes handed to the rest of the bridge.

mod event;
mod invoice;
mod node;
mod payment;

pub use event::{WalletEvent, INVOICE_PAID_EVENT};
pub use invoice::{
    CreatedInvoice, DecodedInvoice, InvoiceAmount, InvoiceRecord, InvoiceRequest,
    INVOICE_EXPIRY_SECONDS, LABEL_PREFIX,
};
pub use node::{Funds, NodeInfo, Transaction, WalletSummary, TRANSACTION_HISTORY_LIMIT};
pub use payment::{PayRequest, PaymentRecord, PaymentResult, DEFAULT_PAY_LABEL};

pub(crate) use event::RawInvoicePaid;
pub(crate) use invoice::{RawCreatedInvoice, RawDecodedInvoice, RawInvoiceList};
pub(crate) use node::{RawFunds, RawInfo};
pub(crate) use payment::{RawPayResult, RawPaymentList};
