//! The backend driver abstraction.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DriverError;
use crate::sse::SubscriptionHandle;
use crate::types::{
    CreatedInvoice, DecodedInvoice, Funds, InvoiceRecord, InvoiceRequest, NodeInfo, PayRequest,
    PaymentRecord, PaymentResult, WalletEvent, WalletSummary,
};

/// Callback invoked for every wallet event, from a background task.
pub type EventCallback = Arc<dyn Fn(WalletEvent) + Send + Sync>;

/// A wallet backend.
///
/// Exactly one driver is active per controller. Implementations translate
/// the abstract operations into calls against their remote wallet and keep a
/// long-lived event subscription alive.
#[async_trait]
pub trait LightningDriver: Send + Sync {
    /// Backend dialect identifier.
    fn kind(&self) -> &str;

    /// Node identity and chain position.
    async fn get_info(&self) -> Result<NodeInfo, DriverError>;

    /// Channel balances.
    async fn list_funds(&self) -> Result<Funds, DriverError>;

    /// Invoices known to the wallet.
    async fn list_invoices(&self) -> Result<Vec<InvoiceRecord>, DriverError>;

    /// Outgoing payments.
    async fn list_payments(&self) -> Result<Vec<PaymentRecord>, DriverError>;

    /// Pay an invoice.
    async fn pay(&self, request: PayRequest) -> Result<PaymentResult, DriverError>;

    /// Decode an invoice into its canonical fields.
    async fn decode(&self, bolt11: &str) -> Result<DecodedInvoice, DriverError>;

    /// Create an invoice.
    async fn make_invoice(&self, request: InvoiceRequest) -> Result<CreatedInvoice, DriverError>;

    /// Start (or replace) the payment notification subscription.
    async fn subscribe_events(
        &self,
        on_event: EventCallback,
    ) -> Result<SubscriptionHandle, DriverError>;

    /// Info, balance and recent history in one go.
    async fn summary(&self) -> Result<WalletSummary, DriverError> {
        let (info, funds, invoices, payments) = futures::try_join!(
            self.get_info(),
            self.list_funds(),
            self.list_invoices(),
            self.list_payments()
        )?;
        Ok(WalletSummary::build(info, funds, &invoices, &payments))
    }
}
