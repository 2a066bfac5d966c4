//! Driver for a lightningd spark server.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::bolt11;
use crate::config::{DriverConfig, DRIVER_KIND};
use crate::driver::{EventCallback, LightningDriver};
use crate::error::DriverError;
use crate::sse::{EventConnector, EventSubscriber, SseConnector, SubscriptionHandle};
use crate::transport::{HttpTransport, RpcTransport};
use crate::types::{
    CreatedInvoice, DecodedInvoice, Funds, InvoiceAmount, InvoiceRecord, InvoiceRequest,
    NodeInfo, PayRequest, PaymentRecord, PaymentResult, RawCreatedInvoice, RawDecodedInvoice,
    RawFunds, RawInfo, RawInvoiceList, RawPayResult, RawPaymentList, DEFAULT_PAY_LABEL,
    INVOICE_EXPIRY_SECONDS, LABEL_PREFIX,
};

#[derive(Debug, Serialize)]
struct PayParams<'a> {
    bolt11: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    msatoshi: Option<u64>,
    label: &'a str,
}

#[derive(Debug, Serialize)]
struct InvoiceParams<'a> {
    msatoshi: InvoiceAmount,
    label: &'a str,
    description: &'a str,
    expiry: u64,
}

/// Backend driver speaking the spark RPC dialect.
pub struct SparkDriver<T: RpcTransport = HttpTransport, C: EventConnector = SseConnector> {
    transport: T,
    subscriber: EventSubscriber<C>,
}

impl SparkDriver {
    /// Create a driver using HTTP for calls and SSE for events.
    pub fn new(config: DriverConfig) -> Result<Self, DriverError> {
        let transport = HttpTransport::new(&config)?;
        let connector = SseConnector::new(config.credential.clone())?;
        let subscriber = EventSubscriber::new(connector, config.reconnect, config.confirm_window);

        info!("Created spark driver for {}", config.credential.base_url());
        Ok(Self::with_parts(transport, subscriber))
    }

    /// Create a driver from environment variables.
    pub fn from_env() -> Result<Self, DriverError> {
        Self::new(DriverConfig::from_env()?)
    }
}

impl<T: RpcTransport, C: EventConnector> SparkDriver<T, C> {
    /// Assemble a driver from an arbitrary transport and event connector.
    pub fn with_parts(transport: T, subscriber: EventSubscriber<C>) -> Self {
        Self {
            transport,
            subscriber,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn subscriber(&self) -> &EventSubscriber<C> {
        &self.subscriber
    }

    async fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R, DriverError> {
        let value = self.transport.call(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| DriverError::UnexpectedResponse(format!("{}: {}", method, e)))
    }
}

/// Generate a fresh invoice label.
pub fn generate_label() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}{}", LABEL_PREFIX, &id[..12])
}

/// Reject amount combinations the backend would mishandle.
///
/// Runs before any request is made.
pub fn check_pay_amount(bolt11: &str, msatoshi: Option<u64>) -> Result<Option<u64>, DriverError> {
    let encoded = bolt11::amount_msat(bolt11)?;
    match (encoded, msatoshi) {
        (Some(fixed), Some(requested)) => Err(DriverError::InvalidAmount(format!(
            "invoice already encodes {} msat, refusing explicit amount of {} msat",
            fixed, requested
        ))),
        (None, None) => Err(DriverError::InvalidAmount(
            "invoice has no amount and none was given".to_string(),
        )),
        (_, requested) => Ok(requested),
    }
}

#[async_trait]
impl<T: RpcTransport, C: EventConnector> LightningDriver for SparkDriver<T, C> {
    fn kind(&self) -> &str {
        DRIVER_KIND
    }

    async fn get_info(&self) -> Result<NodeInfo, DriverError> {
        let raw: RawInfo = self.call("getinfo", json!([])).await?;
        Ok(raw.into())
    }

    async fn list_funds(&self) -> Result<Funds, DriverError> {
        let raw: RawFunds = self.call("listfunds", json!([])).await?;
        Ok(raw.into())
    }

    async fn list_invoices(&self) -> Result<Vec<InvoiceRecord>, DriverError> {
        let raw: RawInvoiceList = self.call("listinvoices", json!([])).await?;
        Ok(raw.invoices)
    }

    async fn list_payments(&self) -> Result<Vec<PaymentRecord>, DriverError> {
        let raw: RawPaymentList = self.call("listpayments", json!([])).await?;
        Ok(raw.payments)
    }

    async fn pay(&self, request: PayRequest) -> Result<PaymentResult, DriverError> {
        let bolt11 = bolt11::strip_scheme(&request.bolt11);
        // zero means "not given"
        let msatoshi = check_pay_amount(bolt11, request.msatoshi.filter(|m| *m > 0))?;
        let label = request.description.as_deref().unwrap_or(DEFAULT_PAY_LABEL);

        info!("Paying invoice (explicit amount: {:?})", msatoshi);
        let params = serde_json::to_value(PayParams {
            bolt11,
            msatoshi,
            label,
        })?;

        let raw: RawPayResult = self.call("pay", params).await?;
        let result = PaymentResult::from(raw);
        debug!(
            "Payment complete: {} msat sent, {} msat fees",
            result.msatoshi_paid, result.msatoshi_fees
        );
        Ok(result)
    }

    async fn decode(&self, bolt11: &str) -> Result<DecodedInvoice, DriverError> {
        let bolt11 = bolt11::strip_scheme(bolt11);
        if bolt11.is_empty() {
            return Err(DriverError::InvalidInvoice("empty invoice".to_string()));
        }

        let raw: RawDecodedInvoice = self.call("decodepay", json!([bolt11])).await?;
        Ok(raw.into())
    }

    async fn make_invoice(&self, request: InvoiceRequest) -> Result<CreatedInvoice, DriverError> {
        let label = request.label.clone().unwrap_or_else(generate_label);

        let params = serde_json::to_value(InvoiceParams {
            msatoshi: request.amount,
            label: &label,
            description: &request.description,
            expiry: INVOICE_EXPIRY_SECONDS,
        })?;

        let raw: RawCreatedInvoice = self.call("invoice", params).await?;
        info!("Created invoice {}", label);

        Ok(CreatedInvoice {
            bolt11: raw.bolt11,
            description: request.description,
            msatoshi: request.amount.msat(),
            hash: raw.payment_hash,
            label,
            expires_at: raw.expires_at,
        })
    }

    async fn subscribe_events(
        &self,
        on_event: EventCallback,
    ) -> Result<SubscriptionHandle, DriverError> {
        self.subscriber.subscribe(on_event).await
    }
}
