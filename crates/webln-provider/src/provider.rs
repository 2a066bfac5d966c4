//! The provider object pages talk to.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use webln_core::{
    CorrelationId, InvoiceOptions, PromptGate, RequestBody, WeblnError, WindowRequest,
    WindowResponse,
};

use crate::pending::PendingRequests;
use crate::responses::{string_field, GetInfoResponse, RequestInvoiceResponse, SendPaymentResponse};

/// WebLN provider bound to one window channel.
///
/// Every call posts a marked request with a fresh id and waits for the
/// response carrying that id. Prompting calls (`enable`, `send_payment`,
/// `make_invoice`) are admitted one at a time.
pub struct WeblnProvider {
    window: broadcast::Sender<Value>,
    pending: Arc<PendingRequests>,
    gate: PromptGate,
    listener: JoinHandle<()>,
}

impl WeblnProvider {
    /// Attach to `window` and start listening for responses.
    pub fn new(window: broadcast::Sender<Value>) -> Self {
        let pending = Arc::new(PendingRequests::default());
        let mut messages = window.subscribe();
        let listener = {
            let pending = pending.clone();
            tokio::spawn(async move {
                loop {
                    match messages.recv().await {
                        Ok(message) => {
                            if let Some(response) = WindowResponse::parse(&message) {
                                let id = response.id.clone();
                                if !pending.resolve(response) {
                                    debug!("Ignoring response {} for someone else", id);
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Provider skipped {} window messages", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        Self {
            window,
            pending,
            gate: PromptGate::new(),
            listener,
        }
    }

    /// Number of requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Whether a prompting call is in flight.
    pub fn prompt_active(&self) -> bool {
        self.gate.is_active()
    }

    /// Post `body` and wait for its response, without prompt admission or
    /// prior `enable`.
    pub async fn request(&self, body: RequestBody) -> Result<Value, WeblnError> {
        let ticket = self.pending.register(CorrelationId::new());
        debug!("Posting {} as {}", body.name(), ticket.id());

        let message = WindowRequest::new(ticket.id().clone(), body).to_value();
        self.window
            .send(message)
            .map_err(|_| WeblnError::Transport("window channel closed".to_string()))?;

        ticket
            .response()
            .await
            .ok_or_else(|| WeblnError::Transport("provider stopped listening".to_string()))?
            .into_result()
    }

    async fn prompt(&self, body: RequestBody) -> Result<Value, WeblnError> {
        let _guard = self.gate.try_acquire()?;
        self.request(body).await
    }

    /// Ask the wallet to enable this page.
    pub async fn enable(&self) -> Result<(), WeblnError> {
        self.prompt(RequestBody::Enable).await.map(|_| ())
    }

    pub async fn get_info(&self) -> Result<GetInfoResponse, WeblnError> {
        self.enable().await?;
        let info = self.request(RequestBody::GetInfo).await?;
        GetInfoResponse::from_node_info(&info)
    }

    pub async fn send_payment(
        &self,
        payment_request: impl Into<String>,
    ) -> Result<SendPaymentResponse, WeblnError> {
        self.enable().await?;
        let paid = self
            .prompt(RequestBody::SendPayment {
                payment_request: payment_request.into(),
            })
            .await?;
        Ok(SendPaymentResponse {
            preimage: string_field(&paid, "preimage")?,
        })
    }

    /// Request an invoice, from a bare amount in satoshi or full options.
    pub async fn make_invoice(
        &self,
        args: impl Into<InvoiceOptions>,
    ) -> Result<RequestInvoiceResponse, WeblnError> {
        self.enable().await?;
        let created = self.prompt(RequestBody::MakeInvoice(args.into())).await?;
        Ok(RequestInvoiceResponse {
            payment_request: string_field(&created, "bolt11")?,
        })
    }

    pub async fn sign_message(&self, _message: &str) -> Result<Value, WeblnError> {
        Err(WeblnError::Unsupported("can't sign message".to_string()))
    }

    pub async fn verify_message(&self, _signature: &str, _message: &str) -> Result<(), WeblnError> {
        Err(WeblnError::Unsupported("can't verify message".to_string()))
    }

    /// Whether the wallet has blocked this page.
    pub async fn is_blocked(&self) -> Result<bool, WeblnError> {
        let blocked = self.request(RequestBody::GetBlocked).await?;
        blocked
            .as_bool()
            .ok_or_else(|| WeblnError::Transport(format!("unexpected blocked status {}", blocked)))
    }
}

impl Drop for WeblnProvider {
    fn drop(&mut self) {
        self.listener.abort();
    }
}
