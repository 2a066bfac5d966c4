//! Page-facing WebLN provider.
//!
//! The provider is what a web page sees: `enable`, `get_info`,
//! `send_payment`, `make_invoice` and the unsupported signing calls. It holds
//! no credentials and makes no decisions. Requests go out on the shared
//! window channel and come back through the relay.
//!
//! # Example
//!
//! ```no_run
//! use webln_provider::WeblnProvider;
//!
//! # async fn example(window: tokio::sync::broadcast::Sender<serde_json::Value>)
//! # -> Result<(), webln_core::WeblnError> {
//! let webln = WeblnProvider::new(window);
//!
//! webln.enable().await?;
//! let invoice = webln.make_invoice(2100u64).await?;
//! println!("Pay me: {}", invoice.payment_request);
//! # Ok(())
//! # }
//! ```

mod pending;
mod provider;
mod responses;

pub use pending::{PendingRequests, Ticket};
pub use provider::WeblnProvider;
pub use responses::{GetInfoResponse, RequestInvoiceResponse, SendPaymentResponse};
