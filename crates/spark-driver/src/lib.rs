//! Driver for a lightningd spark wallet backend.
//!
//! This crate turns the bridge's abstract wallet operations into signed HTTP
//! calls against a spark server. It supports:
//!
//! - Node info, balances and history (`getinfo`, `listfunds`, ...)
//! - Paying, decoding and creating invoices
//! - Payment notifications via Server-Sent Events, with confirmation and
//!   automatic resubscription
//!
//! The credential pair never leaves the driver. Every request carries an
//! HMAC-derived access key instead.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use spark_driver::{LightningDriver, SparkDriver, InvoiceRequest};
//!
//! # async fn example() -> Result<(), spark_driver::DriverError> {
//! let driver = SparkDriver::from_env()?;
//!
//! let info = driver.get_info().await?;
//! println!("Connected to {} ({})", info.alias, info.id);
//!
//! let invoice = driver
//!     .make_invoice(InvoiceRequest::new(100_000, "coffee"))
//!     .await?;
//! println!("Pay me: {}", invoice.bolt11);
//!
//! let _subscription = driver
//!     .subscribe_events(Arc::new(|event| println!("{:?}", event)))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod bolt11;
pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod sse;
pub mod transport;
pub mod types;

pub use client::{check_pay_amount, generate_label, SparkDriver};
pub use config::{BackendCredential, DriverConfig, CLIENT_ID, DRIVER_KIND};
pub use driver::{EventCallback, LightningDriver};
pub use error::DriverError;
pub use sse::{
    EventConnector, EventStream, EventSubscriber, ReconnectConfig, SseConnector, StreamEvent,
    SubscriptionHandle, SubscriptionStatus,
};
pub use transport::{HttpTransport, RpcTransport};
pub use types::*;

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
