//! Shared protocol types for the WebLN wallet bridge.
//!
//! Three contexts cooperate without trusting each other: the page-side
//! provider, the relay next to the page, and the privileged controller that
//! holds wallet credentials. This crate defines what they exchange:
//!
//! - [`Origin`] / [`TabId`] - where a request comes from
//! - [`Action`] / [`ActionKind`] - requests as the controller consumes them
//! - [`WindowRequest`] / [`WindowResponse`] - the page-facing wire envelope
//! - [`WeblnError`] - the error taxonomy, and its wire form [`WireError`]
//! - [`BehaviorPlan`] - effects run after an action
//! - [`ControllerLink`] / [`TabLink`] - the relay and controller seams
//!
//! # Example
//!
//! ```rust
//! use webln_core::{CorrelationId, RequestBody, WindowRequest, WindowResponse};
//!
//! let request = WindowRequest::new(CorrelationId::new(), RequestBody::Enable);
//! let message = request.to_value();
//!
//! // The relay only picks up marked requests.
//! let parsed = WindowRequest::parse(&message).unwrap();
//! let response = WindowResponse::ok(parsed.id, serde_json::json!({"enabled": true}));
//! assert!(response.into_result().is_ok());
//! ```
//!
//! # Features
//!
//! - `spark`: conversion from `spark_driver::DriverError` into [`WeblnError`].

mod action;
mod behavior;
mod error;
mod gate;
mod link;
mod origin;
mod wire;

pub use action::{Action, ActionKind, CorrelationId, InvoiceOptions, FALLBACK_INVOICE_AMOUNT};
pub use behavior::{Behavior, BehaviorPlan};
pub use error::{ErrorKind, WeblnError, WireError};
pub use gate::{PromptGate, PromptGuard};
pub use link::{ControllerLink, TabCommand, TabLink, TabReply};
pub use origin::{Origin, TabId};
pub use wire::{RequestBody, WindowRequest, WindowResponse, APPLICATION};

// Re-export async_trait for convenience
pub use async_trait::async_trait;
