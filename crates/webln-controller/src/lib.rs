//! Privileged controller for the WebLN wallet bridge.
//!
//! This crate provides the [`Controller`] which owns the wallet driver and
//! the per-domain authorization state, and decides what every incoming
//! [`Action`](webln_core::Action) does.
//!
//! # Features
//!
//! - Per-domain authorization with pluggable persistence
//! - One user prompt at a time; conflicting prompts fail fast
//! - Validation before any backend call, exactly one call per action
//! - Ordered follow-up behaviors whose failures never change the outcome
//! - Payment-received fan-out from the backend event stream
//!
//! # Architecture
//!
//! ```text
//! Action (from a relay)
//!          ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CONTROLLER                            │
//! │                                                             │
//! │  1. Reject duplicate ids and blocked domains                │
//! │         ↓                                                   │
//! │  2. Prompt the user (enable, pay, invoice)                  │
//! │         ↓                                                   │
//! │  3. Re-check authorization                                  │
//! │         ↓                                                   │
//! │  4. Executor: validate → one driver call → behaviors        │
//! └─────────────────────────────────────────────────────────────┘
//!          ↓
//! Result or error, same correlation id
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use spark_driver::SparkDriver;
//! use webln_controller::{ApproveAll, AuthorizationStore, Controller, LoggingBehaviors};
//! use webln_core::{Action, ActionKind, CorrelationId, Origin};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let driver = Arc::new(SparkDriver::from_env()?);
//!     let controller = Controller::new(
//!         AuthorizationStore::in_memory(),
//!         Arc::new(ApproveAll),
//!         Arc::new(LoggingBehaviors),
//!     )
//!     .with_driver(driver);
//!
//!     let action = Action::new(CorrelationId::new(), Origin::new("shop.example", "Shop"), ActionKind::Info);
//!     let info = controller.handle(action).await?;
//!     println!("{}", info);
//!     Ok(())
//! }
//! ```

mod authorization;
mod controller;
mod error;
mod executor;
mod surfaces;

pub use authorization::{
    normalize_domain, AuthorizationEntry, AuthorizationStorage, AuthorizationStore, DomainRecord,
    JsonFileStorage, MemoryStorage, Scope,
};
pub use controller::{ActionState, Controller, COMPLETED_ID_CAPACITY, NOT_CONFIGURED_MESSAGE};
pub use error::StoreError;
pub use executor::{ActionExecutor, ExecutionContext, Operation};
pub use surfaces::{
    format_msat, ApproveAll, BehaviorSurface, ContextMenuHint, ContextMenuSurface, DenyAll,
    LoggingBehaviors, LoggingContextMenu, NoOpBehaviors, Notification, PromptDecision, PromptKind,
    PromptRequest, PromptSurface,
};
