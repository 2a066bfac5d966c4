//! Page-side relay for the WebLN wallet bridge.
//!
//! The relay sits next to a page but outside its trust boundary. It listens
//! on the shared window channel for marked requests, attaches the origin it
//! derives from its own page and forwards them to the controller. In the
//! other direction it serves controller commands: origin lookups, invoice
//! pastes and cache invalidation.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use webln_core::{ControllerLink, TabId};
//! use webln_relay::{PageSurface, Relay, RelayConfig};
//!
//! # async fn example<P: PageSurface>(
//! #     page: P,
//! #     controller: Arc<dyn ControllerLink>,
//! # ) {
//! let (window, _) = tokio::sync::broadcast::channel(64);
//! let relay = Relay::new(TabId(1), page, controller, window, RelayConfig::from_env());
//!
//! // Answer requests for as long as the page lives
//! relay.run().await;
//! # }
//! ```

mod cache;
mod page;
mod relay;

pub use cache::BlockedCache;
pub use page::{
    lightning_link, type_text, DomNode, InputElement, KeyEvent, KeyEventKind, PageSurface,
    LIGHTNING_SCHEME, RIGHT_BUTTON,
};
pub use relay::{ClickOutcome, Relay, RelayConfig, DEFAULT_BLOCKED_TTL};
