//! Command line host for the WebLN wallet bridge.
//!
//! Wires the pieces together outside a browser: a controller over the spark
//! driver, and pages made of a provider and a relay sharing a window
//! channel.

mod config;
mod error;
mod page;
mod prompt;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;
use webln_controller::Controller;
use webln_core::TabId;
use webln_provider::WeblnProvider;
use webln_relay::{PageSurface, Relay, RelayConfig};

pub use config::{build_controller, driver_from_env, BridgeConfig};
pub use error::BridgeError;
pub use page::{HeadlessPage, TextField};
pub use prompt::{describe, parse_answer, TerminalPrompt};

/// Window messages buffered per page.
pub const WINDOW_CAPACITY: usize = 64;

/// Where page sessions register their tab.
#[async_trait]
trait TabRegistry: Send + Sync {
    async fn unregister(&self, tab: TabId);
}

#[async_trait]
impl<D: spark_driver::LightningDriver + 'static> TabRegistry for Controller<D> {
    async fn unregister(&self, tab: TabId) {
        self.unregister_tab(tab).await;
    }
}

/// A page connected to the controller.
///
/// Closing the session, or dropping it inside a runtime, removes its tab
/// from the controller.
pub struct PageSession<P: PageSurface> {
    pub provider: WeblnProvider,
    pub relay: Relay<P>,
    tab: TabId,
    registry: Arc<dyn TabRegistry>,
    relay_task: JoinHandle<()>,
    closed: bool,
}

impl<P: PageSurface> PageSession<P> {
    /// Open `page` as `tab`: start its relay and register it with the
    /// controller.
    pub async fn open<D>(
        controller: Arc<Controller<D>>,
        tab: TabId,
        page: P,
        config: RelayConfig,
    ) -> Self
    where
        D: spark_driver::LightningDriver + 'static,
    {
        let (window, _) = broadcast::channel::<Value>(WINDOW_CAPACITY);
        let relay = Relay::new(tab, page, controller.clone(), window.clone(), config);
        controller.register_tab(tab, Arc::new(relay.clone())).await;

        let relay_task = relay.spawn();
        Self {
            provider: WeblnProvider::new(window),
            relay,
            tab,
            registry: controller,
            relay_task,
            closed: false,
        }
    }

    pub fn tab(&self) -> TabId {
        self.tab
    }

    /// Stop the relay and unregister the tab.
    pub async fn close(mut self) {
        self.relay_task.abort();
        self.registry.unregister(self.tab).await;
        self.closed = true;
    }
}

impl<P: PageSurface> Drop for PageSession<P> {
    fn drop(&mut self) {
        self.relay_task.abort();
        if self.closed {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let registry = self.registry.clone();
                let tab = self.tab;
                runtime.spawn(async move { registry.unregister(tab).await });
            }
            Err(_) => debug!("No runtime to unregister {}", self.tab),
        }
    }
}
