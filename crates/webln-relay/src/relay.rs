//! Forwards page requests to the controller and answers on the window.

use std::collections::HashSet;
use std::env;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webln_core::{
    Action, ActionKind, ControllerLink, CorrelationId, Origin, RequestBody, TabCommand, TabId,
    TabLink, TabReply, WeblnError, WindowRequest, WindowResponse,
};

use crate::cache::BlockedCache;
use crate::page::{lightning_link, type_text, DomNode, PageSurface, RIGHT_BUTTON};

/// Default lifetime of a cached blocked status.
pub const DEFAULT_BLOCKED_TTL: Duration = Duration::from_secs(30);

/// Configuration for a relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// How long a `getBlocked` answer is reused.
    pub blocked_ttl: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            blocked_ttl: DEFAULT_BLOCKED_TTL,
        }
    }
}

impl RelayConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `RELAY_BLOCKED_TTL_SECS` - Blocked status cache lifetime (default: 30)
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = env::var("RELAY_BLOCKED_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.blocked_ttl = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_blocked_ttl(mut self, ttl: Duration) -> Self {
        self.blocked_ttl = ttl;
        self
    }
}

/// What happened to a click.
#[derive(Debug)]
pub enum ClickOutcome {
    /// A payment link was clicked. The default navigation must be suppressed;
    /// the handle resolves with the controller's answer.
    Intercepted(JoinHandle<Result<Value, WeblnError>>),
    Ignored,
}

impl ClickOutcome {
    pub fn prevents_default(&self) -> bool {
        matches!(self, Self::Intercepted(_))
    }
}

struct Inner<P> {
    tab: TabId,
    page: P,
    controller: Arc<dyn ControllerLink>,
    window: broadcast::Sender<Value>,
    blocked: BlockedCache,
    /// Request ids with an answer still outstanding.
    answering: Mutex<HashSet<CorrelationId>>,
}

impl<P> Inner<P> {
    fn answering(&self) -> std::sync::MutexGuard<'_, HashSet<CorrelationId>> {
        self.answering.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The relay for one page.
///
/// Holds no authorization logic: it derives the origin from its own page,
/// forwards typed actions and posts exactly one response per request id.
pub struct Relay<P: PageSurface> {
    inner: Arc<Inner<P>>,
}

impl<P: PageSurface> Clone for Relay<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: PageSurface> Relay<P> {
    pub fn new(
        tab: TabId,
        page: P,
        controller: Arc<dyn ControllerLink>,
        window: broadcast::Sender<Value>,
        config: RelayConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                tab,
                page,
                controller,
                window,
                blocked: BlockedCache::new(config.blocked_ttl),
                answering: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn tab(&self) -> TabId {
        self.inner.tab
    }

    pub fn page(&self) -> &P {
        &self.inner.page
    }

    /// Origin of the page, derived locally.
    pub fn origin(&self) -> Origin {
        self.inner.page.origin()
    }

    /// Serve window requests for as long as the page lives.
    pub async fn run(&self) {
        self.run_with_shutdown(std::future::pending()).await
    }

    /// Serve window requests until `shutdown` completes.
    pub async fn run_with_shutdown<S>(&self, shutdown: S)
    where
        S: Future<Output = ()> + Send,
    {
        let window = self.inner.window.subscribe();
        self.serve(window, shutdown).await
    }

    /// Start serving on a background task. The window subscription exists
    /// before this returns, so no request posted afterwards is missed.
    pub fn spawn(&self) -> JoinHandle<()> {
        let window = self.inner.window.subscribe();
        let relay = self.clone();
        tokio::spawn(async move { relay.serve(window, std::future::pending()).await })
    }

    // The relay holds a window sender itself, so the channel never closes
    // underneath it.
    async fn serve<S>(&self, mut window: broadcast::Receiver<Value>, shutdown: S)
    where
        S: Future<Output = ()> + Send,
    {
        info!("Relay for {} listening", self.inner.tab);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!("Relay for {} stopped", self.inner.tab);
                    return;
                }

                message = window.recv() => match message {
                    Ok(message) => {
                        self.on_window_message(&message);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Relay for {} skipped {} window messages", self.inner.tab, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        }
    }

    /// Pick up one window message. Requests are answered on a task of their
    /// own; everything else is ignored, as is a repeat of an id whose answer
    /// is still outstanding.
    pub fn on_window_message(&self, message: &Value) -> Option<JoinHandle<()>> {
        let request = WindowRequest::parse(message)?;
        if !self.inner.answering().insert(request.id.clone()) {
            debug!("Request {} is already being answered, dropping repeat", request.id);
            return None;
        }
        let relay = self.clone();
        Some(tokio::spawn(async move { relay.answer(request).await }))
    }

    async fn answer(&self, request: WindowRequest) {
        let id = request.id.clone();
        debug!("Request {} ({})", id, request.body.name());

        let result = self.dispatch(request).await;
        if let Err(e) = &result {
            debug!("Request {} failed: {}", id, e);
        }

        let response = WindowResponse::from_result(id, result);
        if self.inner.window.send(response.to_value()).is_err() {
            warn!("Nobody is listening for response {}", response.id);
        }
        self.inner.answering().remove(&response.id);
    }

    /// Number of requests waiting for their answer.
    pub fn outstanding(&self) -> usize {
        self.inner.answering().len()
    }

    /// Turn a request into its result.
    pub async fn dispatch(&self, request: WindowRequest) -> Result<Value, WeblnError> {
        let kind = match request.body {
            RequestBody::GetBlocked => return self.blocked().await.map(Value::Bool),
            body @ (RequestBody::SignMessage { .. } | RequestBody::VerifyMessage { .. }) => {
                return Err(WeblnError::Unsupported(format!(
                    "{} is not supported",
                    body.name()
                )))
            }
            RequestBody::Enable => ActionKind::Enable,
            RequestBody::GetInfo => ActionKind::Info,
            RequestBody::SendPayment { payment_request } => ActionKind::Pay {
                invoice: payment_request,
            },
            RequestBody::MakeInvoice(options) => ActionKind::Invoice(options),
        };

        let action = Action::new(request.id, self.origin(), kind).in_tab(self.inner.tab);
        self.inner.controller.submit(action).await
    }

    /// Blocked status of this page's domain, cached.
    pub async fn blocked(&self) -> Result<bool, WeblnError> {
        let epoch = match self.inner.blocked.lookup().await {
            Ok(blocked) => return Ok(blocked),
            Err(epoch) => epoch,
        };
        let blocked = self
            .inner
            .controller
            .is_blocked(&self.origin().domain)
            .await?;
        if !self.inner.blocked.set(blocked, epoch).await {
            debug!("Blocked status of {} changed while querying", self.inner.tab);
        }
        Ok(blocked)
    }

    pub async fn invalidate_blocked(&self) {
        debug!("Blocked cache of {} invalidated", self.inner.tab);
        self.inner.blocked.invalidate().await;
    }

    /// Type `text` into the element with `element_id`, or the focused one.
    pub fn paste(&self, element_id: Option<&str>, text: &str) -> Result<(), WeblnError> {
        let page = &self.inner.page;
        let element = match element_id {
            Some(id) => page.element_by_id(id),
            None => page.active_element(),
        }
        .ok_or_else(|| {
            WeblnError::Validation(match element_id {
                Some(id) => format!("no element with id '{}'", id),
                None => "no focused element".to_string(),
            })
        })?;

        type_text(element.as_ref(), text);
        debug!("Pasted {} characters into {:?}", text.len(), element_id);
        Ok(())
    }

    /// Intercept clicks on `lightning:` links and send them to the controller
    /// as payments.
    pub fn handle_click(&self, target: &dyn DomNode) -> ClickOutcome {
        let Some(invoice) = lightning_link(target) else {
            return ClickOutcome::Ignored;
        };

        info!("Intercepted payment link on {}", self.inner.tab);
        let action = Action::new(
            CorrelationId::new(),
            self.origin(),
            ActionKind::Pay { invoice },
        )
        .in_tab(self.inner.tab);
        let controller = self.inner.controller.clone();
        ClickOutcome::Intercepted(tokio::spawn(async move { controller.submit(action).await }))
    }

    /// Report right-clicked text so the context menu can offer pay or
    /// invoice entries.
    pub async fn handle_mouse_down(&self, button: i16, target: Option<&dyn DomNode>) {
        if button != RIGHT_BUTTON {
            return;
        }

        let text = self
            .inner
            .page
            .selection()
            .filter(|s| !s.is_empty())
            .or_else(|| target.and_then(|t| t.inner_text().filter(|s| !s.is_empty())))
            .or_else(|| target.and_then(|t| t.value().filter(|s| !s.is_empty())));

        if let Some(text) = text {
            self.inner
                .controller
                .context_menu_hint(Some(self.inner.tab), text)
                .await;
        }
    }
}

#[async_trait]
impl<P: PageSurface> TabLink for Relay<P> {
    async fn command(&self, command: TabCommand) -> Result<TabReply, WeblnError> {
        match command {
            TabCommand::GetOrigin => Ok(TabReply::Origin(self.origin())),
            TabCommand::Paste { element_id, text } => {
                self.paste(element_id.as_deref(), &text)?;
                Ok(TabReply::Done)
            }
            TabCommand::InvalidateBlocked => {
                self.invalidate_blocked().await;
                Ok(TabReply::Done)
            }
        }
    }
}
