//! The privileged controller.
//!
//! Every action walks the same states:
//!
//! ```text
//! Received ──► AwaitingPrompt ──► Dispatched ──► Resolved
//!     │              │                 │
//!     └──────────────┴─────────────────┴───────► Failed
//! ```
//!
//! `Info` skips the prompt, and `Enable` on an authorized domain resolves
//! straight from `Received`. Results are never retried here.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use spark_driver::{EventCallback, LightningDriver, SubscriptionHandle, WalletEvent};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};
use webln_core::{
    Action, ActionKind, BehaviorPlan, ControllerLink, CorrelationId, InvoiceOptions, Origin,
    PromptGate, TabCommand, TabId, TabLink, TabReply, WeblnError,
};

use crate::authorization::{AuthorizationEntry, AuthorizationStore, DomainRecord, Scope};
use crate::executor::{ActionExecutor, ExecutionContext, Operation};
use crate::surfaces::{
    BehaviorSurface, ContextMenuHint, ContextMenuSurface, LoggingContextMenu, Notification,
    PromptDecision, PromptKind, PromptRequest, PromptSurface,
};

/// Completed ids remembered for duplicate detection.
pub const COMPLETED_ID_CAPACITY: usize = 1024;

/// Reported when no backend credentials are configured.
pub const NOT_CONFIGURED_MESSAGE: &str = "Lightning RPC params are not set.";

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Where an action is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionState {
    Received,
    AwaitingPrompt,
    Dispatched,
    Resolved,
    Failed,
}

impl ActionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Failed)
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::AwaitingPrompt => "awaiting_prompt",
            Self::Dispatched => "dispatched",
            Self::Resolved => "resolved",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Default)]
struct TrackerState {
    live: HashMap<CorrelationId, ActionState>,
    finished: HashMap<CorrelationId, ActionState>,
    order: VecDeque<CorrelationId>,
}

/// Lifecycle bookkeeping for every action the controller has seen.
#[derive(Default)]
struct ActionTracker {
    state: Mutex<TrackerState>,
}

impl ActionTracker {
    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin(&self, id: &CorrelationId) -> Result<(), WeblnError> {
        let mut state = self.lock();
        if state.live.contains_key(id) || state.finished.contains_key(id) {
            return Err(WeblnError::Validation(format!(
                "duplicate correlation id {}",
                id
            )));
        }
        state.live.insert(id.clone(), ActionState::Received);
        debug!("Action {}: {}", id, ActionState::Received);
        Ok(())
    }

    fn advance(&self, id: &CorrelationId, next: ActionState) {
        let mut state = self.lock();
        if let Some(current) = state.live.get_mut(id) {
            debug!("Action {}: {} -> {}", id, current, next);
            *current = next;
        }
    }

    fn finish(&self, id: &CorrelationId, outcome: ActionState) {
        let mut state = self.lock();
        let previous = state.live.remove(id);
        debug!("Action {}: {:?} -> {}", id, previous, outcome);

        state.finished.insert(id.clone(), outcome);
        state.order.push_back(id.clone());
        while state.order.len() > COMPLETED_ID_CAPACITY {
            if let Some(oldest) = state.order.pop_front() {
                state.finished.remove(&oldest);
            }
        }
    }

    fn get(&self, id: &CorrelationId) -> Option<ActionState> {
        let state = self.lock();
        state
            .live
            .get(id)
            .or_else(|| state.finished.get(id))
            .copied()
    }

    fn in_flight(&self) -> HashSet<CorrelationId> {
        self.lock().live.keys().cloned().collect()
    }
}

/// Holds credentials (through the driver) and authorization state, and
/// decides what every action does.
pub struct Controller<D: LightningDriver> {
    store: AuthorizationStore,
    executor: Option<ActionExecutor<D>>,
    prompt: Arc<dyn PromptSurface>,
    behaviors: Arc<dyn BehaviorSurface>,
    context_menu: Arc<dyn ContextMenuSurface>,
    gate: PromptGate,
    tracker: ActionTracker,
    tabs: RwLock<HashMap<TabId, Arc<dyn TabLink>>>,
    events: broadcast::Sender<WalletEvent>,
}

impl<D: LightningDriver + 'static> Controller<D> {
    /// Create a controller without a backend. Wallet actions fail with
    /// [`WeblnError::NotConfigured`] until a driver is attached.
    pub fn new(
        store: AuthorizationStore,
        prompt: Arc<dyn PromptSurface>,
        behaviors: Arc<dyn BehaviorSurface>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            executor: None,
            prompt,
            behaviors,
            context_menu: Arc::new(LoggingContextMenu),
            gate: PromptGate::new(),
            tracker: ActionTracker::default(),
            tabs: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Attach the active backend driver.
    pub fn with_driver(mut self, driver: Arc<D>) -> Self {
        self.executor = Some(ActionExecutor::new(driver, self.behaviors.clone()));
        self
    }

    pub fn with_context_menu(mut self, context_menu: Arc<dyn ContextMenuSurface>) -> Self {
        self.context_menu = context_menu;
        self
    }

    pub fn store(&self) -> &AuthorizationStore {
        &self.store
    }

    pub fn is_configured(&self) -> bool {
        self.executor.is_some()
    }

    fn executor(&self) -> Result<&ActionExecutor<D>, WeblnError> {
        self.executor
            .as_ref()
            .ok_or_else(|| WeblnError::NotConfigured(NOT_CONFIGURED_MESSAGE.to_string()))
    }

    /// Lifecycle state of a live or recently finished action.
    pub fn action_state(&self, id: &CorrelationId) -> Option<ActionState> {
        self.tracker.get(id)
    }

    /// Ids of actions that have not finished yet.
    pub fn in_flight(&self) -> HashSet<CorrelationId> {
        self.tracker.in_flight()
    }

    /// Process one action to completion.
    pub async fn handle(&self, action: Action) -> Result<Value, WeblnError> {
        let id = action.id.clone();
        self.tracker.begin(&id)?;
        info!(
            "Action {} ({}) from {}",
            id,
            action.kind.name(),
            action.origin
        );

        let result = self.process(&action).await;
        match &result {
            Ok(_) => self.tracker.finish(&id, ActionState::Resolved),
            Err(e) => {
                warn!("Action {} failed: {}", id, e);
                self.tracker.finish(&id, ActionState::Failed);
            }
        }
        result
    }

    async fn process(&self, action: &Action) -> Result<Value, WeblnError> {
        let domain = action.domain();
        let before = self.store.status(domain).await?;
        if before.as_ref().map_or(false, DomainRecord::is_blocked) {
            return Err(WeblnError::denied(format!("{} is blocked", domain)));
        }
        if let (Some(record), Some(scope)) = (before.as_ref(), Scope::required_by(&action.kind)) {
            if record.is_allowed() && !record.allows(scope) {
                return Err(WeblnError::denied(format!(
                    "{} is not authorized for {:?}",
                    domain, scope
                )));
            }
        }

        match &action.kind {
            ActionKind::Enable => {
                if before.as_ref().map_or(false, DomainRecord::is_allowed) {
                    debug!("{} already authorized", domain);
                    return Ok(enabled());
                }
                match self.ask(action, PromptKind::Enable).await? {
                    PromptDecision::Approve { .. } => {
                        self.store.grant(domain, Scope::all()).await?;
                        self.invalidate_tabs().await;
                        Ok(enabled())
                    }
                    PromptDecision::Deny { remember } => self.deny(domain, remember).await,
                }
            }
            ActionKind::Info => {
                let executor = self.executor()?;
                self.tracker.advance(&action.id, ActionState::Dispatched);
                executor
                    .execute(&self.context_for(action).await, Operation::Info, &BehaviorPlan::none())
                    .await
            }
            ActionKind::Pay { invoice } => {
                let executor = self.executor()?;
                let decoded = match executor.driver().decode(invoice).await {
                    Ok(decoded) => Some(decoded),
                    Err(e) => {
                        warn!("Could not decode invoice for prompt: {}", e);
                        None
                    }
                };
                let fallback_description = decoded.as_ref().and_then(|d| d.description.clone());

                let kind = PromptKind::Pay {
                    invoice: invoice.clone(),
                    decoded,
                };
                let (amount, description) = match self.ask(action, kind).await? {
                    PromptDecision::Approve {
                        amount,
                        description,
                    } => (amount.filter(|a| *a > 0), description),
                    PromptDecision::Deny { remember } => return self.deny(domain, remember).await,
                };
                self.ensure_still_allowed(domain, before.as_ref()).await?;

                let amount_msat = amount
                    .map(|sat| {
                        sat.checked_mul(1000).ok_or_else(|| {
                            WeblnError::InvalidAmount(format!("{} sat is out of range", sat))
                        })
                    })
                    .transpose()?;
                let operation = Operation::Pay {
                    invoice: invoice.clone(),
                    amount_msat,
                    description: description.or(fallback_description),
                };
                self.dispatch(action, operation).await
            }
            ActionKind::Invoice(options) => {
                self.executor()?;
                let proposed_memo = options
                    .default_memo
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| action.origin.domain.clone());
                let kind = PromptKind::Invoice {
                    options: options.clone(),
                    proposed_amount: options.proposed_amount(),
                    proposed_memo: proposed_memo.clone(),
                };
                let (amount, description) = match self.ask(action, kind).await? {
                    PromptDecision::Approve {
                        amount,
                        description,
                    } => (
                        invoice_amount(options, amount),
                        description
                            .map(|d| d.trim().to_string())
                            .filter(|d| !d.is_empty())
                            .unwrap_or(proposed_memo),
                    ),
                    PromptDecision::Deny { remember } => return self.deny(domain, remember).await,
                };
                self.ensure_still_allowed(domain, before.as_ref()).await?;

                let operation = Operation::MakeInvoice {
                    amount,
                    description,
                    minimum: options.minimum_amount,
                    maximum: options.maximum_amount,
                };
                self.dispatch(action, operation).await
            }
        }
    }

    async fn ask(&self, action: &Action, kind: PromptKind) -> Result<PromptDecision, WeblnError> {
        let _guard = self.gate.try_acquire()?;
        self.tracker.advance(&action.id, ActionState::AwaitingPrompt);

        let request = PromptRequest {
            id: action.id.clone(),
            origin: action.origin.clone(),
            tab: action.tab,
            kind,
        };
        let decision = self.prompt.prompt(request).await?;
        debug!("Prompt {} answered: {:?}", action.id, decision);
        Ok(decision)
    }

    async fn deny(&self, domain: &str, remember: bool) -> Result<Value, WeblnError> {
        if remember {
            self.store.block(domain).await?;
            self.invalidate_tabs().await;
        }
        Err(WeblnError::denied("user denied the request"))
    }

    /// Fail if the domain was blocked, or lost its authorization, while the
    /// prompt was open.
    async fn ensure_still_allowed(
        &self,
        domain: &str,
        before: Option<&DomainRecord>,
    ) -> Result<(), WeblnError> {
        let now = self.store.status(domain).await?;
        let blocked = now.as_ref().map_or(false, DomainRecord::is_blocked);
        let revoked = before.map_or(false, DomainRecord::is_allowed)
            && !now.as_ref().map_or(false, DomainRecord::is_allowed);
        if blocked || revoked {
            return Err(WeblnError::denied(format!(
                "authorization for {} was revoked",
                domain
            )));
        }
        Ok(())
    }

    async fn dispatch(&self, action: &Action, operation: Operation) -> Result<Value, WeblnError> {
        let executor = self.executor()?;
        self.tracker.advance(&action.id, ActionState::Dispatched);
        let plan = BehaviorPlan::for_kind(&action.kind);
        executor
            .execute(&self.context_for(action).await, operation, &plan)
            .await
    }

    async fn context_for(&self, action: &Action) -> ExecutionContext {
        let tab_link = match action.tab {
            Some(tab) => self.tabs.read().await.get(&tab).cloned(),
            None => None,
        };
        ExecutionContext {
            action: Some(action.id.clone()),
            tab: action.tab,
            element_id: action.element_id.clone(),
            tab_link,
        }
    }

    /// Run a wallet operation for the wallet UI itself. No authorization,
    /// no prompt, no behaviors.
    pub async fn rpc(&self, operation: Operation) -> Result<Value, WeblnError> {
        self.executor()?
            .execute(
                &ExecutionContext::privileged(),
                operation,
                &BehaviorPlan::none(),
            )
            .await
    }

    pub async fn grant(&self, domain: &str) -> Result<AuthorizationEntry, WeblnError> {
        let entry = self.store.grant(domain, Scope::all()).await?;
        self.invalidate_tabs().await;
        Ok(entry)
    }

    /// Forget a domain. Prompts already open for it fail once answered.
    pub async fn revoke(&self, domain: &str) -> Result<bool, WeblnError> {
        let existed = self.store.revoke(domain).await?;
        self.invalidate_tabs().await;
        Ok(existed)
    }

    pub async fn block(&self, domain: &str) -> Result<(), WeblnError> {
        self.store.block(domain).await?;
        self.invalidate_tabs().await;
        Ok(())
    }

    pub async fn authorized_domains(&self) -> Result<Vec<(String, AuthorizationEntry)>, WeblnError> {
        Ok(self.store.authorized_domains().await?)
    }

    /// Blocked status as reported to pages.
    pub async fn blocked(&self, domain: &str) -> Result<bool, WeblnError> {
        self.executor()?;
        Ok(self.store.is_blocked(domain).await?)
    }

    pub async fn register_tab(&self, tab: TabId, link: Arc<dyn TabLink>) {
        self.tabs.write().await.insert(tab, link);
        debug!("Registered {}", tab);
    }

    pub async fn unregister_tab(&self, tab: TabId) {
        self.tabs.write().await.remove(&tab);
        debug!("Unregistered {}", tab);
    }

    async fn tab(&self, tab: TabId) -> Result<Arc<dyn TabLink>, WeblnError> {
        self.tabs
            .read()
            .await
            .get(&tab)
            .cloned()
            .ok_or_else(|| WeblnError::Transport(format!("{} is not registered", tab)))
    }

    /// Ask a tab's relay for its page origin.
    pub async fn tab_origin(&self, tab: TabId) -> Result<Origin, WeblnError> {
        match self.tab(tab).await?.command(TabCommand::GetOrigin).await? {
            TabReply::Origin(origin) => Ok(origin),
            other => Err(WeblnError::Transport(format!(
                "unexpected reply from {}: {:?}",
                tab, other
            ))),
        }
    }

    async fn invalidate_tabs(&self) {
        let tabs: Vec<(TabId, Arc<dyn TabLink>)> = self
            .tabs
            .read()
            .await
            .iter()
            .map(|(id, link)| (*id, link.clone()))
            .collect();
        for (id, link) in tabs {
            if let Err(e) = link.command(TabCommand::InvalidateBlocked).await {
                warn!("Failed to invalidate cache of {}: {}", id, e);
            }
        }
    }

    /// Update the context menu for right-clicked text.
    pub async fn update_context_menu(&self, tab: Option<TabId>, text: &str) -> ContextMenuHint {
        let hint = ContextMenuHint::classify(text);
        self.context_menu.update(tab, hint.clone()).await;
        hint
    }

    /// "Pay invoice" context menu entry.
    pub async fn context_menu_pay(&self, tab: TabId, invoice: &str) -> Result<Value, WeblnError> {
        let origin = self.tab_origin(tab).await?;
        let action = Action::new(
            CorrelationId::new(),
            origin,
            ActionKind::Pay {
                invoice: invoice.to_string(),
            },
        )
        .in_tab(tab);
        self.handle(action).await
    }

    /// "Generate invoice" context menu entry. The invoice is pasted into
    /// `element_id` once created.
    pub async fn context_menu_invoice(
        &self,
        tab: TabId,
        amount: u64,
        element_id: Option<String>,
    ) -> Result<Value, WeblnError> {
        let origin = self.tab_origin(tab).await?;
        let mut action = Action::new(
            CorrelationId::new(),
            origin,
            ActionKind::Invoice(InvoiceOptions::fixed(amount)),
        )
        .in_tab(tab);
        action.element_id = element_id;
        self.handle(action).await
    }

    /// Receiver for payments received by the wallet.
    pub fn payment_events(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }

    /// Start the backend event subscription. Every received payment is
    /// broadcast and announced with a notification.
    pub async fn watch_payments(&self) -> Result<SubscriptionHandle, WeblnError> {
        let executor = self.executor()?;
        let events = self.events.clone();
        let behaviors = self.behaviors.clone();

        let callback: EventCallback = Arc::new(move |event: WalletEvent| {
            info!("Payment received: {}", event.hash());
            let notification = Notification::payment_received(&event);
            let _ = events.send(event);

            let behaviors = behaviors.clone();
            tokio::spawn(async move {
                if let Err(e) = behaviors.notify(notification).await {
                    warn!("Failed to notify payment: {}", e);
                }
            });
        });

        Ok(executor.driver().subscribe_events(callback).await?)
    }
}

fn enabled() -> Value {
    json!({ "enabled": true })
}

/// Fixed amounts win; otherwise the user's pick, else the proposal.
fn invoice_amount(options: &InvoiceOptions, chosen: Option<u64>) -> u64 {
    options
        .amount
        .or(chosen.filter(|a| *a > 0))
        .unwrap_or_else(|| options.proposed_amount())
}

#[async_trait]
impl<D: LightningDriver + 'static> ControllerLink for Controller<D> {
    async fn submit(&self, action: Action) -> Result<Value, WeblnError> {
        self.handle(action).await
    }

    async fn is_blocked(&self, domain: &str) -> Result<bool, WeblnError> {
        self.blocked(domain).await
    }

    async fn context_menu_hint(&self, tab: Option<TabId>, text: String) {
        self.update_context_menu(tab, &text).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_rejects_duplicates() {
        let tracker = ActionTracker::default();
        let id = CorrelationId::from("a");

        tracker.begin(&id).unwrap();
        assert!(matches!(tracker.begin(&id), Err(WeblnError::Validation(_))));

        tracker.advance(&id, ActionState::Dispatched);
        assert_eq!(tracker.get(&id), Some(ActionState::Dispatched));

        tracker.finish(&id, ActionState::Resolved);
        assert_eq!(tracker.get(&id), Some(ActionState::Resolved));
        assert!(tracker.in_flight().is_empty());
        assert!(tracker.begin(&id).is_err());
    }

    #[test]
    fn test_tracker_forgets_oldest() {
        let tracker = ActionTracker::default();
        for i in 0..=COMPLETED_ID_CAPACITY {
            let id = CorrelationId::from(i.to_string());
            tracker.begin(&id).unwrap();
            tracker.finish(&id, ActionState::Failed);
        }
        assert_eq!(tracker.get(&CorrelationId::from("0")), None);
        assert_eq!(
            tracker.get(&CorrelationId::from("1")),
            Some(ActionState::Failed)
        );
    }

    #[test]
    fn test_invoice_amount() {
        let fixed = InvoiceOptions::fixed(500);
        assert_eq!(invoice_amount(&fixed, Some(10)), 500);

        let open = InvoiceOptions {
            default_amount: Some(42),
            ..Default::default()
        };
        assert_eq!(invoice_amount(&open, Some(10)), 10);
        assert_eq!(invoice_amount(&open, Some(0)), 42);
        assert_eq!(invoice_amount(&open, None), 42);
    }

    #[test]
    fn test_terminal_states() {
        assert!(ActionState::Resolved.is_terminal());
        assert!(ActionState::Failed.is_terminal());
        assert!(!ActionState::AwaitingPrompt.is_terminal());
        assert_eq!(ActionState::AwaitingPrompt.to_string(), "awaiting_prompt");
    }
}
