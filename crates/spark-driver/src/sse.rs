//! Server-Sent Events subscription for wallet notifications.
//!
//! A new stream is only trusted once it has stayed open for the confirmation
//! window. Until then any error counts as a failed attempt and is retried with
//! capped exponential backoff. The previous stream is torn down only after its
//! replacement is confirmed. Once confirmed, a stream error starts a fresh
//! subscribe cycle in the background instead of surfacing to the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};
use futures::FutureExt;
use reqwest::Client;
use reqwest_eventsource::{Event, RequestBuilderExt};
use tokio::sync::{oneshot, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::BackendCredential;
use crate::driver::EventCallback;
use crate::error::DriverError;
use crate::types::{RawInvoicePaid, WalletEvent, INVOICE_PAID_EVENT};

/// Configuration for automatic reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of retries after the first attempt (None = infinite).
    pub max_retries: Option<u32>,
    /// Initial delay before first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier for each retry.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_retries: Some(10),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Calculate delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }

    /// Check if we should retry after the given number of retries.
    pub fn should_retry(&self, retries: u32) -> bool {
        self.max_retries.map_or(true, |max| retries < max)
    }
}

/// Transport-level event of a server-push connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The server accepted the connection.
    Open,
    /// A named frame.
    Frame { event: String, data: String },
}

/// Stream of transport events; an `Err` ends the connection.
pub type EventStream = BoxStream<'static, Result<StreamEvent, DriverError>>;

/// Opens server-push connections.
pub trait EventConnector: Send + Sync + 'static {
    fn connect(&self) -> Result<EventStream, DriverError>;
}

/// Connector for `<endpoint>/stream?access-key=<key>`.
pub struct SseConnector {
    http: Client,
    credential: BackendCredential,
}

impl SseConnector {
    pub fn new(credential: BackendCredential) -> Result<Self, DriverError> {
        // SSE connections are long-lived and should not timeout
        let http = Client::builder().build().map_err(DriverError::Http)?;
        Ok(Self { http, credential })
    }
}

impl EventConnector for SseConnector {
    fn connect(&self) -> Result<EventStream, DriverError> {
        let url = self.credential.stream_url()?;
        info!("Creating SSE connection to {}/stream", self.credential.base_url());

        let source = self
            .http
            .get(&url)
            .eventsource()
            .map_err(|e| DriverError::Sse(e.to_string()))?;

        Ok(source
            .map(|item| match item {
                Ok(Event::Open) => Ok(StreamEvent::Open),
                Ok(Event::Message(msg)) => Ok(StreamEvent::Frame {
                    event: msg.event,
                    data: msg.data,
                }),
                Err(e) => Err(DriverError::Sse(e.to_string())),
            })
            .boxed())
    }
}

/// Snapshot of the subscription session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionStatus {
    /// A confirmed stream is installed and still running.
    pub connected: bool,
    /// Generation of the installed stream (0 = none yet).
    pub generation: u64,
    pub last_opened_at: Option<DateTime<Utc>>,
    /// Failed attempts since the last confirmed stream.
    pub consecutive_failures: u32,
    pub closed: bool,
}

struct LiveConnection {
    generation: u64,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct SessionState {
    current: Option<LiveConnection>,
    last_opened_at: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    closed: bool,
}

/// Subscription state owned by one subscriber. Never global.
#[derive(Default)]
struct Session {
    state: Mutex<SessionState>,
    next_generation: AtomicU64,
}

impl Session {
    async fn status(&self) -> SubscriptionStatus {
        let state = self.state.lock().await;
        SubscriptionStatus {
            connected: state
                .current
                .as_ref()
                .map_or(false, |c| !c.task.is_finished()),
            generation: state.current.as_ref().map_or(0, |c| c.generation),
            last_opened_at: state.last_opened_at,
            consecutive_failures: state.consecutive_failures,
            closed: state.closed,
        }
    }

    async fn record_failure(&self) {
        self.state.lock().await.consecutive_failures += 1;
    }

    async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }
}

/// Handle to a running subscription.
#[derive(Clone)]
pub struct SubscriptionHandle {
    session: Arc<Session>,
}

impl SubscriptionHandle {
    pub async fn status(&self) -> SubscriptionStatus {
        self.session.status().await
    }

    /// Stop the stream and suppress further reconnects.
    pub async fn close(&self) {
        let current = {
            let mut state = self.session.state.lock().await;
            state.closed = true;
            state.current.take()
        };
        if let Some(connection) = current {
            connection.task.abort();
        }
        info!("Event subscription closed");
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Connecting,
    Open,
    Confirmed,
    Dead,
}

struct ConnectionLink {
    phase: Mutex<Phase>,
    dead: Notify,
}

/// Keeps one live event stream per session.
pub struct EventSubscriber<C: EventConnector> {
    inner: Arc<Inner<C>>,
}

struct Inner<C> {
    connector: C,
    reconnect: ReconnectConfig,
    confirm_window: Duration,
    session: Arc<Session>,
}

impl<C: EventConnector> Clone for EventSubscriber<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: EventConnector> EventSubscriber<C> {
    pub fn new(connector: C, reconnect: ReconnectConfig, confirm_window: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                reconnect,
                confirm_window,
                session: Arc::new(Session::default()),
            }),
        }
    }

    /// Handle for the session, whether or not a stream is live.
    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            session: self.inner.session.clone(),
        }
    }

    pub async fn status(&self) -> SubscriptionStatus {
        self.inner.session.status().await
    }

    /// Establish a confirmed stream delivering events to `on_event`.
    ///
    /// Resolves once a stream survived the confirmation window, or fails with
    /// [`DriverError::SubscriptionFailed`] when retries are exhausted. A second
    /// call replaces the running stream.
    pub async fn subscribe(
        &self,
        on_event: EventCallback,
    ) -> Result<SubscriptionHandle, DriverError> {
        self.inner.session.state.lock().await.closed = false;
        self.clone().establish(on_event).await?;
        Ok(self.handle())
    }

    // Boxed: the stream task calls back into this on reconnect.
    fn establish(self, on_event: EventCallback) -> BoxFuture<'static, Result<u64, DriverError>> {
        async move {
            let mut failures = 0u32;
            loop {
                match self.connect_once(on_event.clone()).await {
                    Ok(generation) => return Ok(generation),
                    Err(e) => {
                        failures += 1;
                        self.inner.session.record_failure().await;

                        if self.inner.session.is_closed().await {
                            return Err(DriverError::Sse("subscription closed".to_string()));
                        }

                        let retries = failures - 1;
                        if !self.inner.reconnect.should_retry(retries) {
                            error!(
                                "Giving up on event stream after {} attempts: {}",
                                failures, e
                            );
                            return Err(DriverError::SubscriptionFailed { attempts: failures });
                        }

                        let delay = self.inner.reconnect.delay_for_attempt(retries);
                        warn!(
                            "Event stream attempt {} failed: {} (retrying in {:?})",
                            failures, e, delay
                        );
                        sleep(delay).await;
                    }
                }
            }
        }
        .boxed()
    }

    async fn connect_once(&self, on_event: EventCallback) -> Result<u64, DriverError> {
        let stream = self.inner.connector.connect()?;
        let generation = self.inner.session.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let link = Arc::new(ConnectionLink {
            phase: Mutex::new(Phase::Connecting),
            dead: Notify::new(),
        });
        let (opened_tx, opened_rx) = oneshot::channel();

        let task = tokio::spawn(pump(
            stream,
            on_event,
            link.clone(),
            opened_tx,
            self.clone(),
            generation,
        ));

        match opened_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(DriverError::Sse("stream closed before opening".to_string())),
        }

        debug!(
            "Event stream {} opened, confirming for {:?}",
            generation, self.inner.confirm_window
        );

        tokio::select! {
            _ = sleep(self.inner.confirm_window) => {}
            _ = link.dead.notified() => {}
        }

        {
            let mut phase = link.phase.lock().await;
            if *phase == Phase::Dead {
                return Err(DriverError::Sse(format!(
                    "event stream {} dropped during confirmation",
                    generation
                )));
            }
            *phase = Phase::Confirmed;
        }

        self.install(generation, task).await?;
        Ok(generation)
    }

    async fn install(&self, generation: u64, task: JoinHandle<()>) -> Result<(), DriverError> {
        let previous = {
            let mut state = self.inner.session.state.lock().await;
            if state.closed {
                task.abort();
                return Err(DriverError::Sse("subscription closed".to_string()));
            }
            state.last_opened_at = Some(Utc::now());
            state.consecutive_failures = 0;
            state.current.replace(LiveConnection { generation, task })
        };

        if let Some(previous) = previous {
            debug!("Tearing down event stream {}", previous.generation);
            previous.task.abort();
        }

        info!("Event stream {} confirmed", generation);
        Ok(())
    }
}

async fn pump<C: EventConnector>(
    mut stream: EventStream,
    on_event: EventCallback,
    link: Arc<ConnectionLink>,
    opened_tx: oneshot::Sender<Result<(), DriverError>>,
    subscriber: EventSubscriber<C>,
    generation: u64,
) {
    let mut opened_tx = Some(opened_tx);

    let failure = loop {
        match stream.next().await {
            Some(Ok(StreamEvent::Open)) => {
                {
                    let mut phase = link.phase.lock().await;
                    if *phase == Phase::Connecting {
                        *phase = Phase::Open;
                    }
                }
                if let Some(tx) = opened_tx.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            Some(Ok(StreamEvent::Frame { event, data })) => {
                dispatch_frame(&event, &data, &on_event);
            }
            Some(Err(e)) => break e,
            None => break DriverError::Sse("stream ended".to_string()),
        }
    };
    drop(stream);

    let previous = {
        let mut phase = link.phase.lock().await;
        std::mem::replace(&mut *phase, Phase::Dead)
    };
    link.dead.notify_one();

    if let Some(tx) = opened_tx.take() {
        let _ = tx.send(Err(failure));
        return;
    }

    if previous != Phase::Confirmed {
        debug!("Event stream {} failed before confirmation: {}", generation, failure);
        return;
    }

    warn!("Event stream {} failed: {}", generation, failure);
    if subscriber.inner.session.is_closed().await {
        return;
    }
    subscriber.inner.session.record_failure().await;

    tokio::spawn(async move {
        if let Err(e) = subscriber.establish(on_event).await {
            error!("Could not re-establish event stream: {}", e);
        }
    });
}

/// Deliver one frame. Malformed frames are logged and dropped.
fn dispatch_frame(event: &str, data: &str, on_event: &EventCallback) {
    if event != INVOICE_PAID_EVENT {
        debug!("Ignoring SSE event type: {}", event);
        return;
    }

    match serde_json::from_str::<RawInvoicePaid>(data) {
        Ok(raw) => on_event(WalletEvent::from(raw)),
        Err(e) => {
            warn!("Failed to parse {} event: {}", INVOICE_PAID_EVENT, e);
            debug!("Raw data: {}", data);
        }
    }
}
