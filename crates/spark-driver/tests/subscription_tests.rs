//! Event subscription tests with a scripted connector and a paused clock.
//!
//! Run with:
//!   cargo test -p spark-driver --test subscription_tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::stream::{self, StreamExt};
use spark_driver::{
    DriverError, EventCallback, EventConnector, EventStream, EventSubscriber, ReconnectConfig,
    StreamEvent, WalletEvent,
};
use tokio::time::sleep;

type Item = Result<StreamEvent, DriverError>;

/// What the next connection attempt does.
enum Script {
    Refuse,
    FailBeforeOpen,
    OpenThenFail,
    Hold(futures::channel::mpsc::UnboundedReceiver<Item>),
}

#[derive(Clone, Default)]
struct ScriptedConnector {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    attempts: Arc<AtomicU32>,
}

impl ScriptedConnector {
    fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    /// Queue a connection that opens and then stays under test control.
    fn push_held(&self) -> UnboundedSender<Item> {
        let (tx, rx) = unbounded();
        tx.unbounded_send(Ok(StreamEvent::Open)).unwrap();
        self.push(Script::Hold(rx));
        tx
    }

    fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl EventConnector for ScriptedConnector {
    fn connect(&self) -> Result<EventStream, DriverError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let reset = || -> Item { Err(DriverError::Sse("connection reset".to_string())) };
        match self.scripts.lock().unwrap().pop_front() {
            None | Some(Script::Refuse) => {
                Err(DriverError::Connection("connection refused".to_string()))
            }
            Some(Script::FailBeforeOpen) => Ok(stream::iter(vec![reset()]).boxed()),
            Some(Script::OpenThenFail) => {
                Ok(stream::iter(vec![Ok(StreamEvent::Open), reset()]).boxed())
            }
            Some(Script::Hold(rx)) => Ok(rx.boxed()),
        }
    }
}

fn subscriber(
    connector: &ScriptedConnector,
    max_retries: Option<u32>,
) -> EventSubscriber<ScriptedConnector> {
    EventSubscriber::new(
        connector.clone(),
        ReconnectConfig {
            max_retries,
            ..Default::default()
        },
        Duration::from_secs(1),
    )
}

fn recorder() -> (EventCallback, Arc<Mutex<Vec<WalletEvent>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback: EventCallback = Arc::new(move |event| sink.lock().unwrap().push(event));
    (callback, seen)
}

fn paid(hash: &str) -> Item {
    Ok(StreamEvent::Frame {
        event: "inv-paid".to_string(),
        data: format!(
            r#"{{"msatoshi_received":1000,"payment_hash":"{}","description":"tip"}}"#,
            hash
        ),
    })
}

fn hashes(seen: &Arc<Mutex<Vec<WalletEvent>>>) -> Vec<String> {
    let mut hashes: Vec<String> = seen
        .lock()
        .unwrap()
        .iter()
        .map(|e| e.hash().to_string())
        .collect();
    hashes.sort();
    hashes
}

mod retry_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_fourth_attempt() {
        let connector = ScriptedConnector::default();
        connector.push(Script::Refuse);
        connector.push(Script::FailBeforeOpen);
        connector.push(Script::OpenThenFail);
        let _tx = connector.push_held();

        let subscriber = subscriber(&connector, Some(10));
        let (callback, _) = recorder();

        let handle = subscriber.subscribe(callback).await.unwrap();

        assert_eq!(connector.attempts(), 4);
        let status = handle.status().await;
        assert!(status.connected);
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.last_opened_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_cap() {
        let connector = ScriptedConnector::default();
        let subscriber = subscriber(&connector, Some(2));
        let (callback, _) = recorder();

        let err = subscriber.subscribe(callback).await.unwrap_err();
        assert!(matches!(err, DriverError::SubscriptionFailed { attempts: 3 }));
        assert_eq!(connector.attempts(), 3);

        // nothing keeps retrying in the background
        sleep(Duration::from_secs(120)).await;
        assert_eq!(connector.attempts(), 3);

        let status = subscriber.status().await;
        assert!(!status.connected);
        assert_eq!(status.consecutive_failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_drop_counts_as_failure() {
        let connector = ScriptedConnector::default();
        connector.push(Script::OpenThenFail);
        let _tx = connector.push_held();

        let subscriber = subscriber(&connector, Some(0));
        let (callback, _) = recorder();

        // a single attempt allowed, and the first stream dies while confirming
        let err = subscriber.subscribe(callback).await.unwrap_err();
        assert!(matches!(err, DriverError::SubscriptionFailed { attempts: 1 }));
    }
}

mod stream_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_malformed_frame_is_dropped() {
        let connector = ScriptedConnector::default();
        let tx = connector.push_held();
        let subscriber = subscriber(&connector, Some(3));
        let (callback, seen) = recorder();

        let handle = subscriber.subscribe(callback).await.unwrap();

        tx.unbounded_send(Ok(StreamEvent::Frame {
            event: "inv-paid".to_string(),
            data: "{broken".to_string(),
        }))
        .unwrap();
        tx.unbounded_send(paid("after")).unwrap();
        sleep(Duration::from_millis(10)).await;

        assert_eq!(hashes(&seen), vec!["after".to_string()]);
        assert!(handle.status().await.connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacement_keeps_delivering() {
        let connector = ScriptedConnector::default();
        let first = connector.push_held();
        let subscriber = subscriber(&connector, Some(3));
        let (callback, seen) = recorder();

        subscriber.subscribe(callback.clone()).await.unwrap();
        first.unbounded_send(paid("a1")).unwrap();

        let second = connector.push_held();
        let replacing = {
            let subscriber = subscriber.clone();
            let callback = callback.clone();
            tokio::spawn(async move { subscriber.subscribe(callback).await })
        };

        // both streams are live while the replacement is confirming
        sleep(Duration::from_millis(100)).await;
        first.unbounded_send(paid("a2")).unwrap();
        second.unbounded_send(paid("b1")).unwrap();

        replacing.await.unwrap().unwrap();
        second.unbounded_send(paid("b2")).unwrap();
        sleep(Duration::from_millis(10)).await;

        assert_eq!(hashes(&seen), vec!["a1", "a2", "b1", "b2"]);
        assert!(first.is_closed(), "old stream is torn down");

        let status = subscriber.status().await;
        assert!(status.connected);
        assert_eq!(status.generation, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubscribes_after_confirmed_stream_fails() {
        let connector = ScriptedConnector::default();
        let first = connector.push_held();
        let subscriber = subscriber(&connector, Some(3));
        let (callback, seen) = recorder();

        subscriber.subscribe(callback).await.unwrap();
        let second = connector.push_held();

        first
            .unbounded_send(Err(DriverError::Sse("server went away".to_string())))
            .unwrap();
        sleep(Duration::from_secs(2)).await;

        assert_eq!(connector.attempts(), 2);
        let status = subscriber.status().await;
        assert!(status.connected);
        assert_eq!(status.generation, 2);

        second.unbounded_send(paid("resumed")).unwrap();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(hashes(&seen), vec!["resumed".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_stream() {
        let connector = ScriptedConnector::default();
        let tx = connector.push_held();
        let subscriber = subscriber(&connector, Some(3));
        let (callback, seen) = recorder();

        let handle = subscriber.subscribe(callback).await.unwrap();
        handle.close().await;
        sleep(Duration::from_millis(10)).await;

        assert!(tx.is_closed());
        assert!(tx.unbounded_send(paid("late")).is_err());
        assert!(seen.lock().unwrap().is_empty());

        let status = handle.status().await;
        assert!(status.closed);
        assert!(!status.connected);
        assert_eq!(connector.attempts(), 1);
    }
}
