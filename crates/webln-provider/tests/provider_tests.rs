//! Provider tests against a scripted relay on the window channel.
//!
//! Run with:
//!   cargo test -p webln-provider --test provider_tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{broadcast, Notify};
use webln_core::{
    CorrelationId, InvoiceOptions, RequestBody, WeblnError, WindowRequest, WindowResponse,
    APPLICATION,
};
use webln_provider::WeblnProvider;

type Answer = Box<dyn Fn(&WindowRequest) -> Option<Result<Value, WeblnError>> + Send + Sync>;

/// Relay stand-in: answers each request with `answer`, or never when it
/// returns `None`.
fn spawn_relay(window: &broadcast::Sender<Value>, answer: Answer) -> Arc<Mutex<Vec<RequestBody>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut rx = window.subscribe();
    let tx = window.clone();
    let log = seen.clone();
    tokio::spawn(async move {
        while let Ok(message) = rx.recv().await {
            let Some(request) = WindowRequest::parse(&message) else {
                continue;
            };
            log.lock().unwrap().push(request.body.clone());
            if let Some(result) = answer(&request) {
                let _ = tx.send(WindowResponse::from_result(request.id, result).to_value());
            }
        }
    });
    seen
}

fn wallet(request: &WindowRequest) -> Option<Result<Value, WeblnError>> {
    Some(match &request.body {
        RequestBody::Enable => Ok(json!({"enabled": true})),
        RequestBody::GetInfo => Ok(json!({
            "id": "02ab", "alias": "kwh", "color": "ff9900", "blockheight": 600000
        })),
        RequestBody::SendPayment { .. } => Ok(json!({
            "msatoshi_paid": 1000, "msatoshi_fees": 0, "preimage": "beef"
        })),
        RequestBody::MakeInvoice(options) => Ok(json!({
            "bolt11": format!("lnbc{}n1test", options.amount.unwrap_or_default() * 10),
            "hash": "aa"
        })),
        RequestBody::GetBlocked => Ok(json!(false)),
        _ => Err(WeblnError::Unsupported("no".to_string())),
    })
}

fn setup(answer: Answer) -> (WeblnProvider, Arc<Mutex<Vec<RequestBody>>>, broadcast::Sender<Value>) {
    let (window, _) = broadcast::channel(64);
    let seen = spawn_relay(&window, answer);
    (WeblnProvider::new(window.clone()), seen, window)
}

fn names(seen: &Arc<Mutex<Vec<RequestBody>>>) -> Vec<&'static str> {
    seen.lock().unwrap().iter().map(RequestBody::name).collect()
}

mod api_tests {
    use super::*;

    #[tokio::test]
    async fn test_get_info_enables_first() {
        let (webln, seen, _window) = setup(Box::new(wallet));

        let info = webln.get_info().await.unwrap();
        assert_eq!(info.alias, "kwh");
        assert_eq!(info.pubkey, "02ab");
        assert_eq!(info.color, "ff9900");
        assert_eq!(names(&seen), vec!["enable", "getInfo"]);
        assert_eq!(webln.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_send_payment_returns_preimage() {
        let (webln, seen, _window) = setup(Box::new(wallet));

        let paid = webln.send_payment("lnbc1invoice").await.unwrap();
        assert_eq!(paid.preimage, "beef");
        assert_eq!(names(&seen), vec!["enable", "sendPayment"]);
        assert!(!webln.prompt_active());
    }

    #[tokio::test]
    async fn test_make_invoice_from_amount_or_options() {
        let (webln, seen, _window) = setup(Box::new(wallet));

        let invoice = webln.make_invoice(21u64).await.unwrap();
        assert_eq!(invoice.payment_request, "lnbc210n1test");

        let options = InvoiceOptions {
            minimum_amount: Some(10),
            maximum_amount: Some(100),
            default_memo: Some("tip jar".to_string()),
            ..Default::default()
        };
        webln.make_invoice(options.clone()).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[1], RequestBody::MakeInvoice(InvoiceOptions::fixed(21)));
        assert_eq!(seen[3], RequestBody::MakeInvoice(options));
    }

    #[tokio::test]
    async fn test_signing_is_unsupported_locally() {
        let (webln, seen, _window) = setup(Box::new(wallet));

        assert!(matches!(
            webln.sign_message("hello").await,
            Err(WeblnError::Unsupported(_))
        ));
        assert!(matches!(
            webln.verify_message("sig", "hello").await,
            Err(WeblnError::Unsupported(_))
        ));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_is_blocked_skips_enable() {
        let (webln, seen, _window) = setup(Box::new(wallet));

        assert!(!webln.is_blocked().await.unwrap());
        assert_eq!(names(&seen), vec!["getBlocked"]);
    }

    #[tokio::test]
    async fn test_denied_enable_stops_call() {
        let (webln, seen, _window) = setup(Box::new(|request: &WindowRequest| {
            Some(match request.body {
                RequestBody::Enable => Err(WeblnError::denied("user denied the request")),
                _ => Ok(json!({})),
            })
        }));

        let err = webln.send_payment("lnbc1invoice").await.unwrap_err();
        assert!(matches!(err, WeblnError::UserDenied(_)));
        assert_eq!(names(&seen), vec!["enable"]);
    }
}

mod correlation_tests {
    use super::*;

    #[tokio::test]
    async fn test_out_of_order_responses_reach_their_callers() {
        let (window, _) = broadcast::channel(64);
        let webln = Arc::new(WeblnProvider::new(window.clone()));

        // collect three requests, then answer them newest first
        let mut rx = window.subscribe();
        let tx = window.clone();
        tokio::spawn(async move {
            let mut ids = Vec::new();
            while ids.len() < 3 {
                if let Some(request) = WindowRequest::parse(&rx.recv().await.unwrap()) {
                    ids.push(request.id);
                }
            }
            for id in ids.into_iter().rev() {
                let data = json!({"for": id.as_str()});
                tx.send(WindowResponse::ok(id, data).to_value()).unwrap();
            }
        });

        let calls: Vec<_> = (0..3)
            .map(|_| {
                let webln = webln.clone();
                tokio::spawn(async move { webln.request(RequestBody::GetInfo).await })
            })
            .collect();

        let mut answered = Vec::new();
        for call in calls {
            answered.push(call.await.unwrap().unwrap()["for"].as_str().unwrap().to_string());
        }
        answered.sort();
        answered.dedup();
        assert_eq!(answered.len(), 3);
        assert_eq!(webln.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_foreign_responses_are_ignored() {
        let (webln, _seen, window) = setup(Box::new(|_: &WindowRequest| None));

        let pending = tokio::spawn(async move { webln.request(RequestBody::GetBlocked).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        window
            .send(json!({"application": "other", "response": true, "id": "x", "data": true}))
            .unwrap();
        window
            .send(WindowResponse::ok(CorrelationId::from("unknown"), json!(true)).to_value())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!pending.is_finished());
        pending.abort();
    }

    #[tokio::test]
    async fn test_abandoned_request_is_forgotten() {
        let (webln, _seen, _window) = setup(Box::new(|_: &WindowRequest| None));

        let result =
            tokio::time::timeout(Duration::from_millis(20), webln.request(RequestBody::GetInfo)).await;
        assert!(result.is_err());
        assert_eq!(webln.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_second_prompt_is_rejected() {
        let release = Arc::new(Notify::new());
        let (window, _) = broadcast::channel(64);

        // hold the first enable until released
        let mut rx = window.subscribe();
        let tx = window.clone();
        let gate = release.clone();
        tokio::spawn(async move {
            while let Ok(message) = rx.recv().await {
                if let Some(request) = WindowRequest::parse(&message) {
                    gate.notified().await;
                    let response = WindowResponse::ok(request.id, json!({"enabled": true}));
                    let _ = tx.send(response.to_value());
                }
            }
        });

        let webln = Arc::new(WeblnProvider::new(window));
        let first = {
            let webln = webln.clone();
            tokio::spawn(async move { webln.enable().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(webln.prompt_active());

        assert_eq!(webln.enable().await, Err(WeblnError::PromptBusy));
        assert_eq!(
            webln.make_invoice(5u64).await.unwrap_err(),
            WeblnError::PromptBusy
        );

        release.notify_one();
        assert!(first.await.unwrap().is_ok());
        assert!(!webln.prompt_active());
    }

    #[test]
    fn test_marker_constant() {
        let request = WindowRequest::new(CorrelationId::from("1"), RequestBody::Enable);
        assert_eq!(request.to_value()["application"], APPLICATION);
    }
}
