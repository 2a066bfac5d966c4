//! Driver tests against a recording in-memory transport.
//!
//! Run with:
//!   cargo test -p spark-driver --test driver_tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use spark_driver::transport::check_rpc_error;
use spark_driver::{
    DriverError, EventConnector, EventStream, EventSubscriber, InvoiceRequest, LightningDriver,
    PayRequest, ReconnectConfig, RpcTransport, SparkDriver, LABEL_PREFIX,
};

/// Transport answering from canned responses and recording every call.
#[derive(Default)]
struct FakeTransport {
    responses: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl FakeTransport {
    fn respond(self, method: &str, value: Value) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(method.to_string(), value);
        self
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RpcTransport for FakeTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, DriverError> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params));
        let value = self
            .responses
            .lock()
            .unwrap()
            .get(method)
            .cloned()
            .ok_or_else(|| DriverError::Connection(format!("no response for {}", method)))?;
        check_rpc_error(value)
    }
}

/// Connector that never manages to connect.
struct Offline {
    attempts: AtomicUsize,
}

impl EventConnector for Offline {
    fn connect(&self) -> Result<EventStream, DriverError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(DriverError::Connection("offline".to_string()))
    }
}

fn driver(transport: FakeTransport) -> SparkDriver<FakeTransport, Offline> {
    let subscriber = EventSubscriber::new(
        Offline {
            attempts: AtomicUsize::new(0),
        },
        ReconnectConfig {
            max_retries: Some(0),
            ..Default::default()
        },
        Duration::from_millis(10),
    );
    SparkDriver::with_parts(transport, subscriber)
}

// BOLT #11 example: 2500u for "1 cup coffee", 60s expiry.
const COFFEE: &str = "lnbc2500u1pvjluezpp5qqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqypqdq5xysxxatsyp3k7enxv4jsxqzpuaztrnwngzn3kdzw5hydlzf03qdgm2hdq27cqv3agm2awhz5se903vruatfhq77w3ls4evs3ch9zw97j25emudupq63nyw24cg27h2rspfj9srp";
const DONATION: &str = "lnbc1pvjluezpp5qqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqypqdpl2pkx2ctnv5sxxmmwwd5kgetjypeh2ursdae8g6twvus8g6rfwvs8qun0dfjkxaq8rkx3yf5tcsyz3d73gafnh3cax9rn449d9p5uxz9ezhhypd0elx87sjle52x86fux2ypatgddc6k63n7erqz25le42c4u4ecky03ylcqca784w";
const PAYEE: &str = "03e7156ae33b0a208d0744199163177e909e80176e55d97a2f221ede0f934dd9ad";
const HASH: &str = "0001020304050607080900010203040506070809000102030405060708090102";

mod pay_tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_amount_invoice_with_explicit_amount_makes_no_call() {
        let driver = driver(FakeTransport::default());

        let err = driver
            .pay(PayRequest::new(COFFEE).with_amount(1_000))
            .await
            .unwrap_err();

        assert!(matches!(err, DriverError::InvalidAmount(_)));
        assert!(err.is_validation());
        assert!(driver.transport().calls().is_empty());
    }

    #[tokio::test]
    async fn test_amountless_invoice_requires_amount() {
        let driver = driver(FakeTransport::default());

        let err = driver.pay(PayRequest::new(DONATION)).await.unwrap_err();
        assert!(matches!(err, DriverError::InvalidAmount(_)));
        assert!(driver.transport().calls().is_empty());
    }

    #[tokio::test]
    async fn test_pay_maps_result() {
        let transport = FakeTransport::default().respond(
            "pay",
            json!({
                "id": 12,
                "payment_hash": HASH,
                "destination": PAYEE,
                "msatoshi": 250000000,
                "msatoshi_sent": 250001250,
                "created_at": 1496314700,
                "status": "complete",
                "payment_preimage": "ab".repeat(32),
            }),
        );
        let driver = driver(transport);

        let result = driver
            .pay(PayRequest::new(format!("lightning:{}", COFFEE)).with_description("coffee"))
            .await
            .unwrap();

        assert_eq!(result.msatoshi_paid, 250_001_250);
        assert_eq!(result.msatoshi_fees, 1_250);
        assert_eq!(result.preimage, "ab".repeat(32));

        let calls = driver.transport().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "pay");
        assert_eq!(
            calls[0].1,
            json!({"bolt11": COFFEE, "label": "coffee"}),
            "scheme stripped, no msatoshi for fixed invoices"
        );
    }

    #[tokio::test]
    async fn test_pay_amountless_sends_amount() {
        let transport = FakeTransport::default().respond(
            "pay",
            json!({"payment_preimage": "00", "msatoshi": 5000, "msatoshi_sent": 5000}),
        );
        let driver = driver(transport);

        let result = driver
            .pay(PayRequest::new(DONATION).with_amount(5_000))
            .await
            .unwrap();
        assert_eq!(result.msatoshi_fees, 0);

        let calls = driver.transport().calls();
        assert_eq!(calls[0].1["msatoshi"], 5000);
        assert_eq!(calls[0].1["label"], "unnamed invoice");
    }

    #[tokio::test]
    async fn test_backend_error_is_preserved() {
        let transport = FakeTransport::default().respond(
            "pay",
            json!({"code": 205, "message": "Could not find a route"}),
        );
        let driver = driver(transport);

        match driver.pay(PayRequest::new(COFFEE)).await {
            Err(DriverError::Rpc { code, message }) => {
                assert_eq!(code, "205");
                assert_eq!(message, "Could not find a route");
            }
            other => panic!("expected RPC error, got {:?}", other),
        }
    }
}

mod invoice_tests {
    use super::*;

    fn invoice_transport() -> FakeTransport {
        FakeTransport::default().respond(
            "invoice",
            json!({
                "payment_hash": HASH,
                "expires_at": 1496318258,
                "bolt11": COFFEE,
            }),
        )
    }

    #[tokio::test]
    async fn test_make_invoice_generates_distinct_labels() {
        let driver = driver(invoice_transport());

        let first = driver
            .make_invoice(InvoiceRequest::new(100_000, "coffee"))
            .await
            .unwrap();
        let second = driver
            .make_invoice(InvoiceRequest::new(100_000, "coffee"))
            .await
            .unwrap();

        assert!(first.label.starts_with(LABEL_PREFIX));
        assert_ne!(first.label, second.label);
        assert_eq!(first.bolt11, COFFEE);
        assert_eq!(first.hash, HASH);
        assert_eq!(first.description, "coffee");
        assert_eq!(first.msatoshi, Some(100_000));
        assert_eq!(first.expires_at, Some(1496318258));

        let calls = driver.transport().calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "invoice");
        assert_eq!(calls[0].1["msatoshi"], 100_000);
        assert_eq!(calls[0].1["description"], "coffee");
        assert_eq!(calls[0].1["expiry"], 3600);
        assert_eq!(calls[0].1["label"], first.label.as_str());
        assert_eq!(calls[1].1["label"], second.label.as_str());
    }

    #[tokio::test]
    async fn test_make_invoice_keeps_explicit_label_and_any_amount() {
        let driver = driver(invoice_transport());

        let created = driver
            .make_invoice(InvoiceRequest::any_amount("tips").with_label("tips-jar"))
            .await
            .unwrap();

        assert_eq!(created.label, "tips-jar");
        assert_eq!(created.msatoshi, None);
        assert_eq!(driver.transport().calls()[0].1["msatoshi"], "any");
    }

    #[tokio::test]
    async fn test_decode_maps_canonical_fields() {
        let transport = FakeTransport::default().respond(
            "decodepay",
            json!({
                "currency": "bc",
                "created_at": 1496314658,
                "expiry": 60,
                "payee": PAYEE,
                "msatoshi": 250000000,
                "description": "1 cup coffee",
                "min_final_cltv_expiry": 9,
                "payment_hash": HASH,
                "signature": "3045022100...",
            }),
        );
        let driver = driver(transport);

        let decoded = driver.decode(COFFEE).await.unwrap();

        assert_eq!(decoded.description.as_deref(), Some("1 cup coffee"));
        assert_eq!(decoded.msatoshi, Some(250_000_000));
        assert_eq!(decoded.nodeid, PAYEE);
        assert_eq!(decoded.hash, HASH);
        assert_eq!(decoded.creation, 1496314658);
        assert_eq!(decoded.expiry, 60);

        let calls = driver.transport().calls();
        assert_eq!(calls[0], ("decodepay".to_string(), json!([COFFEE])));
    }

    #[tokio::test]
    async fn test_decode_rejects_empty_input() {
        let driver = driver(FakeTransport::default());
        assert!(matches!(
            driver.decode("  ").await,
            Err(DriverError::InvalidInvoice(_))
        ));
        assert!(driver.transport().calls().is_empty());
    }
}

mod info_tests {
    use super::*;

    #[tokio::test]
    async fn test_summary_combines_listings() {
        let transport = FakeTransport::default()
            .respond(
                "getinfo",
                json!({"id": PAYEE, "alias": "kwh", "color": "ff9900", "blockheight": 600000,
                       "address": [{"type": "ipv4", "address": "10.0.0.1", "port": 9735}]}),
            )
            .respond(
                "listfunds",
                json!({"outputs": [], "channels": [{"channel_sat": 40000}, {"channel_sat": 2000}]}),
            )
            .respond(
                "listinvoices",
                json!({"invoices": [
                    {"label": "a", "status": "paid", "paid_at": 300, "msatoshi": 1000, "description": "tip"},
                    {"label": "b", "status": "expired", "expires_at": 100, "msatoshi": 9}
                ]}),
            )
            .respond(
                "listpayments",
                json!({"payments": [
                    {"status": "complete", "created_at": 200, "msatoshi": 5000, "msatoshi_sent": 5005,
                     "payment_preimage": "pp"}
                ]}),
            );
        let driver = driver(transport);

        let summary = driver.summary().await.unwrap();
        assert_eq!(summary.info.alias, "kwh");
        assert_eq!(summary.info.address.as_deref(), Some("10.0.0.1:9735"));
        assert_eq!(summary.balance, 42_000);
        assert_eq!(summary.transactions.len(), 2);
        assert_eq!(summary.transactions[0].amount, 1000);
        assert_eq!(summary.transactions[1].amount, -5000);
        assert_eq!(summary.transactions[1].fees, Some(5));
    }

    #[tokio::test]
    async fn test_unexpected_shape() {
        let transport = FakeTransport::default().respond("getinfo", json!({"alias": "no id"}));
        let driver = driver(transport);

        assert!(matches!(
            driver.get_info().await,
            Err(DriverError::UnexpectedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_subscription_reports_failure_when_offline() {
        let driver = driver(FakeTransport::default());

        let err = driver
            .subscribe_events(std::sync::Arc::new(|_| {}))
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::SubscriptionFailed { attempts: 1 }));
        assert!(err.is_transport());
    }
}
