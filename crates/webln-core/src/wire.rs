//! Messages exchanged over the shared window channel.
//!
//! Requests look like `{application, type, id, ...payload}`, responses like
//! `{application, response: true, id, data | error}`. Anything without the
//! application marker belongs to someone else and is ignored.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::action::{CorrelationId, InvoiceOptions};
use crate::error::{WeblnError, WireError};

/// Marker carried by every message of this bridge.
pub const APPLICATION: &str = "kwh-bridge";

/// Request payloads a page may post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RequestBody {
    Enable,
    GetInfo,
    #[serde(rename_all = "camelCase")]
    SendPayment {
        payment_request: String,
    },
    MakeInvoice(InvoiceOptions),
    SignMessage {
        message: String,
    },
    VerifyMessage {
        signature: String,
        message: String,
    },
    /// Whether the page's domain is blocked.
    GetBlocked,
}

impl RequestBody {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::GetInfo => "getInfo",
            Self::SendPayment { .. } => "sendPayment",
            Self::MakeInvoice(_) => "makeInvoice",
            Self::SignMessage { .. } => "signMessage",
            Self::VerifyMessage { .. } => "verifyMessage",
            Self::GetBlocked => "getBlocked",
        }
    }
}

/// A request posted by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRequest {
    pub application: String,
    pub id: CorrelationId,
    #[serde(flatten)]
    pub body: RequestBody,
}

impl WindowRequest {
    pub fn new(id: CorrelationId, body: RequestBody) -> Self {
        Self {
            application: APPLICATION.to_string(),
            id,
            body,
        }
    }

    /// Parse a raw window message.
    ///
    /// Returns `None` for responses, foreign messages and payloads that do
    /// not match a known request.
    pub fn parse(message: &Value) -> Option<Self> {
        if !carries_marker(message) || is_response(message) {
            return None;
        }
        serde_json::from_value(message.clone()).ok()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// The answer posted for exactly one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResponse {
    pub application: String,
    pub response: bool,
    pub id: CorrelationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

impl WindowResponse {
    pub fn ok(id: CorrelationId, data: Value) -> Self {
        Self {
            application: APPLICATION.to_string(),
            response: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(id: CorrelationId, error: &WeblnError) -> Self {
        Self {
            application: APPLICATION.to_string(),
            response: true,
            id,
            data: None,
            error: Some(error.to_wire()),
        }
    }

    pub fn from_result(id: CorrelationId, result: Result<Value, WeblnError>) -> Self {
        match result {
            Ok(data) => Self::ok(id, data),
            Err(e) => Self::err(id, &e),
        }
    }

    /// Parse a raw window message, ignoring anything that is not one of ours.
    pub fn parse(message: &Value) -> Option<Self> {
        if !carries_marker(message) || !is_response(message) {
            return None;
        }
        serde_json::from_value(message.clone()).ok()
    }

    pub fn into_result(self) -> Result<Value, WeblnError> {
        match self.error {
            Some(error) => Err(error.into()),
            None => Ok(self.data.unwrap_or(Value::Null)),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn carries_marker(message: &Value) -> bool {
    message.get("application").and_then(Value::as_str) == Some(APPLICATION)
}

fn is_response(message: &Value) -> bool {
    message.get("response").and_then(Value::as_bool) == Some(true)
}

/// Accept amounts given as numbers or numeric strings.
pub(crate) fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("amount {} is not a whole number", n))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("amount '{}' is not a number", s))),
        Some(other) => Err(D::Error::custom(format!("unexpected amount {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_request() {
        let message = json!({
            "application": APPLICATION,
            "type": "sendPayment",
            "id": "42",
            "paymentRequest": "lnbc1xyz"
        });
        let request = WindowRequest::parse(&message).unwrap();
        assert_eq!(request.id.as_str(), "42");
        assert_eq!(
            request.body,
            RequestBody::SendPayment {
                payment_request: "lnbc1xyz".to_string()
            }
        );
        assert_eq!(request.to_value(), message);
    }

    #[test]
    fn test_make_invoice_accepts_string_amounts() {
        let message = json!({
            "application": APPLICATION,
            "type": "makeInvoice",
            "id": "7",
            "amount": "1000",
            "defaultMemo": "tip"
        });
        match WindowRequest::parse(&message).unwrap().body {
            RequestBody::MakeInvoice(options) => {
                assert_eq!(options.amount, Some(1000));
                assert_eq!(options.default_memo.as_deref(), Some("tip"));
                assert_eq!(options.minimum_amount, None);
            }
            other => panic!("expected makeInvoice, got {:?}", other),
        }

        let bad = json!({"application": APPLICATION, "type": "makeInvoice", "id": "8", "amount": "lots"});
        assert!(WindowRequest::parse(&bad).is_none());
    }

    #[test]
    fn test_foreign_and_response_messages_are_not_requests() {
        assert!(WindowRequest::parse(&json!({"type": "enable", "id": "1"})).is_none());
        assert!(WindowRequest::parse(&json!({
            "application": "other", "type": "enable", "id": "1"
        }))
        .is_none());
        assert!(WindowRequest::parse(&json!({
            "application": APPLICATION, "response": true, "id": "1", "data": null
        }))
        .is_none());
        assert!(WindowRequest::parse(&json!({
            "application": APPLICATION, "type": "teleport", "id": "1"
        }))
        .is_none());
    }

    #[test]
    fn test_response_shapes() {
        let ok = WindowResponse::ok(CorrelationId::from("1"), json!({"enabled": true}));
        assert_eq!(
            ok.to_value(),
            json!({"application": APPLICATION, "response": true, "id": "1", "data": {"enabled": true}})
        );

        let err = WindowResponse::err(CorrelationId::from("2"), &WeblnError::PromptBusy);
        let value = err.to_value();
        assert_eq!(value["error"]["kind"], "prompt_busy");
        assert!(value.get("data").is_none());

        let parsed = WindowResponse::parse(&value).unwrap();
        assert_eq!(parsed.into_result(), Err(WeblnError::PromptBusy));
    }

    #[test]
    fn test_request_is_not_a_response() {
        let request = WindowRequest::new(CorrelationId::from("3"), RequestBody::Enable);
        assert!(WindowResponse::parse(&request.to_value()).is_none());
    }
}
