//! Result shapes handed to pages.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use webln_core::WeblnError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetInfoResponse {
    pub alias: String,
    /// Node public key.
    pub pubkey: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendPaymentResponse {
    pub preimage: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInvoiceResponse {
    pub payment_request: String,
}

impl GetInfoResponse {
    /// Map the wallet's node info.
    pub fn from_node_info(info: &Value) -> Result<Self, WeblnError> {
        Ok(Self {
            alias: string_field(info, "alias")?,
            pubkey: string_field(info, "id")?,
            color: string_field(info, "color")?,
        })
    }
}

pub(crate) fn string_field(value: &Value, name: &str) -> Result<String, WeblnError> {
    value
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| WeblnError::Transport(format!("response has no '{}'", name)))
}
