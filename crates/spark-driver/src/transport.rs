//! Signed HTTP transport for backend RPC calls.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::{BackendCredential, DriverConfig, CLIENT_ID};
use crate::error::DriverError;

/// Request body sent to `<endpoint>/rpc`.
#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    params: &'a Value,
}

/// Something that can execute a backend RPC method.
///
/// The HTTP implementation is [`HttpTransport`]; tests substitute their own.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Call `method` with `params` and return the raw JSON result.
    async fn call(&self, method: &str, params: Value) -> Result<Value, DriverError>;
}

/// RPC over HTTP POST, authenticated with the derived access key.
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    credential: BackendCredential,
}

impl HttpTransport {
    /// Build a transport from the driver configuration.
    pub fn new(config: &DriverConfig) -> Result<Self, DriverError> {
        config.credential.validate()?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.http_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(DriverError::Http)?;

        Ok(Self {
            http,
            credential: config.credential.clone(),
        })
    }

    /// Get the underlying HTTP client.
    pub fn http_client(&self) -> &Client {
        &self.http
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, DriverError> {
        let url = self.credential.rpc_url();
        let access_key = self.credential.access_key()?;

        debug!("RPC call: {}", method);

        let response = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("X-Requested-With", CLIENT_ID)
            .header("X-Access", access_key)
            .json(&RpcRequest {
                method,
                params: &params,
            })
            .send()
            .await
            .map_err(DriverError::Http)?;

        let status = response.status();
        let body = response.text().await.map_err(DriverError::Http)?;

        // Error bodies carry a `code` even on non-2xx statuses, so try JSON first.
        match serde_json::from_str::<Value>(&body) {
            Ok(value) => check_rpc_error(value),
            Err(_) if !status.is_success() => Err(DriverError::Connection(format!(
                "HTTP {}: {}",
                status, body
            ))),
            Err(e) => Err(DriverError::Json(e)),
        }
    }
}

/// Turn a body carrying a `code` field into [`DriverError::Rpc`].
pub fn check_rpc_error(value: Value) -> Result<Value, DriverError> {
    let code = match value.get("code") {
        None | Some(Value::Null) => return Ok(value),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    let message = value
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| code.clone());

    Err(DriverError::Rpc { code, message })
}
