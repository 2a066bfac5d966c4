//! Configuration types for spark-driver.

use std::env;
use std::fmt;
use std::time::Duration;

use crate::access::access_key;
use crate::error::DriverError;
use crate::sse::ReconnectConfig;

/// Identifier of the only backend dialect this driver speaks.
pub const DRIVER_KIND: &str = "lightningd_spark";

/// Value of the `X-Requested-With` header sent on every RPC call.
pub const CLIENT_ID: &str = "kwh-bridge";

/// Default confirmation window for a freshly opened event stream.
pub const DEFAULT_CONFIRM_WINDOW: Duration = Duration::from_secs(2);

/// Credentials for the remote wallet.
///
/// Immutable once loaded. The password never leaves the driver: callers only
/// ever see the derived access key on the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendCredential {
    /// Backend dialect (always [`DRIVER_KIND`] for this crate).
    pub kind: String,
    /// Base URL of the spark server (e.g. "https://node.example:9737").
    pub endpoint: String,
    pub username: String,
    pub password: String,
}

impl BackendCredential {
    /// Create a credential for the spark backend.
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            kind: DRIVER_KIND.to_string(),
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Load credentials from environment variables.
    ///
    /// Required:
    /// - `SPARK_ENDPOINT` - Base URL of the spark server
    /// - `SPARK_USERNAME` - Login name
    /// - `SPARK_PASSWORD` - Login password
    ///
    /// Optional:
    /// - `SPARK_KIND` - Backend kind (default: lightningd_spark)
    pub fn from_env() -> Result<Self, DriverError> {
        let endpoint = required_var("SPARK_ENDPOINT")?;
        let username = required_var("SPARK_USERNAME")?;
        let password = required_var("SPARK_PASSWORD")?;
        let kind = env::var("SPARK_KIND").unwrap_or_else(|_| DRIVER_KIND.to_string());

        let credential = Self {
            kind,
            endpoint,
            username,
            password,
        };
        credential.validate()?;
        Ok(credential)
    }

    /// Check that the credential targets this driver and is complete.
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.kind != DRIVER_KIND {
            return Err(DriverError::Config(format!(
                "unsupported backend kind '{}', expected '{}'",
                self.kind, DRIVER_KIND
            )));
        }
        if self.endpoint.trim().is_empty() {
            return Err(DriverError::Config("endpoint is empty".to_string()));
        }
        Ok(())
    }

    /// Endpoint with a scheme and without trailing slashes.
    pub fn base_url(&self) -> String {
        normalize_url(&self.endpoint)
    }

    /// Get the RPC endpoint URL.
    pub fn rpc_url(&self) -> String {
        format!("{}/rpc", self.base_url())
    }

    /// Get the event stream URL, signed with the access key.
    pub fn stream_url(&self) -> Result<String, DriverError> {
        Ok(format!(
            "{}/stream?access-key={}",
            self.base_url(),
            self.access_key()?
        ))
    }

    /// Derive the access key sent with every call.
    pub fn access_key(&self) -> Result<String, DriverError> {
        access_key(&self.username, &self.password)
    }
}

impl fmt::Debug for BackendCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendCredential")
            .field("kind", &self.kind)
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Full driver configuration.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub credential: BackendCredential,
    /// Timeout applied to RPC calls. `None` leaves calls unbounded.
    pub http_timeout: Option<Duration>,
    /// How long a new event stream must stay open before it is trusted.
    pub confirm_window: Duration,
    /// Retry policy for establishing the event stream.
    pub reconnect: ReconnectConfig,
}

impl DriverConfig {
    /// Create a configuration with default timings.
    pub fn new(credential: BackendCredential) -> Self {
        Self {
            credential,
            http_timeout: None,
            confirm_window: DEFAULT_CONFIRM_WINDOW,
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Reads the credential (see [`BackendCredential::from_env`]) plus:
    /// - `SPARK_HTTP_TIMEOUT_SECS` - RPC timeout in seconds (default: none)
    /// - `SPARK_CONFIRM_WINDOW_MS` - Stream confirmation window (default: 2000)
    /// - `SPARK_MAX_RETRIES` - Stream connect retries (default: 10)
    pub fn from_env() -> Result<Self, DriverError> {
        let mut config = Self::new(BackendCredential::from_env()?);

        config.http_timeout = env::var("SPARK_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs);

        if let Some(ms) = env::var("SPARK_CONFIRM_WINDOW_MS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.confirm_window = Duration::from_millis(ms);
        }

        if let Some(retries) = env::var("SPARK_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.reconnect.max_retries = Some(retries);
        }

        Ok(config)
    }

    /// Set the RPC timeout.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Set the stream confirmation window.
    pub fn with_confirm_window(mut self, window: Duration) -> Self {
        self.confirm_window = window;
        self
    }

    /// Set the stream reconnect policy.
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}

fn required_var(name: &str) -> Result<String, DriverError> {
    env::var(name).map_err(|_| DriverError::Config(format!("{} not set", name)))
}

/// Add a scheme if missing and strip trailing slashes.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}
