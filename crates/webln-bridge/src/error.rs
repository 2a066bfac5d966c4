//! Errors surfaced by the command line host.

use thiserror::Error;

use spark_driver::DriverError;
use webln_controller::StoreError;
use webln_core::WeblnError;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("backend: {0}")]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Webln(#[from] WeblnError),

    #[error("authorization store: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
