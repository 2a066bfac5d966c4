//! Requests waiting for their window response.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::debug;
use webln_core::{CorrelationId, WindowResponse};

/// Correlation map from request id to its waiting caller.
#[derive(Debug, Default)]
pub struct PendingRequests {
    waiting: Mutex<HashMap<CorrelationId, oneshot::Sender<WindowResponse>>>,
}

impl PendingRequests {
    fn lock(&self) -> MutexGuard<'_, HashMap<CorrelationId, oneshot::Sender<WindowResponse>>> {
        self.waiting.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `id`. The entry is dropped again with the returned ticket.
    pub fn register(self: &Arc<Self>, id: CorrelationId) -> Ticket {
        let (tx, rx) = oneshot::channel();
        self.lock().insert(id.clone(), tx);
        Ticket {
            id,
            rx: Some(rx),
            pending: self.clone(),
        }
    }

    /// Hand `response` to the caller waiting for its id.
    ///
    /// Returns false when nobody is waiting, e.g. for another provider's
    /// response.
    pub fn resolve(&self, response: WindowResponse) -> bool {
        let Some(tx) = self.lock().remove(&response.id) else {
            return false;
        };
        let id = response.id.clone();
        if tx.send(response).is_err() {
            debug!("Caller for {} went away", id);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A registered request. Dropping it forgets the id.
#[derive(Debug)]
pub struct Ticket {
    id: CorrelationId,
    rx: Option<oneshot::Receiver<WindowResponse>>,
    pending: Arc<PendingRequests>,
}

impl Ticket {
    pub fn id(&self) -> &CorrelationId {
        &self.id
    }

    /// Wait for the response. `None` if the listener shut down first.
    pub async fn response(mut self) -> Option<WindowResponse> {
        let rx = self.rx.take()?;
        rx.await.ok()
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}
