//! Single-prompt admission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::WeblnError;

/// Admits at most one prompt at a time. Later prompts are rejected, not
/// queued.
#[derive(Debug, Clone, Default)]
pub struct PromptGate {
    active: Arc<AtomicBool>,
}

/// Held while a prompt is in flight; dropping it reopens the gate.
#[derive(Debug)]
pub struct PromptGuard {
    active: Arc<AtomicBool>,
}

impl PromptGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Result<PromptGuard, WeblnError> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| WeblnError::PromptBusy)?;
        Ok(PromptGuard {
            active: self.active.clone(),
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for PromptGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}
