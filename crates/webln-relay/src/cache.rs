//! Cached blocked status for the relay's page.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct State {
    entry: Option<(bool, Instant)>,
    /// Bumped on every invalidation.
    epoch: u64,
}

/// A single boolean that expires after `ttl` or when invalidated.
///
/// Answers fetched across an invalidation are discarded: [`lookup`] hands
/// out the current epoch on a miss and [`set`] only stores under that same
/// epoch.
///
/// [`lookup`]: BlockedCache::lookup
/// [`set`]: BlockedCache::set
#[derive(Debug)]
pub struct BlockedCache {
    ttl: Duration,
    state: Mutex<State>,
}

impl BlockedCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(State::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached value, if still fresh.
    pub async fn get(&self) -> Option<bool> {
        self.lookup().await.ok()
    }

    /// The cached value, or the epoch to pass to [`BlockedCache::set`].
    pub async fn lookup(&self) -> Result<bool, u64> {
        let mut state = self.state.lock().await;
        match state.entry {
            Some((blocked, stored_at)) if stored_at.elapsed() < self.ttl => Ok(blocked),
            Some(_) => {
                state.entry = None;
                Err(state.epoch)
            }
            None => Err(state.epoch),
        }
    }

    /// Store `blocked` unless the cache was invalidated since `epoch`.
    /// Returns whether the value was stored.
    pub async fn set(&self, blocked: bool, epoch: u64) -> bool {
        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            return false;
        }
        state.entry = Some((blocked, Instant::now()));
        true
    }

    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.entry = None;
        state.epoch += 1;
    }
}
