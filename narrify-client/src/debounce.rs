//! Debounced free-text input feeding a cache key.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Snapshot of a controller's input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebouncedInput {
    pub raw: String,
    pub committed: String,
    /// When the pending raw value was entered; `None` once committed.
    pub pending_since: Option<Instant>,
}

#[derive(Default)]
struct Pending {
    raw: String,
    pending_since: Option<Instant>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

/// Turns keystrokes into a committed value that only moves after the input
/// has been quiet for the configured period.
///
/// Each [`set_raw`](Self::set_raw) cancels the pending commit and restarts
/// the timer, so only the last timer of a burst can ever fire. Must be used
/// from within a Tokio runtime.
pub struct DebouncedKeyController {
    quiet: Duration,
    pending: Arc<Mutex<Pending>>,
    committed: watch::Sender<String>,
}

impl DebouncedKeyController {
    pub fn new(quiet: Duration) -> Self {
        let (committed, _rx) = watch::channel(String::new());
        Self {
            quiet,
            pending: Arc::new(Mutex::new(Pending::default())),
            committed,
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    pub fn set_raw(&self, value: impl Into<String>) {
        let mut pending = lock(&self.pending);
        pending.raw = value.into();
        pending.pending_since = Some(Instant::now());
        pending.generation += 1;
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }

        let generation = pending.generation;
        let deadline = Instant::now() + self.quiet;
        let shared = Arc::clone(&self.pending);
        let committed = self.committed.clone();
        pending.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let mut pending = lock(&shared);
            // A newer keystroke got the lock first.
            if pending.generation != generation {
                return;
            }
            pending.pending_since = None;
            pending.timer = None;
            let value = pending.raw.trim().to_string();
            drop(pending);
            let changed = committed.send_if_modified(|current| {
                if *current == value {
                    false
                } else {
                    *current = value.clone();
                    true
                }
            });
            if changed {
                debug!(committed = %value, "Search committed");
            }
        }));
    }

    pub fn raw(&self) -> String {
        lock(&self.pending).raw.clone()
    }

    pub fn committed(&self) -> String {
        self.committed.borrow().clone()
    }

    pub fn committed_changes(&self) -> watch::Receiver<String> {
        self.committed.subscribe()
    }

    pub fn snapshot(&self) -> DebouncedInput {
        let pending = lock(&self.pending);
        DebouncedInput {
            raw: pending.raw.clone(),
            committed: self.committed(),
            pending_since: pending.pending_since,
        }
    }
}

impl Drop for DebouncedKeyController {
    fn drop(&mut self) {
        if let Some(timer) = lock(&self.pending).timer.take() {
            timer.abort();
        }
    }
}

fn lock(pending: &Mutex<Pending>) -> MutexGuard<'_, Pending> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}
