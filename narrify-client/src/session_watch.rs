//! Cross-process session watcher.
//!
//! Another process sharing the session file can log in or out at any time.
//! The watcher polls the medium's fingerprint and reloads the store when it
//! moves, which surfaces the change as an external auth signal.

use crate::persistence::Fingerprint;
use crate::session::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

pub fn spawn_session_watcher(store: Arc<SessionStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = read_fingerprint(&store);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let current = read_fingerprint(&store);
            if current == last {
                continue;
            }
            debug!(?last, ?current, "Session medium changed");
            last = current;
            if let Err(err) = store.reload() {
                warn!(error = %err, "Failed to reload session after external change");
            }
        }
    })
}

fn read_fingerprint(store: &SessionStore) -> Option<Fingerprint> {
    match store.fingerprint() {
        Ok(fingerprint) => Some(fingerprint),
        Err(err) => {
            warn!(error = %err, "Failed to fingerprint session medium");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth_bus::{AuthChanged, AuthEventBus};
    use crate::persistence::{MemoryMedium, TOKEN_KEY, USERNAME_KEY};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn external_write_reloads_and_signals() {
        let medium = Arc::new(MemoryMedium::new());
        let bus = AuthEventBus::default();
        let mut signals = bus.receiver();
        let store = Arc::new(SessionStore::open(medium.clone(), bus));
        let watcher = spawn_session_watcher(Arc::clone(&store), Duration::from_millis(100));
        tokio::task::yield_now().await;

        medium.write_external(TOKEN_KEY, Some("tok"));
        medium.write_external(USERNAME_KEY, Some("amy"));
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(store.identity().as_deref(), Some("amy"));
        assert_eq!(signals.try_recv().unwrap(), AuthChanged);
        assert!(signals.try_recv().is_err());
        watcher.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn own_writes_are_not_signalled_twice() {
        let medium = Arc::new(MemoryMedium::new());
        let bus = AuthEventBus::default();
        let count = Arc::new(AtomicUsize::new(0));
        let _sub = {
            let count = Arc::clone(&count);
            bus.subscribe(move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        let store = Arc::new(SessionStore::open(medium, bus));
        let watcher = spawn_session_watcher(Arc::clone(&store), Duration::from_millis(100));
        tokio::task::yield_now().await;

        store.set("tok", "amy").unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        watcher.abort();
    }
}
