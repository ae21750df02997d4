//! Process-wide "session may have changed" signal.
//!
//! The signal carries no session data; every listener re-reads
//! [`SessionStore::get`] itself. Listeners registered with
//! [`AuthEventBus::subscribe`] run synchronously inside [`AuthEventBus::notify`],
//! so none of them can miss a signal fired in the same turn. Async loops can
//! instead take a broadcast [`AuthEventBus::receiver`].
//!
//! [`SessionStore::get`]: crate::session::SessionStore::get

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::broadcast;
use tracing::debug;

/// The single auth signal. Deliberately empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthChanged;

/// Where a signal came from. Logged, never delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOrigin {
    /// This process wrote the session.
    Local,
    /// Another process changed the shared medium.
    External,
}

impl fmt::Display for SignalOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalOrigin::Local => write!(f, "local"),
            SignalOrigin::External => write!(f, "external"),
        }
    }
}

type Listener = Arc<dyn Fn() + Send + Sync>;

struct BusInner {
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
    tx: broadcast::Sender<AuthChanged>,
}

/// Cloneable handle to the shared bus.
#[derive(Clone)]
pub struct AuthEventBus {
    inner: Arc<BusInner>,
}

impl AuthEventBus {
    /// Create a bus whose broadcast receivers buffer up to `capacity` signals.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(BusInner {
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                tx,
            }),
        }
    }

    /// Register a synchronous listener. It stays registered until the
    /// returned [`Subscription`] is dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock_listeners().push((id, Arc::new(listener)));
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Broadcast receiver for async consumers. Lagging receivers only lose
    /// duplicate "re-read" hints.
    pub fn receiver(&self) -> broadcast::Receiver<AuthChanged> {
        self.inner.tx.subscribe()
    }

    /// Fire the signal. Every listener registered at call time has run when
    /// this returns.
    pub fn notify(&self, origin: SignalOrigin) {
        // Snapshot so listeners may subscribe, unsubscribe or re-enter the
        // session store while being notified.
        let listeners: Vec<Listener> = self
            .lock_listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        debug!(
            origin = %origin,
            listeners = listeners.len(),
            "Auth signal"
        );

        for listener in listeners {
            listener();
        }
        // No receivers is fine.
        let _ = self.inner.tx.send(AuthChanged);
    }

    pub fn listener_count(&self) -> usize {
        self.lock_listeners().len()
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Listener)>> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AuthEventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl fmt::Debug for AuthEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthEventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Keeps a listener registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
