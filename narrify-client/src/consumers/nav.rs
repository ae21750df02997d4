//! Navigation indicator.

use crate::auth_bus::Subscription;
use crate::session::SessionStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavLink {
    Home,
    MyPosts,
    Logout(String),
    Login,
    Register,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavState {
    pub identity: Option<String>,
    pub links: Vec<NavLink>,
}

impl NavState {
    fn for_identity(identity: Option<String>) -> Self {
        let mut links = vec![NavLink::Home];
        match &identity {
            Some(who) => {
                links.push(NavLink::MyPosts);
                links.push(NavLink::Logout(who.clone()));
            }
            None => {
                links.push(NavLink::Login);
                links.push(NavLink::Register);
            }
        }
        Self { identity, links }
    }
}

/// Keeps a [`NavState`] in step with the session.
pub struct NavIndicator {
    state: Arc<RwLock<NavState>>,
    refreshes: Arc<AtomicU64>,
    _subscription: Subscription,
}

impl NavIndicator {
    pub fn attach(session: &Arc<SessionStore>) -> Self {
        let state = Arc::new(RwLock::new(NavState::for_identity(session.identity())));
        let refreshes = Arc::new(AtomicU64::new(0));

        let subscription = {
            let state = Arc::clone(&state);
            let refreshes = Arc::clone(&refreshes);
            session_listener(session, move |store| {
                let next = NavState::for_identity(store.identity());
                *state.write().unwrap_or_else(PoisonError::into_inner) = next;
                refreshes.fetch_add(1, Ordering::SeqCst);
            })
        };

        Self {
            state,
            refreshes,
            _subscription: subscription,
        }
    }

    pub fn state(&self) -> NavState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many auth signals this indicator has handled.
    pub fn refreshes(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }
}

/// Subscribe `on_signal` to the store's bus. The listener holds the store
/// weakly since the store owns the bus that owns the listener.
pub(crate) fn session_listener<F>(session: &Arc<SessionStore>, on_signal: F) -> Subscription
where
    F: Fn(&SessionStore) + Send + Sync + 'static,
{
    let weak: Weak<SessionStore> = Arc::downgrade(session);
    session.bus().subscribe(move || {
        if let Some(store) = weak.upgrade() {
            on_signal(&store);
        }
    })
}
