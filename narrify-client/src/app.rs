//! Service graph shared by every consumer.

use crate::api_client::{AuthorizedApi, PostsApi};
use crate::auth_bus::AuthEventBus;
use crate::auth_flow::AuthFlow;
use crate::cache::QueryCache;
use crate::config::ClientConfig;
use crate::mutation::MutationExecutor;
use crate::persistence::SessionMedium;
use crate::session::SessionStore;
use std::sync::Arc;
use std::time::Duration;

/// Tunables the consumers read. Taken from [`ClientConfig`] in the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerSettings {
    pub search_debounce: Duration,
    pub feed_page_size: usize,
    pub stale_after: Option<Duration>,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            search_debounce: Duration::from_millis(350),
            feed_page_size: 5,
            stale_after: None,
        }
    }
}

impl From<&ClientConfig> for ConsumerSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            search_debounce: config.search_debounce(),
            feed_page_size: config.feed_page_size,
            stale_after: config.stale_after(),
        }
    }
}

/// One owner per service; consumers hold clones of the handles.
#[derive(Clone)]
pub struct AppContext {
    pub session: Arc<SessionStore>,
    pub api: AuthorizedApi,
    pub cache: QueryCache,
    pub mutations: MutationExecutor,
    pub auth: AuthFlow,
    pub settings: ConsumerSettings,
}

impl AppContext {
    pub fn new(
        api: Arc<dyn PostsApi>,
        medium: Arc<dyn SessionMedium>,
        settings: ConsumerSettings,
    ) -> Self {
        let session = Arc::new(SessionStore::open(medium, AuthEventBus::default()));
        let api = AuthorizedApi::new(api, Arc::clone(&session));
        let cache = QueryCache::new();
        Self {
            mutations: MutationExecutor::new(api.clone(), cache.clone()),
            auth: AuthFlow::new(api.clone()),
            session,
            api,
            cache,
            settings,
        }
    }

    pub fn bus(&self) -> &AuthEventBus {
        self.session.bus()
    }
}
