//! The logged-in identity's own posts.

use super::nav::session_listener;
use super::{PostRow, DASHBOARD_EXCERPT_CHARS};
use crate::api_client::AuthorizedApi;
use crate::app::AppContext;
use crate::auth_bus::Subscription;
use crate::cache::{keys, ErrorInfo, KeyFilter, QueryCache, QueryOptions, QueryStatus};
use crate::error::ClientError;
use crate::mutation::MutationExecutor;
use crate::session::SessionStore;
use narrify_core::{Post, PostId};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DashboardView {
    pub logged_in: bool,
    pub status: QueryStatus,
    pub rows: Vec<PostRow>,
    pub error: Option<ErrorInfo>,
}

pub struct Dashboard {
    cache: QueryCache,
    api: AuthorizedApi,
    session: Arc<SessionStore>,
    mutations: MutationExecutor,
    _subscription: Subscription,
}

impl Dashboard {
    /// Attach to the session: refetch `["my-posts"]` on login, drop every
    /// identity-scoped entry on logout or when the identity changes.
    pub fn attach(ctx: &AppContext) -> Self {
        let cache = ctx.cache.clone();
        let last_seen = Mutex::new(ctx.session.identity());
        let subscription = session_listener(&ctx.session, move |store| {
            let identity = store.identity();
            let previous = std::mem::replace(
                &mut *last_seen.lock().unwrap_or_else(PoisonError::into_inner),
                identity.clone(),
            );
            on_auth_changed(&cache, previous, identity);
        });
        Self {
            cache: ctx.cache.clone(),
            api: ctx.api.clone(),
            session: Arc::clone(&ctx.session),
            mutations: ctx.mutations.clone(),
            _subscription: subscription,
        }
    }

    /// Read `["my-posts"]`, enabled only while a credential is present.
    pub fn view(&self) -> Result<DashboardView, ClientError> {
        let api = self.api.clone();
        let logged_in = self.session.is_authenticated();
        let entry = self.cache.get_or_fetch(
            keys::my_posts(),
            move || {
                let api = api.clone();
                async move { api.my_posts().await }
            },
            QueryOptions::new().enabled(logged_in),
        )?;

        let viewer = self.session.identity();
        Ok(DashboardView {
            logged_in,
            status: entry.status,
            rows: entry
                .data()
                .map(|posts: &Vec<Post>| {
                    posts
                        .iter()
                        .map(|post| PostRow::new(post, viewer.as_deref(), DASHBOARD_EXCERPT_CHARS))
                        .collect()
                })
                .unwrap_or_default(),
            error: entry.error.clone(),
        })
    }

    pub async fn settled_view(&self) -> Result<DashboardView, ClientError> {
        let view = self.view()?;
        if view.status == QueryStatus::Loading {
            self.cache.settled::<Vec<Post>>(&keys::my_posts()).await?;
            return self.view();
        }
        Ok(view)
    }

    pub async fn delete(&self, id: PostId) -> Result<(), ClientError> {
        self.mutations.delete(id).await
    }
}

fn on_auth_changed(cache: &QueryCache, previous: Option<String>, identity: Option<String>) {
    let key = keys::my_posts();
    match (previous, identity) {
        (Some(previous), Some(identity)) if previous != identity => {
            // Another identity's data must not be shown, even while loading.
            let removed = cache.remove(&KeyFilter::matching(keys::is_identity_scoped));
            debug!(removed, from = %previous, to = %identity, "Identity changed");
        }
        (_, Some(_)) => {
            // An entry created while logged out is disabled; enabling fetches it.
            match cache.peek::<Vec<Post>>(&key) {
                Ok(Some(entry)) if !entry.enabled => {
                    cache.set_enabled(&key, true);
                }
                _ => {
                    cache.invalidate(&KeyFilter::exact(key));
                }
            }
        }
        (_, None) => {
            let removed = cache.remove(&KeyFilter::matching(keys::is_identity_scoped));
            debug!(removed, "Dropped identity-scoped entries");
        }
    }
}
