//! Home feed: public posts filtered by debounced search text.

use super::{PostRow, FEED_EXCERPT_CHARS};
use crate::api_client::AuthorizedApi;
use crate::app::AppContext;
use crate::cache::{keys, CacheKey, ErrorInfo, QueryCache, QueryOptions, QueryStatus};
use crate::debounce::DebouncedKeyController;
use crate::error::ClientError;
use crate::session::SessionStore;
use narrify_core::Post;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct FeedView {
    pub search: String,
    pub status: QueryStatus,
    /// Posts matching the search, before paging.
    pub total: usize,
    pub rows: Vec<PostRow>,
    pub has_more: bool,
    /// Rows belong to the previous search while the new one loads.
    pub is_placeholder: bool,
    pub error: Option<ErrorInfo>,
}

pub struct HomeFeed {
    cache: QueryCache,
    api: AuthorizedApi,
    session: Arc<SessionStore>,
    search: DebouncedKeyController,
    page_size: usize,
    visible: AtomicUsize,
    stale_after: Option<Duration>,
}

impl HomeFeed {
    pub fn new(ctx: &AppContext) -> Self {
        let page_size = ctx.settings.feed_page_size.max(1);
        Self {
            cache: ctx.cache.clone(),
            api: ctx.api.clone(),
            session: Arc::clone(&ctx.session),
            search: DebouncedKeyController::new(ctx.settings.search_debounce),
            page_size,
            visible: AtomicUsize::new(page_size),
            stale_after: ctx.settings.stale_after,
        }
    }

    /// Record a keystroke. The cache key moves only once typing pauses.
    pub fn set_search(&self, raw: impl Into<String>) {
        self.search.set_raw(raw);
    }

    pub fn search(&self) -> &DebouncedKeyController {
        &self.search
    }

    pub fn key(&self) -> CacheKey {
        keys::posts(&self.search.committed())
    }

    /// Reveal another page.
    pub fn load_more(&self) {
        self.visible.fetch_add(self.page_size, Ordering::SeqCst);
    }

    /// Read the current key, fetching if needed.
    pub fn view(&self) -> Result<FeedView, ClientError> {
        let search = self.search.committed();
        let api = self.api.clone();
        let query = search.clone();
        let entry = self.cache.get_or_fetch(
            keys::posts(&search),
            move || {
                let api = api.clone();
                let query = query.clone();
                async move { api.list_posts(&query).await }
            },
            QueryOptions::new()
                .keep_previous_data(true)
                .stale_after(self.stale_after),
        )?;

        let viewer = self.session.identity();
        let posts: &[Post] = entry.data().map(Vec::as_slice).unwrap_or_default();
        let visible = self.visible.load(Ordering::SeqCst);
        Ok(FeedView {
            search,
            status: entry.status,
            total: posts.len(),
            rows: posts
                .iter()
                .take(visible)
                .map(|post| PostRow::new(post, viewer.as_deref(), FEED_EXCERPT_CHARS))
                .collect(),
            has_more: posts.len() > visible,
            is_placeholder: entry.is_placeholder,
            error: entry.error.clone(),
        })
    }

    /// Wait for the current key to finish loading, then view it.
    pub async fn settled_view(&self) -> Result<FeedView, ClientError> {
        self.view()?;
        self.cache.settled::<Vec<Post>>(&self.key()).await?;
        self.view()
    }

    /// Read the new key every time the search commits. Stops when the feed
    /// is dropped.
    pub fn follow(self: &Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.search.committed_changes();
        let feed: Weak<HomeFeed> = Arc::downgrade(self);
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let Some(feed) = feed.upgrade() else { break };
                if let Err(err) = feed.view() {
                    warn!(error = %err, "Feed refresh failed");
                }
            }
        })
    }
}
