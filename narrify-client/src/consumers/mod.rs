//! Headless view-models for each surface.
//!
//! Consumers never talk to each other. Each one re-reads the session on
//! auth signals and reads its own cache keys; shared data flows only
//! through those keys.

pub mod dashboard;
pub mod detail;
pub mod editor;
pub mod feed;
pub mod nav;

pub use dashboard::{Dashboard, DashboardView};
pub use detail::{DetailView, PostDetail};
pub use editor::{EditorAccess, EditorForm, PostEditor};
pub use feed::{FeedView, HomeFeed};
pub use nav::{NavIndicator, NavLink, NavState};

use narrify_core::{Post, PostId, Timestamp};

/// Excerpt length on the home feed.
pub const FEED_EXCERPT_CHARS: usize = 300;
/// Excerpt length on the dashboard.
pub const DASHBOARD_EXCERPT_CHARS: usize = 250;

/// One post as a list shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRow {
    pub id: PostId,
    pub title: String,
    pub author: Option<String>,
    pub created_at: Timestamp,
    pub excerpt: String,
    /// The viewer wrote this post.
    pub can_edit: bool,
}

impl PostRow {
    pub fn new(post: &Post, viewer: Option<&str>, excerpt_chars: usize) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            author: post.author_username.clone(),
            created_at: post.created_at,
            excerpt: post.excerpt(excerpt_chars),
            can_edit: viewer.is_some_and(|who| post.is_authored_by(who)),
        }
    }
}
