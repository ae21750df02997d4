//! Single post view.

use crate::api_client::AuthorizedApi;
use crate::app::AppContext;
use crate::cache::{keys, ErrorInfo, QueryCache, QueryOptions, QueryStatus};
use crate::error::ClientError;
use crate::mutation::MutationExecutor;
use crate::session::SessionStore;
use narrify_core::{Post, PostId};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct DetailView {
    pub id: PostId,
    pub status: QueryStatus,
    pub post: Option<Arc<Post>>,
    /// The viewer wrote this post and may edit or delete it.
    pub can_modify: bool,
    pub error: Option<ErrorInfo>,
}

pub struct PostDetail {
    id: PostId,
    cache: QueryCache,
    api: AuthorizedApi,
    session: Arc<SessionStore>,
    mutations: MutationExecutor,
}

impl PostDetail {
    pub fn new(ctx: &AppContext, id: PostId) -> Self {
        Self {
            id,
            cache: ctx.cache.clone(),
            api: ctx.api.clone(),
            session: Arc::clone(&ctx.session),
            mutations: ctx.mutations.clone(),
        }
    }

    pub fn id(&self) -> PostId {
        self.id
    }

    pub fn view(&self) -> Result<DetailView, ClientError> {
        let api = self.api.clone();
        let id = self.id;
        let entry = self.cache.get_or_fetch(
            keys::post(id),
            move || {
                let api = api.clone();
                async move { api.get_post(id).await }
            },
            QueryOptions::new(),
        )?;

        let can_modify = match (entry.data(), self.session.identity()) {
            (Some(post), Some(viewer)) => post.is_authored_by(&viewer),
            _ => false,
        };
        Ok(DetailView {
            id,
            status: entry.status,
            post: entry.data.clone(),
            can_modify,
            error: entry.error.clone(),
        })
    }

    pub async fn settled_view(&self) -> Result<DetailView, ClientError> {
        self.view()?;
        self.cache.settled::<Post>(&keys::post(self.id)).await?;
        self.view()
    }

    pub async fn delete(&self) -> Result<(), ClientError> {
        self.mutations.delete(self.id).await
    }
}
