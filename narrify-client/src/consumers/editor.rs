//! New-post and edit-post forms.

use crate::api_client::AuthorizedApi;
use crate::app::AppContext;
use crate::cache::{keys, QueryCache, QueryOptions, QueryStatus};
use crate::error::{ClientError, ErrorKind};
use crate::mutation::MutationExecutor;
use crate::session::SessionStore;
use narrify_core::{Post, PostId, PostInput};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorForm {
    /// `None` for a new post.
    pub target: Option<PostId>,
    pub title: String,
    pub content: String,
}

impl EditorForm {
    pub fn input(&self) -> PostInput {
        PostInput::new(self.title.trim(), self.content.trim())
    }
}

/// Outcome of opening an existing post for editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAccess {
    Editable(EditorForm),
    NotFound,
    /// The post exists but belongs to someone else.
    Forbidden,
    LoginRequired,
}

pub struct PostEditor {
    cache: QueryCache,
    api: AuthorizedApi,
    session: Arc<SessionStore>,
    mutations: MutationExecutor,
}

impl PostEditor {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            cache: ctx.cache.clone(),
            api: ctx.api.clone(),
            session: Arc::clone(&ctx.session),
            mutations: ctx.mutations.clone(),
        }
    }

    pub fn open_new(&self) -> Result<EditorForm, ClientError> {
        if !self.session.is_authenticated() {
            return Err(ClientError::LoginRequired);
        }
        Ok(EditorForm::default())
    }

    /// Decide from the post itself whether the viewer may edit it.
    pub async fn open_existing(&self, id: PostId) -> Result<EditorAccess, ClientError> {
        let Some(viewer) = self.session.identity() else {
            return Ok(EditorAccess::LoginRequired);
        };

        let api = self.api.clone();
        let key = keys::post(id);
        self.cache.get_or_fetch(
            key.clone(),
            move || {
                let api = api.clone();
                async move { api.get_post(id).await }
            },
            QueryOptions::new(),
        )?;
        let entry = self.cache.settled::<Post>(&key).await?;

        match (entry.status, entry.data()) {
            (QueryStatus::Success, Some(post)) if post.is_authored_by(&viewer) => {
                Ok(EditorAccess::Editable(EditorForm {
                    target: Some(post.id),
                    title: post.title.clone(),
                    content: post.content.clone(),
                }))
            }
            (QueryStatus::Success, Some(_)) => Ok(EditorAccess::Forbidden),
            _ => match entry.error.clone() {
                Some(info) if info.kind == ErrorKind::NotFound => Ok(EditorAccess::NotFound),
                Some(info) if info.kind == ErrorKind::Forbidden => Ok(EditorAccess::Forbidden),
                Some(info) if info.kind == ErrorKind::Unauthorized => Ok(EditorAccess::LoginRequired),
                Some(info) => Err(ClientError::Fetch(info)),
                None => Ok(EditorAccess::NotFound),
            },
        }
    }

    /// Validate required fields, then create or update.
    pub async fn submit(&self, form: &EditorForm) -> Result<Post, ClientError> {
        let input = form.input();
        input.validate()?;
        match form.target {
            Some(id) => self.mutations.update(id, input).await,
            None => self.mutations.create(input).await,
        }
    }
}
