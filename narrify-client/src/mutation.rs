//! Remote writes followed by cache invalidation.

use crate::api_client::AuthorizedApi;
use crate::cache::{keys, KeyFilter, QueryCache};
use crate::error::ClientError;
use narrify_core::{Post, PostId, PostInput};
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationVerb {
    Create,
    Update,
    Delete,
}

impl fmt::Display for MutationVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationVerb::Create => write!(f, "create"),
            MutationVerb::Update => write!(f, "update"),
            MutationVerb::Delete => write!(f, "delete"),
        }
    }
}

/// One write and the cache keys it can make inaccurate. Lives for the
/// duration of one [`MutationExecutor::execute`].
#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub verb: MutationVerb,
    pub target: Option<PostId>,
    pub payload: Option<PostInput>,
    pub affected_cache_keys: Vec<KeyFilter>,
}

impl MutationRecord {
    pub fn create(input: PostInput) -> Self {
        Self {
            verb: MutationVerb::Create,
            target: None,
            payload: Some(input),
            affected_cache_keys: list_keys(),
        }
    }

    pub fn update(id: PostId, input: PostInput) -> Self {
        let mut affected = list_keys();
        affected.push(KeyFilter::exact(keys::post(id)));
        Self {
            verb: MutationVerb::Update,
            target: Some(id),
            payload: Some(input),
            affected_cache_keys: affected,
        }
    }

    pub fn delete(id: PostId) -> Self {
        let mut affected = list_keys();
        affected.push(KeyFilter::exact(keys::post(id)));
        Self {
            verb: MutationVerb::Delete,
            target: Some(id),
            payload: None,
            affected_cache_keys: affected,
        }
    }
}

/// Every list that could contain the mutated post.
fn list_keys() -> Vec<KeyFilter> {
    vec![
        KeyFilter::prefix(keys::posts_root()),
        KeyFilter::exact(keys::my_posts()),
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    Created(Post),
    Updated(Post),
    Deleted(PostId),
}

impl MutationOutcome {
    pub fn post_id(&self) -> PostId {
        match self {
            MutationOutcome::Created(post) | MutationOutcome::Updated(post) => post.id,
            MutationOutcome::Deleted(id) => *id,
        }
    }
}

/// Performs one remote write per call and, on success, invalidates the keys
/// the write affects.
///
/// Never retries. A rejected credential has already cleared the session by
/// the time the error comes back from [`AuthorizedApi`].
#[derive(Clone)]
pub struct MutationExecutor {
    api: AuthorizedApi,
    cache: QueryCache,
}

impl MutationExecutor {
    pub fn new(api: AuthorizedApi, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    pub async fn execute(&self, record: MutationRecord) -> Result<MutationOutcome, ClientError> {
        if !self.api.session().is_authenticated() {
            return Err(ClientError::LoginRequired);
        }
        if let Some(payload) = &record.payload {
            payload.validate()?;
        }

        let outcome = match (record.verb, record.target, &record.payload) {
            (MutationVerb::Create, _, Some(input)) => {
                MutationOutcome::Created(self.api.create_post(input).await?)
            }
            (MutationVerb::Update, Some(id), Some(input)) => {
                MutationOutcome::Updated(self.api.update_post(id, input).await?)
            }
            (MutationVerb::Delete, Some(id), _) => {
                self.api.delete_post(id).await?;
                MutationOutcome::Deleted(id)
            }
            (verb, target, _) => {
                return Err(ClientError::MalformedMutation(format!(
                    "{} with target {:?} is missing its target or payload",
                    verb, target
                )))
            }
        };

        let mut invalidated = 0;
        for filter in &record.affected_cache_keys {
            invalidated += self.cache.invalidate(filter);
        }
        info!(verb = %record.verb, post = %outcome.post_id(), "Mutation applied");
        debug!(invalidated, "Invalidated affected cache entries");
        Ok(outcome)
    }

    pub async fn create(&self, input: PostInput) -> Result<Post, ClientError> {
        match self.execute(MutationRecord::create(input)).await? {
            MutationOutcome::Created(post) => Ok(post),
            other => Err(unexpected(other)),
        }
    }

    pub async fn update(&self, id: PostId, input: PostInput) -> Result<Post, ClientError> {
        match self.execute(MutationRecord::update(id, input)).await? {
            MutationOutcome::Updated(post) => Ok(post),
            other => Err(unexpected(other)),
        }
    }

    pub async fn delete(&self, id: PostId) -> Result<(), ClientError> {
        self.execute(MutationRecord::delete(id)).await.map(|_| ())
    }
}

fn unexpected(outcome: MutationOutcome) -> ClientError {
    ClientError::MalformedMutation(format!("unexpected outcome {:?}", outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_record_covers_lists_and_detail() {
        let record = MutationRecord::delete(PostId(3));
        let matched = |key| {
            record
                .affected_cache_keys
                .iter()
                .any(|filter| filter.matches(&key))
        };
        assert!(matched(keys::my_posts()));
        assert!(matched(keys::post(PostId(3))));
        assert!(matched(keys::posts("")));
        assert!(matched(keys::posts("cats")));
        assert!(!matched(keys::post(PostId(4))));
    }

    #[test]
    fn create_record_has_no_detail_key() {
        let record = MutationRecord::create(PostInput::new("t", "c"));
        assert_eq!(record.affected_cache_keys.len(), 2);
        assert!(record.target.is_none());
    }
}
