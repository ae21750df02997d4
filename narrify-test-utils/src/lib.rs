//! Narrify Test Utilities
//!
//! Shared test infrastructure for the Narrify workspace:
//! - [`FakePostsApi`], an in-memory publishing service with call recording,
//!   credential revocation, injected failures and response gates
//! - Proptest generators for the core types
//! - Fixtures for common scenarios

pub use narrify_client::api_client::{ApiClientError, PostsApi};
pub use narrify_core::{
    LoginRequest, Post, PostId, PostInput, RegisterRequest, Timestamp, TokenResponse,
    UserProfile,
};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;

// ============================================================================
// FAKE REMOTE API
// ============================================================================

/// One recorded request to [`FakePostsApi`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ApiCall {
    Login(String),
    Register(String),
    Me,
    ListPosts(String),
    MyPosts,
    GetPost(PostId),
    CreatePost,
    UpdatePost(PostId),
    DeletePost(PostId),
}

/// Holds back the response of one matching call until released or dropped.
#[derive(Debug)]
pub struct Gate {
    tx: oneshot::Sender<()>,
}

impl Gate {
    pub fn release(self) {
        let _ = self.tx.send(());
    }
}

#[derive(Debug, Clone)]
struct FakeUser {
    id: i64,
    password: String,
    email: String,
}

#[derive(Default)]
struct FakeState {
    users: BTreeMap<String, FakeUser>,
    tokens: HashMap<String, String>,
    posts: BTreeMap<PostId, (Post, String)>,
    next_user: i64,
    next_post: i64,
    next_token: u64,
    clock: i64,
}

impl FakeState {
    fn now(&mut self) -> Timestamp {
        self.clock += 1;
        epoch() + ChronoDuration::seconds(self.clock)
    }

    fn user_for(&self, token: Option<&str>) -> Result<String, ApiClientError> {
        token
            .and_then(|t| self.tokens.get(t))
            .cloned()
            .ok_or_else(|| ApiClientError::Unauthorized("Could not validate credentials".into()))
    }

    fn owned_post(&self, token: Option<&str>, id: PostId) -> Result<String, ApiClientError> {
        let user = self.user_for(token)?;
        let (_, author) = self
            .posts
            .get(&id)
            .ok_or_else(|| ApiClientError::NotFound("Post not found".into()))?;
        if *author != user {
            return Err(ApiClientError::Forbidden(
                "Not authorized to modify this post".into(),
            ));
        }
        Ok(user)
    }

    fn newest_first<'a>(&self, posts: impl Iterator<Item = &'a Post>) -> Vec<Post> {
        let mut posts: Vec<Post> = posts.cloned().collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts
    }
}

fn epoch() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// In-memory stand-in for the publishing service.
///
/// Behaves like the real server: search is a case-insensitive substring
/// match on title or content, lists are newest first, and writes require
/// the author's token.
#[derive(Default)]
pub struct FakePostsApi {
    state: Mutex<FakeState>,
    calls: Mutex<Vec<ApiCall>>,
    gates: Mutex<HashMap<ApiCall, VecDeque<oneshot::Receiver<()>>>>,
    failures: Mutex<VecDeque<ApiClientError>>,
}

impl FakePostsApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user who can log in with `password`.
    pub fn with_user(self, username: &str, password: &str) -> Self {
        self.add_user(username, password);
        self
    }

    pub fn add_user(&self, username: &str, password: &str) -> i64 {
        let mut state = lock(&self.state);
        state.next_user += 1;
        let id = state.next_user;
        state.users.insert(
            username.to_string(),
            FakeUser {
                id,
                password: password.to_string(),
                email: format!("{}@example.com", username),
            },
        );
        id
    }

    /// Insert a post directly, bypassing auth.
    pub fn add_post(&self, author: &str, title: &str, content: &str) -> PostId {
        let mut state = lock(&self.state);
        state.next_post += 1;
        let id = PostId(state.next_post);
        let created_at = state.now();
        state.posts.insert(
            id,
            (
                Post {
                    id,
                    title: title.to_string(),
                    content: content.to_string(),
                    author_username: Some(author.to_string()),
                    created_at,
                    updated_at: None,
                },
                author.to_string(),
            ),
        );
        id
    }

    pub fn has_post(&self, id: PostId) -> bool {
        lock(&self.state).posts.contains_key(&id)
    }

    /// Forget every issued token; later authenticated calls get 401.
    pub fn revoke_tokens(&self) {
        lock(&self.state).tokens.clear();
    }

    /// Issue a valid token for `username` without a login call.
    pub fn issue_token(&self, username: &str) -> String {
        let mut state = lock(&self.state);
        state.next_token += 1;
        let token = format!("token-{}-{}", username, state.next_token);
        state.tokens.insert(token.clone(), username.to_string());
        token
    }

    /// The next call, whatever it is, fails with `err`.
    pub fn fail_next(&self, err: ApiClientError) {
        lock(&self.failures).push_back(err);
    }

    /// Hold the response to the next `call` until the gate is released.
    ///
    /// The response is computed when the request arrives, so a held
    /// response reflects the state at request time.
    pub fn hold(&self, call: ApiCall) -> Gate {
        let (tx, rx) = oneshot::channel();
        lock(&self.gates).entry(call).or_default().push_back(rx);
        Gate { tx }
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, call: &ApiCall) -> usize {
        lock(&self.calls).iter().filter(|c| *c == call).count()
    }

    pub fn count_list_posts(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, ApiCall::ListPosts(_)))
            .count()
    }

    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }

    async fn respond<T>(
        &self,
        call: ApiCall,
        handler: impl FnOnce(&mut FakeState) -> Result<T, ApiClientError>,
    ) -> Result<T, ApiClientError> {
        lock(&self.calls).push(call.clone());
        let result = match lock(&self.failures).pop_front() {
            Some(err) => Err(err),
            None => handler(&mut lock(&self.state)),
        };
        let gate = lock(&self.gates).get_mut(&call).and_then(VecDeque::pop_front);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        result
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl PostsApi for FakePostsApi {
    async fn login(&self, req: &LoginRequest) -> Result<TokenResponse, ApiClientError> {
        self.respond(ApiCall::Login(req.username.clone()), |state| {
            let ok = state
                .users
                .get(&req.username)
                .is_some_and(|user| user.password == req.password);
            if !ok {
                return Err(ApiClientError::Unauthorized(
                    "Incorrect username or password".into(),
                ));
            }
            state.next_token += 1;
            let token = format!("token-{}-{}", req.username, state.next_token);
            state.tokens.insert(token.clone(), req.username.clone());
            Ok(TokenResponse {
                access_token: token,
                token_type: "bearer".into(),
            })
        })
        .await
    }

    async fn register(&self, req: &RegisterRequest) -> Result<UserProfile, ApiClientError> {
        self.respond(ApiCall::Register(req.username.clone()), |state| {
            if state.users.contains_key(&req.username) {
                return Err(ApiClientError::Rejected {
                    status: 400,
                    detail: "Username already registered".into(),
                });
            }
            if state.users.values().any(|u| u.email == req.email) {
                return Err(ApiClientError::Rejected {
                    status: 400,
                    detail: "Email already registered".into(),
                });
            }
            state.next_user += 1;
            let id = state.next_user;
            state.users.insert(
                req.username.clone(),
                FakeUser {
                    id,
                    password: req.password.clone(),
                    email: req.email.clone(),
                },
            );
            Ok(UserProfile {
                id,
                username: req.username.clone(),
                email: req.email.clone(),
                created_at: state.now(),
            })
        })
        .await
    }

    async fn me(&self, token: Option<&str>) -> Result<UserProfile, ApiClientError> {
        self.respond(ApiCall::Me, |state| {
            let username = state.user_for(token)?;
            let user = state
                .users
                .get(&username)
                .cloned()
                .ok_or_else(|| ApiClientError::Unauthorized("User not found".into()))?;
            Ok(UserProfile {
                id: user.id,
                username,
                email: user.email,
                created_at: epoch(),
            })
        })
        .await
    }

    async fn list_posts(&self, search: &str) -> Result<Vec<Post>, ApiClientError> {
        self.respond(ApiCall::ListPosts(search.to_string()), |state| {
            let needle = search.to_lowercase();
            Ok(state.newest_first(state.posts.values().map(|(p, _)| p).filter(|p| {
                needle.is_empty()
                    || p.title.to_lowercase().contains(&needle)
                    || p.content.to_lowercase().contains(&needle)
            })))
        })
        .await
    }

    async fn my_posts(&self, token: Option<&str>) -> Result<Vec<Post>, ApiClientError> {
        self.respond(ApiCall::MyPosts, |state| {
            let user = state.user_for(token)?;
            Ok(state.newest_first(
                state
                    .posts
                    .values()
                    .filter(|(_, author)| *author == user)
                    .map(|(p, _)| p),
            ))
        })
        .await
    }

    async fn get_post(&self, id: PostId) -> Result<Post, ApiClientError> {
        self.respond(ApiCall::GetPost(id), |state| {
            state
                .posts
                .get(&id)
                .map(|(p, _)| p.clone())
                .ok_or_else(|| ApiClientError::NotFound("Post not found".into()))
        })
        .await
    }

    async fn create_post(
        &self,
        token: Option<&str>,
        input: &PostInput,
    ) -> Result<Post, ApiClientError> {
        self.respond(ApiCall::CreatePost, |state| {
            let user = state.user_for(token)?;
            state.next_post += 1;
            let id = PostId(state.next_post);
            let post = Post {
                id,
                title: input.title.clone(),
                content: input.content.clone(),
                author_username: Some(user.clone()),
                created_at: state.now(),
                updated_at: None,
            };
            state.posts.insert(id, (post.clone(), user));
            Ok(post)
        })
        .await
    }

    async fn update_post(
        &self,
        token: Option<&str>,
        id: PostId,
        input: &PostInput,
    ) -> Result<Post, ApiClientError> {
        self.respond(ApiCall::UpdatePost(id), |state| {
            state.owned_post(token, id)?;
            let updated_at = state.now();
            let (post, _) = state
                .posts
                .get_mut(&id)
                .ok_or_else(|| ApiClientError::NotFound("Post not found".into()))?;
            post.title = input.title.clone();
            post.content = input.content.clone();
            post.updated_at = Some(updated_at);
            Ok(post.clone())
        })
        .await
    }

    async fn delete_post(&self, token: Option<&str>, id: PostId) -> Result<(), ApiClientError> {
        self.respond(ApiCall::DeletePost(id), |state| {
            state.owned_post(token, id)?;
            state.posts.remove(&id);
            Ok(())
        })
        .await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;

    pub fn arb_post_id() -> impl Strategy<Value = PostId> {
        (1i64..100_000).prop_map(PostId)
    }

    pub fn arb_username() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{2,11}"
    }

    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (0i64..10_000_000).prop_map(|secs| epoch() + ChronoDuration::seconds(secs))
    }

    pub fn arb_post_input() -> impl Strategy<Value = PostInput> {
        ("[A-Za-z][A-Za-z ]{0,40}", "[A-Za-z .,]{1,400}")
            .prop_map(|(title, content)| PostInput::new(title, content))
    }

    pub fn arb_post() -> impl Strategy<Value = Post> {
        (
            arb_post_id(),
            arb_post_input(),
            proptest::option::of(arb_username()),
            arb_timestamp(),
        )
            .prop_map(|(id, input, author_username, created_at)| Post {
                id,
                title: input.title,
                content: input.content,
                author_username,
                created_at,
                updated_at: None,
            })
    }

    /// Keystroke bursts: each entry is a raw value and the pause after it.
    pub fn arb_keystrokes(max_gap_ms: u64) -> impl Strategy<Value = Vec<(String, u64)>> {
        proptest::collection::vec(("[a-z ]{0,10}", 0..max_gap_ms), 1..16)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;

    pub const AMY: &str = "amy";
    pub const BOB: &str = "bob";
    pub const PASSWORD: &str = "x";

    /// Two users, each with posts, one mentioning cats.
    pub fn seeded_api() -> FakePostsApi {
        let api = FakePostsApi::new()
            .with_user(AMY, PASSWORD)
            .with_user(BOB, PASSWORD);
        api.add_post(AMY, "Cats of Lisbon", "Notes on the cats of Lisbon.");
        api.add_post(AMY, "Morning pages", "Three pages, every morning.");
        api.add_post(BOB, "Dog days", "A summer with dogs and one cat.");
        api
    }

    pub fn post_input() -> PostInput {
        PostInput::new("A new post", "With some content.")
    }

    pub fn long_post(author: &str, chars: usize) -> Post {
        Post {
            id: PostId(1),
            title: "Long".into(),
            content: "a".repeat(chars),
            author_username: Some(author.into()),
            created_at: epoch(),
            updated_at: None,
        }
    }
}
