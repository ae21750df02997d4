//! Remote API client.
//!
//! [`PostsApi`] is the seam to the publishing service. [`RestClient`] speaks
//! HTTP to it; [`AuthorizedApi`] wraps any implementation with the session
//! credential and the uniform unauthorized rule.

use crate::config::ClientConfig;
use crate::error::ErrorKind;
use crate::session::SessionStore;
use async_trait::async_trait;
use narrify_core::{
    ApiErrorBody, LoginRequest, Post, PostId, PostInput, RegisterRequest, TokenResponse,
    UserProfile,
};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("HTTP {status}: {detail}")]
    Rejected { status: u16, detail: String },
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
    #[error("Config error: {0}")]
    Config(String),
}

impl ApiClientError {
    /// Map an error status and its body to the matching variant.
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = serde_json::from_str::<ApiErrorBody>(body)
            .map(|b| b.message())
            .unwrap_or_else(|_| body.to_string());
        match status {
            401 => Self::Unauthorized(detail),
            403 => Self::Forbidden(detail),
            404 => Self::NotFound(detail),
            _ => Self::Rejected { status, detail },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Http(_) => ErrorKind::Network,
            Self::Rejected { status, .. } if (400..500).contains(status) => ErrorKind::Validation,
            Self::Rejected { .. } => ErrorKind::Server,
            Self::Serde(_) | Self::InvalidResponse(_) | Self::Config(_) => ErrorKind::Unexpected,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

/// The publishing service's endpoints.
///
/// Authenticated calls take the bearer credential; `None` sends the request
/// without one and lets the server reject it.
#[async_trait]
pub trait PostsApi: Send + Sync {
    async fn login(&self, req: &LoginRequest) -> Result<TokenResponse, ApiClientError>;

    async fn register(&self, req: &RegisterRequest) -> Result<UserProfile, ApiClientError>;

    async fn me(&self, token: Option<&str>) -> Result<UserProfile, ApiClientError>;

    /// `search` of `""` lists everything.
    async fn list_posts(&self, search: &str) -> Result<Vec<Post>, ApiClientError>;

    async fn my_posts(&self, token: Option<&str>) -> Result<Vec<Post>, ApiClientError>;

    async fn get_post(&self, id: PostId) -> Result<Post, ApiClientError>;

    async fn create_post(
        &self,
        token: Option<&str>,
        input: &PostInput,
    ) -> Result<Post, ApiClientError>;

    async fn update_post(
        &self,
        token: Option<&str>,
        id: PostId,
        input: &PostInput,
    ) -> Result<Post, ApiClientError>;

    async fn delete_post(&self, token: Option<&str>, id: PostId) -> Result<(), ApiClientError>;
}

#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiClientError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
    ) -> Result<reqwest::RequestBuilder, ApiClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method, url);
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiClientError::Config(e.to_string()))?;
            request = request.header(AUTHORIZATION, value);
        }
        Ok(request)
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiClientError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            let text = response.text().await?;
            Ok(serde_json::from_str::<T>(&text)?)
        } else {
            Err(error_from_response(status, response).await)
        }
    }
}

#[async_trait]
impl PostsApi for RestClient {
    async fn login(&self, req: &LoginRequest) -> Result<TokenResponse, ApiClientError> {
        let request = self.request(Method::POST, "/auth/login", None)?.json(req);
        self.send_json(request).await
    }

    async fn register(&self, req: &RegisterRequest) -> Result<UserProfile, ApiClientError> {
        let request = self.request(Method::POST, "/auth/register", None)?.json(req);
        self.send_json(request).await
    }

    async fn me(&self, token: Option<&str>) -> Result<UserProfile, ApiClientError> {
        let request = self.request(Method::GET, "/auth/me", token)?;
        self.send_json(request).await
    }

    async fn list_posts(&self, search: &str) -> Result<Vec<Post>, ApiClientError> {
        let mut request = self.request(Method::GET, "/posts", None)?;
        if !search.is_empty() {
            request = request.query(&[("search", search)]);
        }
        self.send_json(request).await
    }

    async fn my_posts(&self, token: Option<&str>) -> Result<Vec<Post>, ApiClientError> {
        let request = self.request(Method::GET, "/posts/my", token)?;
        self.send_json(request).await
    }

    async fn get_post(&self, id: PostId) -> Result<Post, ApiClientError> {
        let request = self.request(Method::GET, &format!("/posts/{}", id), None)?;
        self.send_json(request).await
    }

    async fn create_post(
        &self,
        token: Option<&str>,
        input: &PostInput,
    ) -> Result<Post, ApiClientError> {
        let request = self.request(Method::POST, "/posts", token)?.json(input);
        self.send_json(request).await
    }

    async fn update_post(
        &self,
        token: Option<&str>,
        id: PostId,
        input: &PostInput,
    ) -> Result<Post, ApiClientError> {
        let request = self
            .request(Method::PUT, &format!("/posts/{}", id), token)?
            .json(input);
        self.send_json(request).await
    }

    async fn delete_post(&self, token: Option<&str>, id: PostId) -> Result<(), ApiClientError> {
        let response = self
            .request(Method::DELETE, &format!("/posts/{}", id), token)?
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            // 204 No Content, or an ignored `{}` body.
            Ok(())
        } else {
            Err(error_from_response(status, response).await)
        }
    }
}

async fn error_from_response(status: StatusCode, response: reqwest::Response) -> ApiClientError {
    match response.text().await {
        Ok(text) => ApiClientError::from_status(status.as_u16(), &text),
        Err(err) => ApiClientError::Http(err),
    }
}

/// [`PostsApi`] bound to the live session.
///
/// Attaches the current credential to every authenticated call. Any
/// unauthorized outcome clears the session (which signals the auth bus)
/// before the error reaches the caller. No call is retried.
#[derive(Clone)]
pub struct AuthorizedApi {
    api: Arc<dyn PostsApi>,
    session: Arc<SessionStore>,
}

impl AuthorizedApi {
    pub fn new(api: Arc<dyn PostsApi>, session: Arc<SessionStore>) -> Self {
        Self { api, session }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub async fn login(&self, req: &LoginRequest) -> Result<TokenResponse, ApiClientError> {
        self.guard(self.api.login(req).await)
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<UserProfile, ApiClientError> {
        self.guard(self.api.register(req).await)
    }

    pub async fn me(&self) -> Result<UserProfile, ApiClientError> {
        let token = self.session.token();
        self.guard(self.api.me(token.as_deref()).await)
    }

    pub async fn list_posts(&self, search: &str) -> Result<Vec<Post>, ApiClientError> {
        self.guard(self.api.list_posts(search).await)
    }

    pub async fn my_posts(&self) -> Result<Vec<Post>, ApiClientError> {
        let token = self.session.token();
        self.guard(self.api.my_posts(token.as_deref()).await)
    }

    pub async fn get_post(&self, id: PostId) -> Result<Post, ApiClientError> {
        self.guard(self.api.get_post(id).await)
    }

    pub async fn create_post(&self, input: &PostInput) -> Result<Post, ApiClientError> {
        let token = self.session.token();
        self.guard(self.api.create_post(token.as_deref(), input).await)
    }

    pub async fn update_post(&self, id: PostId, input: &PostInput) -> Result<Post, ApiClientError> {
        let token = self.session.token();
        self.guard(self.api.update_post(token.as_deref(), id, input).await)
    }

    pub async fn delete_post(&self, id: PostId) -> Result<(), ApiClientError> {
        let token = self.session.token();
        self.guard(self.api.delete_post(token.as_deref(), id).await)
    }

    fn guard<T>(&self, result: Result<T, ApiClientError>) -> Result<T, ApiClientError> {
        if let Err(err) = &result {
            if err.is_unauthorized() {
                warn!(error = %err, "Credential rejected; clearing session");
                self.session.clear();
            }
        }
        result
    }
}
