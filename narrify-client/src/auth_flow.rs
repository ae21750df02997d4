//! Login, registration and logout.

use crate::api_client::AuthorizedApi;
use crate::error::ClientError;
use crate::session::SessionStore;
use narrify_core::{LoginRequest, RegisterRequest, UserProfile};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AuthFlow {
    api: AuthorizedApi,
}

impl AuthFlow {
    pub fn new(api: AuthorizedApi) -> Self {
        Self { api }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        self.api.session()
    }

    /// Exchange credentials for a token and start a session as `username`.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, ClientError> {
        let req = LoginRequest {
            username: username.trim().to_string(),
            password: password.to_string(),
        };
        req.validate()?;
        let token = self.api.login(&req).await?;
        self.session().set(&token.access_token, &req.username)?;
        Ok(req.username)
    }

    /// Create an account. Does not log in.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, ClientError> {
        let req = RegisterRequest {
            username: username.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        req.validate()?;
        let profile = self.api.register(&req).await?;
        info!(username = %profile.username, "Account registered");
        Ok(profile)
    }

    pub fn logout(&self) {
        self.session().clear();
    }

    /// Route guard for surfaces that need a logged-in identity.
    pub fn require_session(&self) -> Result<String, ClientError> {
        self.session().identity().ok_or(ClientError::LoginRequired)
    }

    /// Ask the server who the current credential belongs to.
    pub async fn me(&self) -> Result<UserProfile, ClientError> {
        self.require_session()?;
        Ok(self.api.me().await?)
    }
}
