//! Error types for the client.

use crate::api_client::ApiClientError;
use crate::cache::{ErrorInfo, QueryError};
use crate::config::ConfigError;
use crate::persistence::PersistenceError;
use crate::session::SessionError;
use narrify_core::ValidationError;
use serde::{Deserialize, Serialize};

/// Failure taxonomy shared by cache entries and user-facing surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credential missing or rejected.
    Unauthorized,
    /// Authenticated, but not allowed to touch this item.
    Forbidden,
    NotFound,
    /// Transport failure.
    Network,
    Server,
    /// Request rejected as malformed.
    Validation,
    /// Malformed responses and programming errors.
    Unexpected,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiClientError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Query(#[from] QueryError),
    /// A cached read ended in error.
    #[error("{0}")]
    Fetch(ErrorInfo),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Login required")]
    LoginRequired,
    #[error("Malformed mutation: {0}")]
    MalformedMutation(String),
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Api(err) => err.kind(),
            ClientError::Fetch(info) => info.kind,
            ClientError::LoginRequired => ErrorKind::Unauthorized,
            ClientError::Validation(_) | ClientError::Session(_) => ErrorKind::Validation,
            ClientError::Io(_)
            | ClientError::Config(_)
            | ClientError::Persistence(_)
            | ClientError::Query(_)
            | ClientError::MalformedMutation(_)
            | ClientError::Logging(_) => ErrorKind::Unexpected,
        }
    }
}
