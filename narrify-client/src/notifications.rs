//! User-facing notifications printed by the shell.

use crate::error::{ClientError, ErrorKind};
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
    Success,
}

/// What the user can do about a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    Login,
    Retry,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub action: Option<NotificationAction>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            action: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Unauthorized failures become a login prompt rather than a raw error.
    pub fn from_error(context: &str, err: &ClientError) -> Self {
        match err.kind() {
            ErrorKind::Unauthorized => Notification::new(
                NotificationLevel::Warning,
                "Please log in to continue",
            )
            .with_action(NotificationAction::Login),
            ErrorKind::Network | ErrorKind::Server => Notification::new(
                NotificationLevel::Error,
                format!("{}: {}", context, err),
            )
            .with_action(NotificationAction::Retry),
            _ => Notification::new(NotificationLevel::Error, format!("{}: {}", context, err)),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            NotificationLevel::Info => "info",
            NotificationLevel::Warning => "warn",
            NotificationLevel::Error => "error",
            NotificationLevel::Success => "ok",
        };
        write!(f, "[{}] {}", tag, self.message)?;
        match self.action {
            Some(NotificationAction::Login) => write!(f, " (use 'login')"),
            Some(NotificationAction::Retry) => write!(f, " (use 'refresh' to retry)"),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::ApiClientError;

    #[test]
    fn unauthorized_is_a_prompt() {
        let err = ClientError::Api(ApiClientError::from_status(401, r#"{"detail":"Not authenticated"}"#));
        let note = Notification::from_error("Delete failed", &err);
        assert_eq!(note.level, NotificationLevel::Warning);
        assert!(!note.to_string().contains("Not authenticated"));
        assert_eq!(note.action, Some(NotificationAction::Login));
    }

    #[test]
    fn server_errors_are_verbatim() {
        let err = ClientError::Api(ApiClientError::from_status(500, r#"{"detail":"db down"}"#));
        let note = Notification::from_error("Load failed", &err);
        assert!(note.to_string().contains("db down"));
        assert_eq!(note.action, Some(NotificationAction::Retry));
    }
}
