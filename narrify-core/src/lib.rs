//! Narrify Core - Entity Types
//!
//! Pure data structures shared by the client and its test utilities.
//! This crate contains ONLY data types and input validation - no I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

mod error;

pub use error::{ApiErrorBody, ValidationError};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Server-assigned post identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub i64);

impl PostId {
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PostId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(PostId)
    }
}

// ============================================================================
// ENTITIES
// ============================================================================

/// A published post as returned by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    /// Absent on some legacy rows; treated as "no author" for ownership checks.
    #[serde(default)]
    pub author_username: Option<String>,
    pub created_at: Timestamp,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

impl Post {
    /// True when `identity` is the post's author.
    pub fn is_authored_by(&self, identity: &str) -> bool {
        self.author_username.as_deref() == Some(identity)
    }

    /// First `max_chars` characters of the content, with an ellipsis when cut.
    pub fn excerpt(&self, max_chars: usize) -> String {
        let mut chars = self.content.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{}...", head)
        } else {
            head
        }
    }
}

/// Body of `POST /posts` and `PUT /posts/:id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostInput {
    pub title: String,
    pub content: String,
}

impl PostInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    /// Title and content are both required.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("title", &self.title)?;
        require("content", &self.content)?;
        Ok(())
    }
}

impl From<&Post> for PostInput {
    fn from(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            content: post.content.clone(),
        }
    }
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("username", &self.username)?;
        require("password", &self.password)?;
        Ok(())
    }
}

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("username", &self.username)?;
        require("email", &self.email)?;
        require("password", &self.password)?;
        if !self.email.contains('@') {
            return Err(ValidationError::Invalid {
                field: "email",
                reason: "must be an email address".to_string(),
            });
        }
        Ok(())
    }
}

/// Response of `POST /auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Response of `POST /auth/register` and `GET /auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: Timestamp,
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn post(content: &str) -> Post {
        Post {
            id: PostId(1),
            title: "t".to_string(),
            content: content.to_string(),
            author_username: Some("amy".to_string()),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn post_decodes_server_shape() {
        let json = r#"{
            "id": 7,
            "title": "Hello",
            "content": "World",
            "author_id": 3,
            "author_username": "amy",
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:00:00Z"
        }"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert_eq!(post.id, PostId(7));
        assert!(post.is_authored_by("amy"));
        assert!(!post.is_authored_by("bob"));
    }

    #[test]
    fn missing_author_owns_nothing() {
        let mut p = post("x");
        p.author_username = None;
        assert!(!p.is_authored_by(""));
    }

    #[test]
    fn post_input_requires_both_fields() {
        assert!(PostInput::new("t", "c").validate().is_ok());
        assert_eq!(
            PostInput::new("  ", "c").validate(),
            Err(ValidationError::Required { field: "title" })
        );
        assert_eq!(
            PostInput::new("t", "").validate(),
            Err(ValidationError::Required { field: "content" })
        );
    }

    #[test]
    fn register_requires_email_shape() {
        let req = RegisterRequest {
            username: "amy".into(),
            email: "amy.example.com".into(),
            password: "x".into(),
        };
        assert!(matches!(
            req.validate(),
            Err(ValidationError::Invalid { field: "email", .. })
        ));
    }

    #[test]
    fn token_type_defaults_to_bearer() {
        let token: TokenResponse = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        assert_eq!(token.token_type, "bearer");
    }

    proptest! {
        #[test]
        fn excerpt_never_exceeds_limit(content in ".{0,400}", max in 1usize..350) {
            let excerpt = post(&content).excerpt(max);
            let count = content.chars().count();
            if count > max {
                prop_assert!(excerpt.ends_with("..."));
                prop_assert_eq!(excerpt.chars().count(), max + 3);
            } else {
                prop_assert_eq!(excerpt, content);
            }
        }

        #[test]
        fn post_id_parses_its_display(raw in any::<i64>()) {
            let id = PostId(raw);
            prop_assert_eq!(id.to_string().parse::<PostId>().unwrap(), id);
        }
    }
}
