//! Error types shared across Narrify crates

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Input validation errors raised before any remote call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Error body returned by the remote API.
///
/// `detail` is usually a string but validation failures carry a structured
/// list, so it is kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub detail: serde_json::Value,
}

impl ApiErrorBody {
    /// Human-readable detail text.
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_detail_is_verbatim() {
        let body: ApiErrorBody =
            serde_json::from_str(r#"{"detail":"Incorrect username or password"}"#).unwrap();
        assert_eq!(body.message(), "Incorrect username or password");
    }

    #[test]
    fn structured_detail_is_serialized() {
        let body: ApiErrorBody =
            serde_json::from_str(r#"{"detail":[{"loc":["body","title"],"msg":"field required"}]}"#)
                .unwrap();
        assert!(body.message().contains("field required"));
    }
}
