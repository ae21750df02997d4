//! Cache entry snapshots and read options.

use super::key::CacheKey;
use crate::api_client::ApiClientError;
use crate::error::ErrorKind;
use narrify_core::Timestamp;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStatus {
    /// Not fetching: never fetched, disabled, or invalidated while disabled.
    Idle,
    Loading,
    Success,
    Error,
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryStatus::Idle => "idle",
            QueryStatus::Loading => "loading",
            QueryStatus::Success => "success",
            QueryStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// Cloneable description of a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ApiClientError> for ErrorInfo {
    fn from(err: &ApiClientError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Point-in-time, read-only view of one cache entry.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub key: CacheKey,
    pub status: QueryStatus,
    /// Last successful payload, or a placeholder while `is_placeholder`.
    pub data: Option<Arc<T>>,
    pub error: Option<ErrorInfo>,
    pub enabled: bool,
    pub fetch_epoch: u64,
    /// `data` belongs to the previously read key of the same family.
    pub is_placeholder: bool,
    pub updated_at: Option<Timestamp>,
}

impl<T> CacheEntry<T> {
    pub fn data(&self) -> Option<&T> {
        self.data.as_deref()
    }

    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

/// Published on an entry's watch channel after every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryVersion {
    pub epoch: u64,
    pub status: QueryStatus,
}

/// Per-read options for [`QueryCache::get_or_fetch`].
///
/// [`QueryCache::get_or_fetch`]: super::QueryCache::get_or_fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub enabled: bool,
    pub keep_previous_data: bool,
    pub stale_after: Option<Duration>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            keep_previous_data: false,
            stale_after: None,
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn keep_previous_data(mut self, keep: bool) -> Self {
        self.keep_previous_data = keep;
        self
    }

    pub fn stale_after(mut self, stale_after: Option<Duration>) -> Self {
        self.stale_after = stale_after;
        self
    }
}
