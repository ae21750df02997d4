//! Query cache for remote reads.
//!
//! Every piece of server data a surface shows lives in a [`QueryCache`] entry
//! addressed by a [`CacheKey`]. Surfaces never share data with each other
//! directly; they read the same key.
//!
//! # Epochs
//!
//! Each fetch captures the entry's `fetch_epoch` when it starts. Invalidation,
//! disabling and newer fetches all bump the epoch, and a fetch whose epoch is
//! no longer current is dropped on completion. An older response can therefore
//! never overwrite a newer one, whatever order the network returns them in.
//! In-flight fetches are never cancelled.
//!
//! # Example
//!
//! ```ignore
//! let entry = cache.get_or_fetch(
//!     keys::my_posts(),
//!     move || async move { api.my_posts().await },
//!     QueryOptions::default().enabled(session.is_authenticated()),
//! )?;
//!
//! // After a write
//! cache.invalidate(&KeyFilter::prefix(keys::posts_root()));
//! ```

pub mod entry;
pub mod key;
pub mod keys;
pub mod query_cache;

pub use entry::{CacheEntry, EntryVersion, ErrorInfo, QueryOptions, QueryStatus};
pub use key::{CacheKey, KeyFilter, KeyPart};
pub use query_cache::{QueryCache, QueryError};
