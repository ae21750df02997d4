//! The key-indexed query cache.

use super::entry::{CacheEntry, EntryVersion, ErrorInfo, QueryOptions, QueryStatus};
use super::key::{CacheKey, KeyFilter, KeyPart};
use crate::api_client::ApiClientError;
use crate::error::ErrorKind;
use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt};
use narrify_core::Timestamp;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

type AnyData = Arc<dyn Any + Send + Sync>;
type FetchFuture = BoxFuture<'static, Result<AnyData, ApiClientError>>;
type ErasedFetcher = Arc<dyn Fn() -> FetchFuture + Send + Sync>;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum QueryError {
    /// A fetcher produced a different type than the reader asked for.
    #[error("Cache entry {key} does not hold a {expected}")]
    TypeMismatch {
        key: CacheKey,
        expected: &'static str,
    },
    #[error("No cache entry for {key}")]
    Missing { key: CacheKey },
}

struct Slot {
    status: QueryStatus,
    data: Option<AnyData>,
    placeholder: Option<AnyData>,
    error: Option<ErrorInfo>,
    enabled: bool,
    fetch_epoch: u64,
    invalidated: bool,
    fetched_at: Option<Instant>,
    updated_at: Option<Timestamp>,
    stale_after: Option<Duration>,
    fetcher: ErasedFetcher,
    version: watch::Sender<EntryVersion>,
}

impl Slot {
    fn new(fetcher: ErasedFetcher, options: &QueryOptions) -> Self {
        let (version, _rx) = watch::channel(EntryVersion {
            epoch: 0,
            status: QueryStatus::Idle,
        });
        Self {
            status: QueryStatus::Idle,
            data: None,
            placeholder: None,
            error: None,
            enabled: options.enabled,
            fetch_epoch: 0,
            invalidated: false,
            fetched_at: None,
            updated_at: None,
            stale_after: options.stale_after,
            fetcher,
            version,
        }
    }

    fn is_stale(&self, now: Instant) -> bool {
        match (self.stale_after, self.fetched_at) {
            (Some(limit), Some(at)) => now.duration_since(at) >= limit,
            _ => false,
        }
    }

    /// Whether an enabled read should start a fetch.
    fn needs_fetch(&self, now: Instant) -> bool {
        match self.status {
            QueryStatus::Loading => false,
            QueryStatus::Idle => true,
            QueryStatus::Success | QueryStatus::Error => self.invalidated || self.is_stale(now),
        }
    }

    fn publish(&self) {
        self.version.send_replace(EntryVersion {
            epoch: self.fetch_epoch,
            status: self.status,
        });
    }

    fn snapshot<T: Any + Send + Sync>(&self, key: &CacheKey) -> Result<CacheEntry<T>, QueryError> {
        let (data, is_placeholder) = match &self.data {
            Some(data) => (Some(downcast::<T>(key, data)?), false),
            None if self.status == QueryStatus::Loading => {
                // A placeholder of another type is simply not shown.
                let placeholder = self
                    .placeholder
                    .as_ref()
                    .and_then(|p| Arc::clone(p).downcast::<T>().ok());
                let shown = placeholder.is_some();
                (placeholder, shown)
            }
            None => (None, false),
        };
        Ok(CacheEntry {
            key: key.clone(),
            status: self.status,
            data,
            error: self.error.clone(),
            enabled: self.enabled,
            fetch_epoch: self.fetch_epoch,
            is_placeholder,
            updated_at: self.updated_at,
        })
    }
}

fn downcast<T: Any + Send + Sync>(key: &CacheKey, data: &AnyData) -> Result<Arc<T>, QueryError> {
    Arc::clone(data)
        .downcast::<T>()
        .map_err(|_| QueryError::TypeMismatch {
            key: key.clone(),
            expected: type_name::<T>(),
        })
}

#[derive(Default)]
struct CacheState {
    slots: HashMap<CacheKey, Slot>,
    /// Most recently read key per family, source of placeholders.
    last_read: HashMap<KeyPart, CacheKey>,
}

impl CacheState {
    fn placeholder_for(&self, key: &CacheKey) -> Option<AnyData> {
        let previous = self.last_read.get(key.family()?)?;
        if previous == key {
            return None;
        }
        self.slots.get(previous)?.data.clone()
    }
}

struct CacheInner {
    state: Mutex<CacheState>,
    /// Cache-wide so a re-created entry never reuses an epoch.
    epochs: AtomicU64,
}

struct Launch {
    key: CacheKey,
    epoch: u64,
    fetcher: ErasedFetcher,
}

/// Cloneable handle to one shared cache.
///
/// Methods that may start a fetch spawn it on the current Tokio runtime and
/// must be called from within one.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState::default()),
                epochs: AtomicU64::new(0),
            }),
        }
    }

    /// Read `key`, starting `fetcher` when the entry is enabled and missing,
    /// idle, invalidated or stale.
    ///
    /// The returned snapshot reflects the entry after any fetch was started;
    /// it never waits for the fetch.
    pub fn get_or_fetch<T, F, Fut>(
        &self,
        key: CacheKey,
        fetcher: F,
        options: QueryOptions,
    ) -> Result<CacheEntry<T>, QueryError>
    where
        T: Any + Send + Sync,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiClientError>> + Send + 'static,
    {
        let fetcher = erase(fetcher);
        let now = Instant::now();
        let mut state = self.lock();

        let placeholder = if options.keep_previous_data {
            state.placeholder_for(&key)
        } else {
            None
        };
        if let Some(family) = key.family() {
            state.last_read.insert(family.clone(), key.clone());
        }

        let slot = state
            .slots
            .entry(key.clone())
            .or_insert_with(|| Slot::new(Arc::clone(&fetcher), &options));
        slot.fetcher = fetcher;
        slot.stale_after = options.stale_after;

        let mut launch = None;
        if !options.enabled {
            if slot.enabled {
                self.disable(&key, slot);
            }
        } else {
            slot.enabled = true;
            if slot.needs_fetch(now) {
                if slot.data.is_none() {
                    slot.placeholder = placeholder;
                }
                launch = Some(self.begin_fetch(&key, slot));
            }
        }

        let snapshot = slot.snapshot::<T>(&key);
        drop(state);

        if let Some(launch) = launch {
            self.spawn(launch);
        }
        snapshot
    }

    /// Read `key` without ever fetching.
    pub fn peek<T: Any + Send + Sync>(
        &self,
        key: &CacheKey,
    ) -> Result<Option<CacheEntry<T>>, QueryError> {
        let state = self.lock();
        state
            .slots
            .get(key)
            .map(|slot| slot.snapshot::<T>(key))
            .transpose()
    }

    /// Mark matching entries untrustworthy. Enabled entries refetch now;
    /// disabled ones go idle and refetch on their next enabled read.
    ///
    /// Returns the number of matching entries.
    pub fn invalidate(&self, filter: &KeyFilter) -> usize {
        let mut launches = Vec::new();
        let mut matched = 0;
        {
            let mut state = self.lock();
            for (key, slot) in state.slots.iter_mut() {
                if !filter.matches(key) {
                    continue;
                }
                matched += 1;
                slot.invalidated = true;
                if slot.enabled {
                    launches.push(self.begin_fetch(key, slot));
                } else {
                    slot.fetch_epoch = self.next_epoch();
                    slot.status = QueryStatus::Idle;
                    slot.publish();
                }
                debug!(key = %key, epoch = slot.fetch_epoch, "Invalidated");
            }
        }
        for launch in launches {
            self.spawn(launch);
        }
        matched
    }

    /// Delete matching entries. Their in-flight fetches are discarded on
    /// completion. Returns the number removed.
    pub fn remove(&self, filter: &KeyFilter) -> usize {
        let mut state = self.lock();
        let before = state.slots.len();
        state.slots.retain(|key, _| {
            let keep = !filter.matches(key);
            if !keep {
                debug!(key = %key, "Removed");
            }
            keep
        });
        state.last_read.retain(|_, key| !filter.matches(key));
        before - state.slots.len()
    }

    /// Turn fetching on or off for an existing entry.
    ///
    /// Enabling behaves like a fresh read. Disabling keeps `data`, goes idle
    /// and orphans any in-flight fetch. Returns `false` if the entry does not
    /// exist.
    pub fn set_enabled(&self, key: &CacheKey, enabled: bool) -> bool {
        let launch = {
            let mut state = self.lock();
            let Some(slot) = state.slots.get_mut(key) else {
                return false;
            };
            match (slot.enabled, enabled) {
                (false, true) => {
                    slot.enabled = true;
                    if slot.needs_fetch(Instant::now()) {
                        Some(self.begin_fetch(key, slot))
                    } else {
                        None
                    }
                }
                (true, false) => {
                    self.disable(key, slot);
                    None
                }
                _ => None,
            }
        };
        if let Some(launch) = launch {
            self.spawn(launch);
        }
        true
    }

    /// Transition notifications for `key`, if it exists.
    pub fn watch(&self, key: &CacheKey) -> Option<watch::Receiver<EntryVersion>> {
        self.lock()
            .slots
            .get(key)
            .map(|slot| slot.version.subscribe())
    }

    /// Wait until `key` is not loading and return it.
    pub async fn settled<T: Any + Send + Sync>(
        &self,
        key: &CacheKey,
    ) -> Result<CacheEntry<T>, QueryError> {
        let missing = || QueryError::Missing { key: key.clone() };
        let mut rx = self.watch(key).ok_or_else(missing)?;
        rx.wait_for(|version| version.status != QueryStatus::Loading)
            .await
            .map_err(|_| missing())?;
        drop(rx);
        self.peek::<T>(key)?.ok_or_else(missing)
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().slots.contains_key(key)
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn next_epoch(&self) -> u64 {
        self.inner.epochs.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn begin_fetch(&self, key: &CacheKey, slot: &mut Slot) -> Launch {
        slot.fetch_epoch = self.next_epoch();
        slot.status = QueryStatus::Loading;
        slot.publish();
        debug!(key = %key, epoch = slot.fetch_epoch, "Fetch started");
        Launch {
            key: key.clone(),
            epoch: slot.fetch_epoch,
            fetcher: Arc::clone(&slot.fetcher),
        }
    }

    fn disable(&self, key: &CacheKey, slot: &mut Slot) {
        slot.enabled = false;
        slot.fetch_epoch = self.next_epoch();
        slot.status = QueryStatus::Idle;
        slot.placeholder = None;
        slot.publish();
        debug!(key = %key, epoch = slot.fetch_epoch, "Disabled");
    }

    fn spawn(&self, launch: Launch) {
        let cache = self.clone();
        let request = (launch.fetcher)();
        tokio::spawn(async move {
            let result = request.await;
            cache.complete(&launch.key, launch.epoch, result);
        });
    }

    fn complete(&self, key: &CacheKey, epoch: u64, result: Result<AnyData, ApiClientError>) {
        let mut state = self.lock();
        let Some(slot) = state.slots.get_mut(key) else {
            debug!(key = %key, epoch, "Discarding result for removed entry");
            return;
        };
        if slot.fetch_epoch != epoch {
            debug!(
                key = %key,
                epoch,
                current = slot.fetch_epoch,
                "Discarding superseded result"
            );
            return;
        }

        match result {
            Ok(data) => {
                slot.data = Some(data);
                slot.error = None;
                slot.status = QueryStatus::Success;
            }
            Err(err) => {
                let info = ErrorInfo::from(&err);
                // The server says the item is gone or off-limits; do not keep
                // showing the old copy.
                if matches!(info.kind, ErrorKind::NotFound | ErrorKind::Forbidden) {
                    slot.data = None;
                }
                debug!(key = %key, epoch, error = %info, "Fetch failed");
                slot.error = Some(info);
                slot.status = QueryStatus::Error;
            }
        }
        slot.placeholder = None;
        slot.invalidated = false;
        slot.fetched_at = Some(Instant::now());
        slot.updated_at = Some(Utc::now());
        slot.publish();
        debug!(key = %key, epoch, status = %slot.status, "Fetch applied");
    }
}

fn erase<T, F, Fut>(fetcher: F) -> ErasedFetcher
where
    T: Any + Send + Sync,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiClientError>> + Send + 'static,
{
    Arc::new(move || {
        fetcher()
            .map(|result| result.map(|value| Arc::new(value) as AnyData))
            .boxed()
    })
}
