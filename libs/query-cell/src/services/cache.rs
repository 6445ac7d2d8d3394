use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use shared_models::error::AppError;

use crate::models::{CachePolicy, CacheStats, QueryKey, QueryState, QueryStatus};

type CachedValue = Arc<dyn Any + Send + Sync>;
type FetchResult = Result<CachedValue, AppError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

struct InFlight {
    id: u64,
    future: SharedFetch,
}

struct CacheEntry {
    status: QueryStatus,
    data: Option<CachedValue>,
    error: Option<AppError>,
    updated_at: Option<Instant>,
    /// Set by invalidation; cleared only by a fetch that started afterwards.
    invalidated: bool,
    epoch: u64,
    policy: CachePolicy,
    observers: usize,
    idle_since: Instant,
    in_flight: Option<InFlight>,
}

impl CacheEntry {
    fn new(policy: CachePolicy, now: Instant) -> Self {
        Self {
            status: QueryStatus::Pending,
            data: None,
            error: None,
            updated_at: None,
            invalidated: false,
            epoch: 0,
            policy,
            observers: 0,
            idle_since: now,
            in_flight: None,
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        if self.invalidated || self.data.is_none() {
            return false;
        }
        match self.updated_at {
            Some(at) => now.saturating_duration_since(at) < self.policy.stale_time,
            None => false,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.observers == 0
            && self.in_flight.is_none()
            && now.saturating_duration_since(self.idle_since) >= self.policy.gc_time
    }

    fn snapshot<T: Send + Sync + 'static>(&self, key: &QueryKey, now: Instant) -> QueryState<T> {
        QueryState {
            status: self.status,
            data: self.data.clone().and_then(|value| downcast(value, key).ok()),
            error: self.error.clone(),
            is_fetching: self.in_flight.is_some(),
            is_stale: !self.is_fresh(now),
            updated_at: self.updated_at,
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    deduplicated: AtomicU64,
    invalidations: AtomicU64,
    evictions: AtomicU64,
}

#[derive(Default)]
struct CacheStore {
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
    counters: Counters,
    next_fetch_id: AtomicU64,
}

impl CacheStore {
    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(&self, key: &QueryKey, fetch_id: u64, epoch: u64, result: &FetchResult) {
        let now = Instant::now();
        let mut entries = self.lock();

        let Some(entry) = entries.get_mut(key) else {
            debug!("Entry {} was removed while its fetch was in flight", key);
            return;
        };

        if entry.in_flight.as_ref().map(|f| f.id) != Some(fetch_id) {
            debug!("Discarding superseded fetch result for {}", key);
            return;
        }
        entry.in_flight = None;

        match result {
            Ok(value) => {
                entry.status = QueryStatus::Success;
                entry.data = Some(value.clone());
                entry.error = None;
                entry.updated_at = Some(now);
                entry.invalidated = entry.epoch != epoch;
                debug!("Fetched {}", key);
            }
            Err(err) => {
                // last known good data stays in place
                entry.status = QueryStatus::Error;
                entry.error = Some(err.clone());
                warn!("Fetch for {} failed: {}", key, err);
            }
        }

        if entry.observers == 0 {
            entry.idle_since = now;
        }
    }
}

fn downcast<T: Send + Sync + 'static>(value: CachedValue, key: &QueryKey) -> Result<Arc<T>, AppError> {
    value.downcast::<T>().map_err(|_| {
        warn!("Cached value for {} has an unexpected type", key);
        AppError::Internal(format!("cached value for {} has an unexpected type", key))
    })
}

enum Read<T> {
    Fresh(QueryState<T>),
    Fetching {
        future: SharedFetch,
        state: QueryState<T>,
    },
}

/// Keyed, time-bounded, reference-counted result cache shared by every view.
///
/// Cloning is cheap and every clone sees the same entries.
#[derive(Clone, Default)]
pub struct QueryClient {
    store: Arc<CacheStore>,
}

impl QueryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `key` the way a mounted view does.
    ///
    /// Fresh data is returned without calling `fetcher`. Stale data is
    /// returned immediately while a refetch runs in the background. With no
    /// data at all the call waits for the fetch. Concurrent readers of the
    /// same key share one in-flight fetch.
    pub async fn query<T, F, Fut>(&self, key: QueryKey, policy: CachePolicy, fetcher: F) -> QueryState<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        match self.begin_read(&key, policy, fetcher) {
            Read::Fresh(state) => state,
            Read::Fetching { state, .. } if state.data.is_some() => state,
            Read::Fetching { future, .. } => {
                let result = future.await;
                self.get_query_state(&key).unwrap_or_else(|| {
                    let mut state = QueryState::pending();
                    match result {
                        Ok(value) => {
                            state.status = QueryStatus::Success;
                            state.data = downcast(value, &key).ok();
                        }
                        Err(err) => {
                            state.status = QueryStatus::Error;
                            state.error = Some(err);
                        }
                    }
                    state
                })
            }
        }
    }

    /// Like [`query`](Self::query) but never serves stale data: waits for a
    /// refetch when the cached value is not fresh.
    pub async fn fetch_query<T, F, Fut>(&self, key: QueryKey, policy: CachePolicy, fetcher: F) -> Result<Arc<T>, AppError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        match self.begin_read::<T, F, Fut>(&key, policy, fetcher) {
            Read::Fresh(state) => match (state.data, state.error) {
                (Some(data), _) => Ok(data),
                (None, Some(err)) => Err(err),
                (None, None) => Err(AppError::Internal(format!("no cached data for {}", key))),
            },
            Read::Fetching { future, .. } => downcast(future.await?, &key),
        }
    }

    fn begin_read<T, F, Fut>(&self, key: &QueryKey, policy: CachePolicy, fetcher: F) -> Read<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        let now = Instant::now();
        let counters = &self.store.counters;
        let mut entries = self.store.lock();

        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            debug!("Evicting expired entry {} on read", key);
            entries.remove(key);
            counters.evictions.fetch_add(1, Ordering::Relaxed);
        }

        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(policy, now));
        entry.policy = policy;
        // a read counts as an observation for retention
        if entry.observers == 0 {
            entry.idle_since = now;
        }

        if entry.is_fresh(now) {
            counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache hit for {}", key);
            return Read::Fresh(entry.snapshot(key, now));
        }
        counters.misses.fetch_add(1, Ordering::Relaxed);

        let joined = entry.in_flight.as_ref().map(|in_flight| in_flight.future.clone());
        let future = match joined {
            Some(future) => {
                counters.deduplicated.fetch_add(1, Ordering::Relaxed);
                debug!("Joining in-flight fetch for {}", key);
                future
            }
            None => self.start_fetch(key, entry, fetcher),
        };

        Read::Fetching {
            future,
            state: entry.snapshot(key, now),
        }
    }

    fn start_fetch<T, F, Fut>(&self, key: &QueryKey, entry: &mut CacheEntry, fetcher: F) -> SharedFetch
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        let fetch_id = self.store.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        let epoch = entry.epoch;
        let store = Arc::downgrade(&self.store);
        let owned_key = key.clone();

        self.store.counters.fetches.fetch_add(1, Ordering::Relaxed);
        debug!("Fetching {} (fetch #{})", key, fetch_id);

        let future = async move {
            let result = fetcher().await.map(|data| Arc::new(data) as CachedValue);
            if let Some(store) = store.upgrade() {
                store.complete(&owned_key, fetch_id, epoch, &result);
            }
            result
        }
        .boxed()
        .shared();

        entry.in_flight = Some(InFlight {
            id: fetch_id,
            future: future.clone(),
        });

        // Driven independently of the caller so a superseded read still
        // populates its own key.
        tokio::spawn(future.clone());

        future
    }

    pub fn get_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let entries = self.store.lock();
        let value = entries.get(key)?.data.clone()?;
        downcast(value, key).ok()
    }

    pub fn get_query_state<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<QueryState<T>> {
        let now = Instant::now();
        self.store.lock().get(key).map(|entry| entry.snapshot(key, now))
    }

    pub fn set_query_data<T: Send + Sync + 'static>(&self, key: QueryKey, policy: CachePolicy, data: T) {
        let now = Instant::now();
        let mut entries = self.store.lock();
        let entry = entries
            .entry(key)
            .or_insert_with(|| CacheEntry::new(policy, now));

        entry.policy = policy;
        entry.status = QueryStatus::Success;
        entry.data = Some(Arc::new(data));
        entry.error = None;
        entry.updated_at = Some(now);
        entry.invalidated = false;
        if entry.observers == 0 {
            entry.idle_since = now;
        }
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.store
            .lock()
            .get(key)
            .is_some_and(|entry| entry.in_flight.is_some())
    }

    /// Wait for the fetch currently running for `key`, if any.
    pub async fn settle(&self, key: &QueryKey) {
        let future = self
            .store
            .lock()
            .get(key)
            .and_then(|entry| entry.in_flight.as_ref().map(|f| f.future.clone()));

        if let Some(future) = future {
            let _ = future.await;
        }
    }

    /// Mark every entry under `prefix` stale regardless of its age. Returns
    /// how many entries were marked.
    pub fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.store.lock();
        let mut marked = 0;

        for (key, entry) in entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.invalidated = true;
                entry.epoch += 1;
                marked += 1;
            }
        }

        self.store
            .counters
            .invalidations
            .fetch_add(marked as u64, Ordering::Relaxed);
        info!("Invalidated {} cached queries under {}", marked, prefix);
        marked
    }

    pub fn remove_queries(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.store.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    pub fn clear(&self) {
        let mut entries = self.store.lock();
        debug!("Clearing {} cached queries", entries.len());
        entries.clear();
    }

    /// Register a view as observing `key`. The entry cannot be evicted until
    /// every observer is dropped and its retention window has passed.
    pub fn observe(&self, key: QueryKey) -> QueryObserver {
        let now = Instant::now();
        {
            let mut entries = self.store.lock();
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(CachePolicy::default(), now));
            entry.observers += 1;
        }

        QueryObserver {
            client: self.clone(),
            key,
        }
    }

    fn release(&self, key: &QueryKey) {
        let mut entries = self.store.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.observers = entry.observers.saturating_sub(1);
            if entry.observers == 0 {
                entry.idle_since = Instant::now();
            }
        }
    }

    /// Evict every unobserved entry whose retention window has passed.
    pub fn garbage_collect(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.store.lock();
        let before = entries.len();

        entries.retain(|key, entry| {
            let expired = entry.is_expired(now);
            if expired {
                debug!("Evicting {}", key);
            }
            !expired
        });

        let evicted = before - entries.len();
        self.store
            .counters
            .evictions
            .fetch_add(evicted as u64, Ordering::Relaxed);
        evicted
    }

    /// Run [`garbage_collect`](Self::garbage_collect) every `every` until the
    /// last clone of this client is dropped.
    pub fn spawn_garbage_collector(&self, every: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(&self.store);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    debug!("Query client dropped, stopping garbage collector");
                    break;
                };
                let evicted = QueryClient { store }.garbage_collect();
                if evicted > 0 {
                    debug!("Garbage collector evicted {} entries", evicted);
                }
            }
        })
    }

    pub fn stats(&self) -> CacheStats {
        let counters = &self.store.counters;
        CacheStats {
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            fetches: counters.fetches.load(Ordering::Relaxed),
            deduplicated: counters.deduplicated.load(Ordering::Relaxed),
            invalidations: counters.invalidations.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
            total_entries: self.store.lock().len() as u64,
        }
    }
}

/// Handle held by a view for as long as it reads a key.
pub struct QueryObserver {
    client: QueryClient,
    key: QueryKey,
}

impl QueryObserver {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn state<T: Send + Sync + 'static>(&self) -> QueryState<T> {
        self.client
            .get_query_state(&self.key)
            .unwrap_or_else(QueryState::pending)
    }
}

impl Drop for QueryObserver {
    fn drop(&mut self) {
        self.client.release(&self.key);
    }
}

/// The key a view currently shows. Keeps that entry from being evicted while
/// the view lives; moving to another key releases the previous one.
#[derive(Clone, Default)]
pub struct MountedQuery {
    current: Arc<Mutex<Option<QueryObserver>>>,
}

impl MountedQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&self, client: &QueryClient, key: &QueryKey) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().is_some_and(|observer| observer.key() == key) {
            return;
        }
        debug!("Mounting view on {}", key);
        *current = Some(client.observe(key.clone()));
    }

    pub fn key(&self) -> Option<QueryKey> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|observer| observer.key().clone())
    }

    pub fn unmount(&self) {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_fetcher(
        calls: &Arc<AtomicUsize>,
        value: u32,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<u32, AppError>> + Send + 'static {
        let calls = calls.clone();
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_read_skips_fetch() {
        let client = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new(["specializations"]);
        let policy = CachePolicy::minutes(30, 60);

        let first = client.query(key.clone(), policy, counting_fetcher(&calls, 1)).await;
        let second = client.query(key.clone(), policy, counting_fetcher(&calls, 2)).await;

        assert_eq!(*first.data.unwrap(), 1);
        assert_eq!(*second.data.unwrap(), 1);
        assert!(!second.is_stale);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.stats().hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_type_mismatch_is_reported() {
        let client = QueryClient::new();
        let key = QueryKey::new(["doctors"]);
        client.set_query_data(key.clone(), CachePolicy::minutes(5, 10), 7u32);

        let result = client
            .fetch_query::<String, _, _>(key, CachePolicy::minutes(5, 10), || async {
                Ok::<_, AppError>("never".to_string())
            })
            .await;

        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_blocks_eviction() {
        let client = QueryClient::new();
        let key = QueryKey::new(["appointments", "patient"]);
        let policy = CachePolicy::minutes(2, 5);
        client.set_query_data(key.clone(), policy, 1u32);

        let observer = client.observe(key.clone());
        tokio::time::advance(Duration::from_secs(10 * 60)).await;
        assert_eq!(client.garbage_collect(), 0);
        assert_eq!(*observer.state::<u32>().data.unwrap(), 1);

        drop(observer);
        assert_eq!(client.garbage_collect(), 0);

        tokio::time::advance(Duration::from_secs(5 * 60)).await;
        assert_eq!(client.garbage_collect(), 1);
        assert!(client.get_query_data::<u32>(&key).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_extend_retention() {
        let client = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new(["doctors", "list"]).with_param("page", 1u32);
        let policy = CachePolicy::minutes(5, 10);

        client.query(key.clone(), policy, counting_fetcher(&calls, 1)).await;
        tokio::time::advance(Duration::from_secs(4 * 60)).await;
        let hit = client.query(key.clone(), policy, counting_fetcher(&calls, 2)).await;
        assert!(!hit.is_stale);

        tokio::time::advance(Duration::from_secs(6 * 60 + 30)).await;
        assert_eq!(client.garbage_collect(), 0);

        let later = client.query(key.clone(), policy, counting_fetcher(&calls, 3)).await;
        assert!(later.is_stale);
        assert_eq!(*later.data.unwrap(), 1);
        assert_eq!(client.stats().evictions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mounted_view_releases_previous_key() {
        let client = QueryClient::new();
        let policy = CachePolicy::minutes(2, 5);
        let first = QueryKey::new(["appointments", "patient"]).with_param("page", 1u32);
        let second = QueryKey::new(["appointments", "patient"]).with_param("page", 2u32);
        client.set_query_data(first.clone(), policy, 1u32);
        client.set_query_data(second.clone(), policy, 2u32);

        let view = MountedQuery::new();
        view.mount(&client, &first);
        view.mount(&client, &first);
        tokio::time::advance(Duration::from_secs(10 * 60)).await;
        assert_eq!(client.garbage_collect(), 1);
        assert!(client.get_query_data::<u32>(&first).is_some());

        view.mount(&client, &second);
        assert_eq!(view.key(), Some(second.clone()));
        tokio::time::advance(Duration::from_secs(5 * 60)).await;
        assert_eq!(client.garbage_collect(), 1);
        assert!(client.get_query_data::<u32>(&first).is_none());

        view.unmount();
        assert!(view.key().is_none());
    }
}
