use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::client::{ClientError, CostSource};
use crate::models::{CostQuery, CostRecord};

struct Slot<V> {
    value: Option<V>,
    fetched_at: Option<Instant>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            value: None,
            fetched_at: None,
        }
    }
}

impl<V> Slot<V> {
    fn age(&self, now: Instant) -> Option<Duration> {
        self.fetched_at.map(|at| now.duration_since(at))
    }
}

/// Time-boxed query cache.
///
/// Values younger than `stale_time` are served without fetching. Older
/// values are refetched; if that fetch fails, the old value is still served
/// until it reaches `gc_time`, after which it is dropped. Callers asking for
/// the same key while a fetch is running wait for it instead of starting
/// their own.
pub struct QueryCache<K, V> {
    entries: DashMap<K, Arc<Mutex<Slot<V>>>>,
    stale_time: Duration,
    gc_time: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    stale_served: AtomicU64,
}

impl<K, V> QueryCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(stale_time: Duration, gc_time: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            stale_time,
            gc_time: gc_time.max(stale_time),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stale_served: AtomicU64::new(0),
        }
    }

    pub async fn get_or_fetch<F, Fut, E>(&self, key: &K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: std::fmt::Display,
    {
        self.evict_expired();

        let slot = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Slot::default())))
            .clone();
        let mut slot = slot.lock().await;

        let now = Instant::now();
        if let (Some(value), Some(age)) = (&slot.value, slot.age(now)) {
            if age < self.stale_time {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(value.clone());
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        match fetch().await {
            Ok(value) => {
                slot.value = Some(value.clone());
                slot.fetched_at = Some(Instant::now());
                Ok(value)
            }
            Err(e) => match (&slot.value, slot.age(Instant::now())) {
                (Some(stale), Some(age)) if age < self.gc_time => {
                    warn!(error = %e, age_secs = age.as_secs(), "Refetch failed, serving stale data");
                    self.stale_served.fetch_add(1, Ordering::Relaxed);
                    Ok(stale.clone())
                }
                _ => Err(e),
            },
        }
    }

    /// Drops entries older than `gc_time` and empty ones nobody is filling.
    ///
    /// A slot still referenced outside the map belongs to a caller between
    /// cloning it and taking its lock, so it is kept. Clones are taken under
    /// the shard lock `retain` holds, so the count cannot grow mid-check.
    pub fn evict_expired(&self) {
        let now = Instant::now();
        let gc_time = self.gc_time;
        let before = self.entries.len();
        self.entries.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(slot) => matches!(slot.age(now), Some(age) if age < gc_time),
                Err(_) => true,
            }
        });
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            debug!(evicted, "Evicted expired cache entries");
        }
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            hits,
            misses,
            stale_served: self.stale_served.load(Ordering::Relaxed),
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
            size: self.entries.len(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stale_served: u64,
    pub hit_rate: f64,
    pub size: usize,
}

/// [`CostSource`] decorator that answers repeated queries from a [`QueryCache`].
pub struct CachedCostSource {
    inner: Arc<dyn CostSource>,
    cache: QueryCache<CostQuery, Vec<CostRecord>>,
}

impl CachedCostSource {
    pub fn new(inner: Arc<dyn CostSource>, stale_time: Duration, gc_time: Duration) -> Self {
        Self {
            inner,
            cache: QueryCache::new(stale_time, gc_time),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn invalidate(&self, query: &CostQuery) {
        self.cache.invalidate(query);
    }

    pub fn evict_expired(&self) {
        self.cache.evict_expired();
    }
}

#[async_trait]
impl CostSource for CachedCostSource {
    async fn fetch_costs(&self, query: &CostQuery) -> Result<Vec<CostRecord>, ClientError> {
        self.cache
            .get_or_fetch(query, || self.inner.fetch_costs(query))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::AtomicUsize;

    fn cache(stale_ms: u64, gc_ms: u64) -> QueryCache<&'static str, u32> {
        QueryCache::new(Duration::from_millis(stale_ms), Duration::from_millis(gc_ms))
    }

    #[tokio::test]
    async fn test_fresh_value_served_from_cache() {
        let cache = cache(60_000, 120_000);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<u32, String> = cache
                .get_or_fetch(&"k", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await;
            assert_eq!(value.unwrap(), 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }

    #[tokio::test]
    async fn test_stale_value_refetched() {
        let cache = cache(10, 60_000);
        let first: Result<u32, String> = cache.get_or_fetch(&"k", || async { Ok(1) }).await;
        assert_eq!(first.unwrap(), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let second: Result<u32, String> = cache.get_or_fetch(&"k", || async { Ok(2) }).await;
        assert_eq!(second.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_stale_value_served_when_refetch_fails() {
        let cache = cache(10, 60_000);
        let _: Result<u32, String> = cache.get_or_fetch(&"k", || async { Ok(1) }).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        let value: Result<u32, String> = cache
            .get_or_fetch(&"k", || async { Err("upstream down".to_string()) })
            .await;
        assert_eq!(value.unwrap(), 1);
        assert_eq!(cache.stats().stale_served, 1);
    }

    #[tokio::test]
    async fn test_error_without_cached_value() {
        let cache = cache(10, 60_000);
        let value: Result<u32, String> = cache
            .get_or_fetch(&"k", || async { Err("upstream down".to_string()) })
            .await;
        assert!(value.is_err());
    }

    #[tokio::test]
    async fn test_expired_entries_evicted() {
        let cache = cache(5, 10);
        let _: Result<u32, String> = cache.get_or_fetch(&"a", || async { Ok(1) }).await;
        assert_eq!(cache.stats().size, 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        cache.evict_expired();
        assert_eq!(cache.stats().size, 0);

        // Past gc_time a failed refetch is an error, not stale data.
        let _: Result<u32, String> = cache.get_or_fetch(&"a", || async { Ok(1) }).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        let value: Result<u32, String> = cache
            .get_or_fetch(&"a", || async { Err("down".to_string()) })
            .await;
        assert!(value.is_err());
    }

    #[tokio::test]
    async fn test_eviction_keeps_slot_awaiting_lock() {
        let cache = cache(60_000, 120_000);
        let pending = cache
            .entries
            .entry("k")
            .or_insert_with(|| Arc::new(Mutex::new(Slot::default())))
            .clone();

        cache.evict_expired();
        assert_eq!(cache.stats().size, 1);
        assert!(Arc::ptr_eq(cache.entries.get(&"k").unwrap().value(), &pending));

        // Once the caller is gone an empty slot is garbage.
        drop(pending);
        cache.evict_expired();
        assert_eq!(cache.stats().size, 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_fetch() {
        let cache = Arc::new(cache(60_000, 120_000));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                let value: Result<u32, String> = cache
                    .get_or_fetch(&"shared", || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(42)
                    })
                    .await;
                value.unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = cache(60_000, 120_000);
        let _: Result<u32, String> = cache.get_or_fetch(&"k", || async { Ok(1) }).await;
        cache.invalidate(&"k");
        let value: Result<u32, String> = cache.get_or_fetch(&"k", || async { Ok(2) }).await;
        assert_eq!(value.unwrap(), 2);
    }

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CostSource for CountingSource {
        async fn fetch_costs(&self, _query: &CostQuery) -> Result<Vec<CostRecord>, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_cached_source_keys_on_filters() {
        let inner = Arc::new(CountingSource { calls: AtomicUsize::new(0) });
        let source = CachedCostSource::new(inner.clone(), Duration::from_secs(60), Duration::from_secs(120));

        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        let query = CostQuery::for_range(crate::models::DateRange::new(start, end));
        let mut filtered = query.clone();
        filtered.provider = Some("aws".into());

        source.fetch_costs(&query).await.unwrap();
        source.fetch_costs(&query).await.unwrap();
        source.fetch_costs(&filtered).await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(source.stats().hits, 1);
    }
}
