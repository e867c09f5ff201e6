use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

use crate::fetcher::{validate_app_id, FetchFuture, History, SeriesFetcher, UpstreamFetchError};

/// Time source for entry expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = lock_or_recover(&self.now);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock_or_recover(&self.now)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("Cache mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub len: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct CacheEntry {
    series: History,
    stored_at: DateTime<Utc>,
    last_used: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl CacheInner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// Bounded least-recently-used cache of fetched histories, keyed by app id.
///
/// All access goes through one mutex; recency is a monotonically increasing
/// tick, and eviction scans for the smallest one.
pub struct SeriesCache<C: Clock = SystemClock> {
    inner: Mutex<CacheInner>,
    capacity: usize,
    ttl: Option<chrono::Duration>,
    clock: C,
}

impl SeriesCache<SystemClock> {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self::with_clock(capacity, ttl, SystemClock)
    }
}

impl<C: Clock> SeriesCache<C> {
    pub fn with_clock(capacity: usize, ttl: Option<Duration>, clock: C) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            capacity,
            ttl: ttl.and_then(|d| chrono::Duration::from_std(d).ok()),
            clock,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the cached series and marks it most recently used.
    /// Expired entries are dropped and count as a miss.
    pub fn get(&self, key: &str) -> Option<History> {
        let now = self.clock.now();
        let mut inner = lock_or_recover(&self.inner);

        let expired = inner
            .entries
            .get(key)
            .map(|entry| self.ttl.is_some_and(|ttl| now - entry.stored_at >= ttl));

        match expired {
            None => {
                inner.misses += 1;
                return None;
            }
            Some(true) => {
                inner.entries.remove(key);
                inner.misses += 1;
                debug!(app_id = key, "Cache entry expired");
                return None;
            }
            Some(false) => {}
        }

        let tick = inner.next_tick();
        inner.hits += 1;
        let entry = inner.entries.get_mut(key)?;
        entry.last_used = tick;
        Some(Arc::clone(&entry.series))
    }

    /// Stores `series`, evicting the least-recently-used entry when full.
    pub fn insert(&self, key: &str, series: History) {
        if self.capacity == 0 {
            return;
        }

        let stored_at = self.clock.now();
        let mut inner = lock_or_recover(&self.inner);
        let last_used = inner.next_tick();
        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                series,
                stored_at,
                last_used,
            },
        );

        while inner.entries.len() > self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    inner.entries.remove(&k);
                    inner.evictions += 1;
                    debug!(app_id = %k, "Evicted least-recently-used series");
                }
                None => break,
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        lock_or_recover(&self.inner).entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        lock_or_recover(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock_or_recover(&self.inner).entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let inner = lock_or_recover(&self.inner);
        CacheStats {
            len: inner.entries.len(),
            capacity: self.capacity,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }
}

/// Wraps a fetcher with a [`SeriesCache`] for histories.
///
/// Uncached history fetches are preceded by a fixed pause to stay under
/// upstream rate limits. Live player counts are never cached, and failed
/// fetches are not stored.
pub struct CachedFetcher<F, C: Clock = SystemClock> {
    inner: F,
    cache: SeriesCache<C>,
    delay: Duration,
}

impl<F: SeriesFetcher, C: Clock> CachedFetcher<F, C> {
    pub fn new(inner: F, cache: SeriesCache<C>, delay: Duration) -> Self {
        Self {
            inner,
            cache,
            delay,
        }
    }

    pub fn cache(&self) -> &SeriesCache<C> {
        &self.cache
    }

    pub async fn history(&self, app_id: &str) -> Result<History, UpstreamFetchError> {
        validate_app_id(app_id)?;
        if let Some(hit) = self.cache.get(app_id) {
            debug!(app_id = app_id, "History cache hit");
            return Ok(hit);
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let series = self.inner.fetch_history(app_id).await?;
        self.cache.insert(app_id, Arc::clone(&series));
        Ok(series)
    }
}

impl<F: SeriesFetcher, C: Clock> SeriesFetcher for CachedFetcher<F, C> {
    fn fetch_history<'a>(&'a self, app_id: &'a str) -> FetchFuture<'a, History> {
        Box::pin(self.history(app_id))
    }

    fn fetch_current_players<'a>(&'a self, app_id: &'a str) -> FetchFuture<'a, u64> {
        self.inner.fetch_current_players(app_id)
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        Some(self.cache.stats())
    }
}
