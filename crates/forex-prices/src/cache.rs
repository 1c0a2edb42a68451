//! TTL cache for quotes
//!
//! One process-wide map from pair to `(quote, fetched_at)`. An entry is valid
//! while `now - fetched_at <= ttl`; expired entries are dropped the next time
//! they are read. There is no single-flight: concurrent misses may each fetch
//! upstream, and the last writer wins.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use forex_core::{CurrencyPair, PriceQuote};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::clock::{Clock, SystemClock};

#[derive(Debug, Clone)]
struct CachedQuote {
    quote: PriceQuote,
    fetched_at: Instant,
}

/// Snapshot of cache contents
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub cached_pairs: Vec<String>,
    /// Age of the oldest entry
    pub oldest_entry_age: Option<Duration>,
    pub ttl: Duration,
}

/// Thread-safe cache for quotes
#[derive(Debug, Clone)]
pub struct PriceCache {
    entries: Arc<RwLock<HashMap<CurrencyPair, CachedQuote>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl PriceCache {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a cache that reads time from `clock`
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, entry: &CachedQuote, now: Instant) -> bool {
        now.saturating_duration_since(entry.fetched_at) <= self.ttl
    }

    /// Get a quote if a valid entry exists
    pub async fn get(&self, pair: &CurrencyPair) -> Option<PriceQuote> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().await;
            match entries.get(pair) {
                Some(entry) if self.is_fresh(entry, now) => return Some(entry.quote.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: evict unless another writer refreshed it meanwhile
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(pair) {
            if self.is_fresh(entry, now) {
                return Some(entry.quote.clone());
            }
            tracing::debug!(%pair, "Evicting expired quote");
            entries.remove(pair);
        }
        None
    }

    /// Insert a quote stamped with the current time
    pub async fn insert(&self, pair: CurrencyPair, quote: PriceQuote) {
        let fetched_at = self.clock.now();
        let mut entries = self.entries.write().await;
        entries.insert(pair, CachedQuote { quote, fetched_at });
    }

    /// Get or fetch a quote using the provided fetcher function
    ///
    /// If a valid quote is cached, it's returned immediately.
    /// Otherwise, the fetcher function is called and a successful result is cached.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        pair: &CurrencyPair,
        fetcher: F,
    ) -> Result<PriceQuote, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<PriceQuote, E>>,
    {
        if let Some(quote) = self.get(pair).await {
            tracing::debug!(%pair, "Cache hit");
            return Ok(quote);
        }

        tracing::debug!(%pair, "Cache miss");
        let quote = fetcher().await?;
        self.insert(pair.clone(), quote.clone()).await;
        Ok(quote)
    }

    /// Invalidate a specific cache entry
    pub async fn invalidate(&self, pair: &CurrencyPair) {
        let mut entries = self.entries.write().await;
        entries.remove(pair);
    }

    /// Clear all cached entries
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }

    /// Get the number of cached entries, expired ones included
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        let mut cached_pairs: Vec<String> = entries.keys().map(ToString::to_string).collect();
        cached_pairs.sort();
        CacheStats {
            size: entries.len(),
            cached_pairs,
            oldest_entry_age: entries
                .values()
                .map(|e| now.saturating_duration_since(e.fetched_at))
                .max(),
            ttl: self.ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Utc;

    fn pair(s: &str) -> CurrencyPair {
        s.parse().unwrap()
    }

    fn quote(p: &str, price: f64) -> PriceQuote {
        PriceQuote {
            pair: pair(p),
            price,
            bid: price,
            ask: price,
            timestamp: Utc::now(),
            source: "test".to_string(),
        }
    }

    fn cache_with_clock() -> (PriceCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = PriceCache::with_clock(Duration::from_secs(60), clock.clone());
        (cache, clock)
    }

    #[tokio::test]
    async fn test_cache_insert_and_get() {
        let cache = PriceCache::new(Duration::from_secs(60));
        cache.insert(pair("EUR/USD"), quote("EUR/USD", 1.08)).await;
        assert_eq!(cache.get(&pair("EUR/USD")).await.unwrap().price, 1.08);
        assert!(cache.get(&pair("GBP/USD")).await.is_none());
    }

    #[tokio::test]
    async fn test_entry_valid_through_ttl_and_evicted_after() {
        let (cache, clock) = cache_with_clock();
        cache.insert(pair("EUR/USD"), quote("EUR/USD", 1.08)).await;

        clock.advance(Duration::from_secs(60));
        assert!(cache.get(&pair("EUR/USD")).await.is_some(), "valid at exactly ttl");

        clock.advance(Duration::from_millis(1));
        assert!(cache.get(&pair("EUR/USD")).await.is_none());
        assert_eq!(cache.len().await, 0, "expired entry evicted on read");
    }

    #[tokio::test]
    async fn test_cache_get_or_fetch() {
        let cache = PriceCache::new(Duration::from_secs(60));
        let mut call_count = 0;

        let result = cache
            .get_or_fetch(&pair("XAU/USD"), || {
                call_count += 1;
                async { Ok::<_, String>(quote("XAU/USD", 2650.0)) }
            })
            .await
            .unwrap();
        assert_eq!(result.price, 2650.0);

        let result = cache
            .get_or_fetch(&pair("XAU/USD"), || {
                call_count += 1;
                async { Ok::<_, String>(quote("XAU/USD", 1.0)) }
            })
            .await
            .unwrap();
        assert_eq!(result.price, 2650.0);
        assert_eq!(call_count, 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let cache = PriceCache::new(Duration::from_secs(60));
        let result = cache
            .get_or_fetch(&pair("EUR/USD"), || async { Err::<PriceQuote, _>("down") })
            .await;
        assert_eq!(result.unwrap_err(), "down");
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_cache_invalidation_and_clear() {
        let cache = PriceCache::new(Duration::from_secs(60));
        for p in ["EUR/USD", "GBP/USD", "XAU/USD"] {
            cache.insert(pair(p), quote(p, 1.0)).await;
        }
        cache.invalidate(&pair("GBP/USD")).await;
        assert_eq!(cache.len().await, 2);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_stats() {
        let (cache, clock) = cache_with_clock();
        assert_eq!(cache.stats().await.oldest_entry_age, None);

        cache
            .insert(pair("XAU/USD"), quote("XAU/USD", 2650.0))
            .await;
        clock.advance(Duration::from_secs(10));
        cache.insert(pair("EUR/USD"), quote("EUR/USD", 1.08)).await;

        let stats = cache.stats().await;
        assert_eq!(stats.size, 2);
        assert_eq!(stats.cached_pairs, vec!["EUR/USD", "XAU/USD"]);
        assert_eq!(stats.oldest_entry_age, Some(Duration::from_secs(10)));
    }
}
