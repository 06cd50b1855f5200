use crate::text::truncate_chars;
use catalog_types::matching::MatchResult;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use xxhash_rust::xxh3::xxh3_64;

pub const MATCH_CACHE_TTL: Duration = Duration::from_secs(30 * 60);
pub const MATCH_CACHE_SWEEP_THRESHOLD: usize = 100;
const DESCRIPTION_KEY_PREFIX: usize = 200;

#[derive(Clone, Debug)]
pub struct CacheEntry<T> {
    value: T,
    fetched_at: Instant,
    ttl: Duration,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, fetched_at: Instant, ttl: Duration) -> Self {
        Self {
            value,
            fetched_at,
            ttl,
        }
    }

    pub fn is_valid(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) < self.ttl
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MatchKey(u64);

impl MatchKey {
    pub fn new(title: &str, description: &str, top_n: usize) -> Self {
        let title = title.trim().to_lowercase();
        let description = description.trim().to_lowercase();
        let description = truncate_chars(&description, DESCRIPTION_KEY_PREFIX);
        Self(xxh3_64(
            format!("{title}\u{1f}{description}\u{1f}{top_n}").as_bytes(),
        ))
    }
}

#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MatchCacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Removes every entry older than `ttl`, returns how many were dropped.
pub fn sweep_expired<K, T>(
    entries: &mut HashMap<K, CacheEntry<T>>,
    now: Instant,
    ttl: Duration,
) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| now.saturating_duration_since(entry.fetched_at) <= ttl);
    before - entries.len()
}

/// Short-lived memo of matcher output. Swept on insert once it grows past
/// the threshold, no background timer.
pub struct MatchResultCache {
    entries: HashMap<MatchKey, CacheEntry<Arc<Vec<MatchResult>>>>,
    ttl: Duration,
    sweep_threshold: usize,
    hits: u64,
    misses: u64,
}

impl MatchResultCache {
    pub fn new(ttl: Duration, sweep_threshold: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            sweep_threshold,
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, key: &MatchKey, now: Instant) -> Option<Arc<Vec<MatchResult>>> {
        match self.entries.get(key) {
            Some(entry) if entry.is_valid(now) => {
                self.hits += 1;
                Some(entry.value().clone())
            }
            Some(_) => {
                self.entries.remove(key);
                self.misses += 1;
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn put(&mut self, key: MatchKey, results: Arc<Vec<MatchResult>>, now: Instant) {
        self.entries
            .insert(key, CacheEntry::new(results, now, self.ttl));
        if self.entries.len() > self.sweep_threshold {
            let removed = sweep_expired(&mut self.entries, now, self.ttl);
            if removed > 0 {
                log::debug!(
                    "Match cache sweep removed {removed} entries, {} left",
                    self.entries.len()
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> MatchCacheStats {
        MatchCacheStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}

impl Default for MatchResultCache {
    fn default() -> Self {
        Self::new(MATCH_CACHE_TTL, MATCH_CACHE_SWEEP_THRESHOLD)
    }
}
