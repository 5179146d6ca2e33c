//! Check result cache.
//!
//! A capacity-bounded LRU map from (client, user, privilege) to the decision
//! last resolved for it. Each entry remembers the generation of the state it
//! was resolved against and the buckets its resolution visited:
//!
//! - a lookup only hits if the entry's generation equals the caller's
//!   snapshot generation;
//! - an insert computed against a superseded state is refused;
//! - invalidation after a commit either drops everything, or drops only the
//!   entries whose path touches a mutated bucket and re-stamps the rest.

use parking_lot::Mutex;
use privd_core::InvalidationMode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

use crate::model::Decision;
use crate::store::TouchedBuckets;

/// Default number of cached results.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

type CacheKey = (String, String, String);

#[derive(Debug, Clone)]
struct CacheEntry {
    decision: Decision,
    path: Vec<String>,
    generation: u64,
    tick: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    recency: BTreeMap<u64, CacheKey>,
    next_tick: u64,
    generation: u64,
    stats: CacheStats,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,

    /// Lookups that fell through to the resolver.
    pub misses: u64,

    /// Entries evicted to respect the capacity.
    pub evictions: u64,

    /// Entries dropped by invalidation.
    pub invalidated: u64,

    /// Entries currently held.
    pub entries: usize,
}

/// An LRU cache of check decisions.
#[derive(Debug)]
pub struct ResultCache {
    capacity: usize,
    mode: InvalidationMode,
    state: Mutex<CacheState>,
}

impl ResultCache {
    /// Create a cache holding at most `capacity` entries; zero disables it.
    pub fn new(capacity: usize, mode: InvalidationMode) -> Self {
        Self {
            capacity,
            mode,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// A cache that stores nothing.
    pub fn disabled() -> Self {
        Self::new(0, InvalidationMode::Global)
    }

    /// Whether the cache stores anything.
    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The configured invalidation mode.
    pub fn mode(&self) -> InvalidationMode {
        self.mode
    }

    /// Look up a decision resolved against state `generation`.
    pub fn get(
        &self,
        client: &str,
        user: &str,
        privilege: &str,
        generation: u64,
    ) -> Option<Decision> {
        if !self.is_enabled() {
            return None;
        }

        let key = (client.to_string(), user.to_string(), privilege.to_string());
        let mut state = self.state.lock();
        let tick = state.tick();

        let hit = match state.entries.get_mut(&key) {
            Some(entry) if entry.generation == generation => {
                let previous = entry.tick;
                entry.tick = tick;
                Some((previous, entry.decision.clone()))
            }
            _ => None,
        };

        match hit {
            Some((previous, decision)) => {
                state.recency.remove(&previous);
                state.recency.insert(tick, key);
                state.stats.hits += 1;
                Some(decision)
            }
            None => {
                state.stats.misses += 1;
                None
            }
        }
    }

    /// Store a decision resolved against state `generation` through `path`.
    ///
    /// Returns whether the entry was stored. `ASK` decisions and decisions
    /// from a state older than the last invalidation are refused.
    pub fn insert(
        &self,
        client: &str,
        user: &str,
        privilege: &str,
        decision: &Decision,
        path: &[String],
        generation: u64,
    ) -> bool {
        if !self.is_enabled() || !decision.verdict.is_cacheable() {
            return false;
        }

        let mut state = self.state.lock();
        if generation < state.generation {
            trace!(generation, current = state.generation, "Refused stale cache insert");
            return false;
        }
        if generation > state.generation {
            // The store advanced without invalidating us.
            let dropped = state.entries.len() as u64;
            state.stats.invalidated += dropped;
            state.clear();
            state.generation = generation;
        }

        let mut path = path.to_vec();
        path.sort_unstable();
        path.dedup();

        let key = (client.to_string(), user.to_string(), privilege.to_string());
        let tick = state.tick();
        let entry = CacheEntry {
            decision: decision.clone(),
            path,
            generation,
            tick,
        };

        if let Some(previous) = state.entries.insert(key.clone(), entry) {
            state.recency.remove(&previous.tick);
        }
        state.recency.insert(tick, key);

        while state.entries.len() > self.capacity {
            let Some((_, oldest)) = state.recency.pop_first() else {
                break;
            };
            state.entries.remove(&oldest);
            state.stats.evictions += 1;
        }

        true
    }

    /// Invalidate after a commit that produced state `generation` and
    /// mutated `touched`.
    pub fn invalidate(&self, touched: &TouchedBuckets, generation: u64) {
        let mut state = self.state.lock();
        let previous = state.generation;
        state.generation = generation.max(previous);

        let before = state.entries.len();
        // Restamping is only sound for the commit directly after `previous`;
        // any skipped generation may have changed buckets we never heard of.
        let contiguous = generation == previous + 1;
        match self.mode {
            InvalidationMode::Global => state.clear(),
            InvalidationMode::Scoped if !contiguous => state.clear(),
            InvalidationMode::Scoped => {
                let current = state.generation;
                let CacheState {
                    entries, recency, ..
                } = &mut *state;
                entries.retain(|_, entry| {
                    let keep = entry.generation == previous
                        && !entry.path.iter().any(|bucket| touched.contains(bucket));
                    if keep {
                        entry.generation = current;
                    } else {
                        recency.remove(&entry.tick);
                    }
                    keep
                });
            }
        }

        let dropped = before - state.entries.len();
        state.stats.invalidated += dropped as u64;
        trace!(
            generation,
            dropped,
            kept = state.entries.len(),
            "Invalidated result cache"
        );
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let dropped = state.entries.len() as u64;
        state.stats.invalidated += dropped;
        state.clear();
    }

    /// Number of entries held.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entries: state.entries.len(),
            ..state.stats
        }
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, InvalidationMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Verdict;

    fn decision(verdict: Verdict) -> Decision {
        Decision {
            verdict,
            extra: None,
        }
    }

    fn path(buckets: &[&str]) -> Vec<String> {
        buckets.iter().map(|b| b.to_string()).collect()
    }

    #[test]
    fn test_insert_and_get() {
        let cache = ResultCache::new(10, InvalidationMode::Scoped);
        assert!(cache.insert("c", "u", "p", &decision(Verdict::Allow), &path(&[""]), 0));
        assert_eq!(cache.get("c", "u", "p", 0), Some(decision(Verdict::Allow)));
        assert_eq!(cache.get("c", "u", "other", 0), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_ask_is_not_cached() {
        let cache = ResultCache::default();
        assert!(!cache.insert("c", "u", "p", &decision(Verdict::Ask), &path(&[""]), 0));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_disabled_cache() {
        let cache = ResultCache::disabled();
        assert!(!cache.insert("c", "u", "p", &decision(Verdict::Allow), &path(&[""]), 0));
        assert_eq!(cache.get("c", "u", "p", 0), None);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = ResultCache::new(2, InvalidationMode::Scoped);
        let allow = decision(Verdict::Allow);
        cache.insert("a", "u", "p", &allow, &path(&[""]), 0);
        cache.insert("b", "u", "p", &allow, &path(&[""]), 0);

        // Touch "a" so "b" becomes the oldest.
        assert!(cache.get("a", "u", "p", 0).is_some());
        cache.insert("c", "u", "p", &allow, &path(&[""]), 0);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a", "u", "p", 0).is_some());
        assert!(cache.get("b", "u", "p", 0).is_none());
        assert!(cache.get("c", "u", "p", 0).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_generation_mismatch_misses() {
        let cache = ResultCache::default();
        cache.insert("c", "u", "p", &decision(Verdict::Deny), &path(&[""]), 3);
        assert!(cache.get("c", "u", "p", 4).is_none());
        assert!(cache.get("c", "u", "p", 3).is_some());
    }

    #[test]
    fn test_stale_insert_is_refused() {
        let cache = ResultCache::default();
        cache.invalidate(&TouchedBuckets::new(), 5);
        assert!(!cache.insert("c", "u", "p", &decision(Verdict::Allow), &path(&[""]), 4));
        assert!(cache.insert("c", "u", "p", &decision(Verdict::Allow), &path(&[""]), 5));
    }

    #[test]
    fn test_newer_insert_flushes_older_entries() {
        let cache = ResultCache::default();
        cache.insert("a", "u", "p", &decision(Verdict::Allow), &path(&[""]), 0);
        cache.insert("b", "u", "p", &decision(Verdict::Allow), &path(&[""]), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("b", "u", "p", 1).is_some());
    }

    #[test]
    fn test_scoped_invalidation() {
        let cache = ResultCache::new(10, InvalidationMode::Scoped);
        let allow = decision(Verdict::Allow);
        cache.insert("a", "u", "p", &allow, &path(&["", "apps"]), 0);
        cache.insert("b", "u", "p", &allow, &path(&["", "games"]), 0);

        cache.invalidate(&TouchedBuckets::from(["apps".to_string()]), 1);

        assert!(cache.get("a", "u", "p", 1).is_none());
        assert_eq!(cache.get("b", "u", "p", 1), Some(allow));
        assert_eq!(cache.stats().invalidated, 1);
    }

    #[test]
    fn test_invalidation_after_skipped_generation_clears() {
        let cache = ResultCache::new(10, InvalidationMode::Scoped);
        let deny = decision(Verdict::Deny);
        cache.insert("a", "u", "p", &deny, &path(&[""]), 0);

        // Generation 1 was committed without telling the cache.
        cache.invalidate(&TouchedBuckets::from(["other".to_string()]), 2);

        assert!(cache.is_empty());
        assert!(cache.get("a", "u", "p", 2).is_none());
        assert_eq!(cache.stats().invalidated, 1);
    }

    #[test]
    fn test_global_invalidation() {
        let cache = ResultCache::new(10, InvalidationMode::Global);
        let allow = decision(Verdict::Allow);
        cache.insert("a", "u", "p", &allow, &path(&["", "apps"]), 0);
        cache.insert("b", "u", "p", &allow, &path(&["", "games"]), 0);

        cache.invalidate(&TouchedBuckets::from(["apps".to_string()]), 1);
        assert!(cache.is_empty());
    }
}
