//! LRU cache of span distributions.
//!
//! Discussion threads repeat short clauses ("love her", "ugh") constantly,
//! so the model is only consulted once per distinct span text.
//! Default: 10 000 entries, 6-hour TTL.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::scorer::SentimentDistribution;

struct Slot {
    distribution: SentimentDistribution,
    stored_at: Instant,
}

struct Lru {
    slots: HashMap<String, Slot>,
    /// Least recently used at the front.
    recency: VecDeque<String>,
    capacity: usize,
    ttl: Duration,
}

impl Lru {
    fn touch(&mut self, span: &str) {
        if let Some(pos) = self.recency.iter().position(|k| k == span) {
            if let Some(key) = self.recency.remove(pos) {
                self.recency.push_back(key);
            }
        }
    }

    fn forget(&mut self, span: &str) {
        self.slots.remove(span);
        self.recency.retain(|k| k != span);
    }
}

/// Thread-safe LRU cache keyed by span text.
pub struct ScoreCache {
    inner: Mutex<Lru>,
}

impl ScoreCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Lru {
                slots: HashMap::with_capacity(capacity),
                recency: VecDeque::with_capacity(capacity),
                capacity: capacity.max(1),
                ttl,
            }),
        }
    }

    pub fn default_cache() -> Self {
        Self::new(10_000, Duration::from_secs(6 * 3600))
    }

    /// Cached distribution for a span, or None on miss / expiry.
    pub fn get(&self, span: &str) -> Option<SentimentDistribution> {
        let mut lru = self.inner.lock();
        let ttl = lru.ttl;
        let (distribution, fresh) = match lru.slots.get(span) {
            Some(slot) => (slot.distribution, slot.stored_at.elapsed() < ttl),
            None => return None,
        };
        if fresh {
            lru.touch(span);
            Some(distribution)
        } else {
            lru.forget(span);
            None
        }
    }

    pub fn put(&self, span: String, distribution: SentimentDistribution) {
        let mut lru = self.inner.lock();
        if lru.slots.contains_key(&span) {
            lru.forget(&span);
        }
        while lru.slots.len() >= lru.capacity {
            match lru.recency.pop_front() {
                Some(oldest) => {
                    lru.slots.remove(&oldest);
                }
                None => break,
            }
        }
        lru.recency.push_back(span.clone());
        lru.slots.insert(
            span,
            Slot {
                distribution,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist(p: f32) -> SentimentDistribution {
        SentimentDistribution {
            negative: 0.0,
            neutral: 1.0 - p,
            positive: p,
        }
    }

    #[test]
    fn test_hit_and_miss() {
        let cache = ScoreCache::new(4, Duration::from_secs(60));
        assert!(cache.get("she is iconic").is_none());
        cache.put("she is iconic".into(), dist(0.9));
        assert_eq!(cache.get("she is iconic"), Some(dist(0.9)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evicts_least_recent() {
        let cache = ScoreCache::new(2, Duration::from_secs(60));
        cache.put("a".into(), dist(0.1));
        cache.put("b".into(), dist(0.2));
        // Reading "a" makes "b" the eviction candidate.
        assert!(cache.get("a").is_some());
        cache.put("c".into(), dist(0.3));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_expiry() {
        let cache = ScoreCache::new(4, Duration::from_millis(1));
        cache.put("fleeting".into(), dist(0.5));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("fleeting").is_none());
        assert!(cache.is_empty());
    }
}
