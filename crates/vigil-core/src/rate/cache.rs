use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::bucket::TokenBucket;
use crate::time::Clock;

struct Entry {
    bucket: Arc<TokenBucket>,
    last_seen_ns: AtomicU64,
}

/// Bounded cache of per-source-IP token buckets. Entries older than `ttl`
/// are swept opportunistically whenever the cache grows past `capacity`, so
/// memory stays roughly flat without a dedicated eviction thread. Eviction
/// is approximate (not a strict LRU) in keeping with the rate limiter's
/// own lock-free, best-effort character.
pub struct BucketCache {
    entries: DashMap<Ipv4Addr, Entry>,
    capacity: usize,
    ttl: Duration,
    epoch: Instant,
}

impl BucketCache {
    pub fn new(capacity: usize, ttl: Duration, clock: &dyn Clock) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity.min(1024)),
            capacity,
            ttl,
            epoch: clock.now(),
        }
    }

    fn now_ns(&self, clock: &dyn Clock) -> u64 {
        clock.now().duration_since(self.epoch).as_nanos() as u64
    }

    /// Returns the bucket for `ip`, creating one with a full `burst` balance
    /// on first sight. Always touches `last_seen` so the entry survives the
    /// next sweep.
    pub fn get_or_create(&self, ip: Ipv4Addr, clock: &dyn Clock, burst: f64) -> Arc<TokenBucket> {
        let now_ns = self.now_ns(clock);

        if let Some(entry) = self.entries.get(&ip) {
            entry.last_seen_ns.store(now_ns, Ordering::Relaxed);
            return Arc::clone(&entry.bucket);
        }

        if self.entries.len() >= self.capacity {
            self.sweep_expired(now_ns);
            if self.entries.len() >= self.capacity {
                self.evict_oldest();
            }
        }

        let bucket = Arc::new(TokenBucket::new(clock, burst));
        self.entries.insert(
            ip,
            Entry {
                bucket: Arc::clone(&bucket),
                last_seen_ns: AtomicU64::new(now_ns),
            },
        );
        bucket
    }

    fn sweep_expired(&self, now_ns: u64) {
        let ttl_ns = self.ttl.as_nanos() as u64;
        self.entries.retain(|_, entry| {
            let last = entry.last_seen_ns.load(Ordering::Relaxed);
            now_ns.saturating_sub(last) < ttl_ns
        });
    }

    /// Drops the entry with the oldest `last_seen_ns`. Only reached when a
    /// sweep at capacity freed nothing — every cached source is still
    /// within `ttl` — so capacity still bounds memory rather than growing
    /// with the number of distinct source IPs ever seen.
    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.last_seen_ns.load(Ordering::Relaxed))
            .map(|entry| *entry.key());
        if let Some(ip) = oldest {
            self.entries.remove(&ip);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::MockClock;

    #[test]
    fn same_ip_reuses_the_same_bucket() {
        let clock = MockClock::new();
        let cache = BucketCache::new(8, Duration::from_secs(60), &clock);
        let ip = Ipv4Addr::new(1, 2, 3, 4);
        let a = cache.get_or_create(ip, &clock, 5.0);
        let b = cache.get_or_create(ip, &clock, 5.0);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn expired_entries_are_swept_once_capacity_is_reached() {
        let clock = MockClock::new();
        let cache = BucketCache::new(2, Duration::from_secs(10), &clock);
        cache.get_or_create(Ipv4Addr::new(1, 1, 1, 1), &clock, 5.0);
        clock.advance(Duration::from_secs(20));
        cache.get_or_create(Ipv4Addr::new(2, 2, 2, 2), &clock, 5.0);
        assert_eq!(cache.len(), 1);

        // At capacity, the stale entry above is now gone; inserting a third
        // distinct IP should not be blocked by it.
        cache.get_or_create(Ipv4Addr::new(3, 3, 3, 3), &clock, 5.0);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn capacity_holds_even_when_nothing_has_expired() {
        let clock = MockClock::new();
        let cache = BucketCache::new(4, Duration::from_secs(60), &clock);
        for i in 0..5u8 {
            cache.get_or_create(Ipv4Addr::new(10, 0, 0, i), &clock, 5.0);
            assert!(cache.len() <= 4);
        }
        assert_eq!(cache.len(), 4);
    }
}
