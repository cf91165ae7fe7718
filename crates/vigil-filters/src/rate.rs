use std::sync::Arc;
use std::time::Duration;

use vigil_core::{BucketCache, Filter, FilterContext, FilterKind, FirewallError, PacketView};
use vigil_core::time::{Clock, SystemClock};

/// Per-source-IP token-bucket rate limiter, backed by a bounded/TTL'd
/// bucket cache so memory use doesn't grow with the number of distinct
/// source IPs ever seen.
pub struct RateLimiterFilter {
    name: &'static str,
    rate: f64,
    burst: f64,
    cache: BucketCache,
    clock: Arc<dyn Clock>,
}

impl RateLimiterFilter {
    pub fn new(name: &'static str, rate: f64, burst: f64, cache_size: usize, cache_ttl: Duration) -> Self {
        Self::with_clock(name, rate, burst, cache_size, cache_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(
        name: &'static str,
        rate: f64,
        burst: f64,
        cache_size: usize,
        cache_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name,
            rate,
            burst,
            cache: BucketCache::new(cache_size, cache_ttl, clock.as_ref()),
            clock,
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait::async_trait]
impl Filter for RateLimiterFilter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Rate
    }

    async fn load(&self, _ctx: &FilterContext) -> Result<(), FirewallError> {
        Ok(())
    }

    fn check(&self, packet: &PacketView<'_>) -> bool {
        let bucket = self
            .cache
            .get_or_create(packet.src_ip(), self.clock.as_ref(), self.burst);
        bucket.allow(self.clock.as_ref(), self.rate, self.burst)
    }

    async fn update(&self, _ctx: &FilterContext) -> Result<(), FirewallError> {
        Ok(())
    }
}
