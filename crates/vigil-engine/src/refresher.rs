//! Periodic feed refresh: every `interval`, every filter's `update` runs
//! serially against a shared timeout. A failing filter is logged and
//! skipped; its previously loaded state stays in force.

use std::sync::Arc;
use std::time::Duration;

use vigil_core::time::Clock;
use vigil_core::FilterContext;
use vigil_logger::{LogEvent, Logger};

use crate::pipeline::Pipeline;

pub struct FeedRefresher {
    pipeline: Arc<Pipeline>,
    http: reqwest::Client,
    interval: Duration,
    timeout: Duration,
    clock: Arc<dyn Clock>,
    logger: Logger,
}

impl FeedRefresher {
    pub fn new(
        pipeline: Arc<Pipeline>,
        http: reqwest::Client,
        interval: Duration,
        timeout: Duration,
        clock: Arc<dyn Clock>,
        logger: Logger,
    ) -> Self {
        Self { pipeline, http, interval, timeout, clock, logger }
    }

    /// Runs one `update` pass immediately (bounding the cold-start window
    /// instead of blocking startup on network reachability), then
    /// sleeps `interval` and repeats until `shutdown` fires.
    pub async fn run(self, mut shutdown: tokio::sync::oneshot::Receiver<()>) {
        loop {
            self.tick().await;
            tokio::select! {
                _ = self.clock.sleep(self.interval) => {}
                _ = &mut shutdown => break,
            }
        }
    }

    async fn tick(&self) {
        let ctx = FilterContext { http: self.http.clone(), timeout: self.timeout };
        for filter in self.pipeline.all_filters() {
            if let Err(err) = filter.update(&ctx).await {
                self.logger.log(LogEvent::Error {
                    message: format!("{} update failed: {err}", filter.name()),
                });
            }
        }
        metrics::gauge!("rate_limiter_cache_size").set(self.pipeline.rate_limiter.cache_len() as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::time::MockClock;
    use vigil_core::{CountryList, Filter};
    use vigil_filters::{DomainListFilter, GeoFilter, IpListFilter, Ja3FeedFilter, RateLimiterFilter};

    fn empty_pipeline() -> Pipeline {
        Pipeline {
            ip_allow: Arc::new(IpListFilter::allow_list("ip-allow")),
            rate_limiter: Arc::new(RateLimiterFilter::new(
                "rate-limiter",
                1.0,
                1.0,
                16,
                Duration::from_secs(60),
            )),
            ip_deny: Arc::new(IpListFilter::deny_list("ip-deny")),
            subnet_feeds: Vec::new(),
            geo: Arc::new(GeoFilter::new("geo", "http://example.invalid/geo.zip", Arc::new(CountryList::new()))),
            asn_feeds: Vec::new(),
            domain_allow: Arc::new(DomainListFilter::allow_list("domain-allow")),
            domain_deny: Arc::new(DomainListFilter::deny_list("domain-deny")),
            domain_feeds: Vec::new(),
            ja3: Arc::new(Ja3FeedFilter::new("ja3", "http://example.invalid/ja3.csv")),
        }
    }

    #[tokio::test]
    async fn tick_reports_the_rate_limiter_cache_size() {
        let pipeline = Arc::new(empty_pipeline());
        let pkt_src = std::net::Ipv4Addr::new(1, 2, 3, 4);
        let mut pkt = vec![0u8; 28];
        pkt[0] = 0x45;
        pkt[3] = 28;
        pkt[9] = 17;
        pkt[12..16].copy_from_slice(&pkt_src.octets());
        pkt[16..20].copy_from_slice(&[8, 8, 8, 8]);
        let view = vigil_core::PacketView::new(&pkt).unwrap();
        pipeline.rate_limiter.check(&view);
        assert_eq!(pipeline.rate_limiter.cache_len(), 1);

        let (logger, handles) = vigil_logger::Logger::spawn(8, 1);
        let refresher = FeedRefresher::new(
            pipeline,
            reqwest::Client::new(),
            Duration::from_secs(60),
            Duration::from_millis(50),
            Arc::new(MockClock::new()),
            logger.clone(),
        );
        refresher.tick().await;
        drop(logger);
        for handle in handles {
            handle.abort();
        }
    }

    #[tokio::test]
    async fn tick_runs_update_on_every_filter_without_panicking() {
        let pipeline = Arc::new(empty_pipeline());
        let (logger, handles) = vigil_logger::Logger::spawn(8, 1);
        let refresher = FeedRefresher::new(
            pipeline,
            reqwest::Client::new(),
            Duration::from_secs(60),
            Duration::from_millis(50),
            Arc::new(MockClock::new()),
            logger.clone(),
        );
        refresher.tick().await;
        drop(logger);
        for handle in handles {
            handle.abort();
        }
    }
}
