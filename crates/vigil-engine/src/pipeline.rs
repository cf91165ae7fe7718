//! Fixed-order filter composition. The worker runs every packet through
//! this exact sequence; the first stage to short-circuit decides the
//! verdict.

use std::sync::Arc;

use vigil_core::{Filter, FilterKind, PacketView};
use vigil_filters::{
    AsnFeedFilter, DomainFeedFilter, DomainListFilter, GeoFilter, IpListFilter, Ja3FeedFilter,
    RateLimiterFilter, SubnetFeedFilter,
};

/// Outcome of running a packet through the pipeline: whether to accept it,
/// which stage decided, and a stable reason string for logging.
#[derive(Clone, Copy, Debug)]
pub struct Verdict {
    pub accept: bool,
    pub kind: FilterKind,
    pub reason: &'static str,
}

impl Verdict {
    fn accept(kind: FilterKind, reason: &'static str) -> Self {
        Self { accept: true, kind, reason }
    }

    fn drop(kind: FilterKind, reason: &'static str) -> Self {
        Self { accept: false, kind, reason }
    }
}

/// Every filter slot the daemon wires up, held in the fixed order the
/// pipeline must honor. Feed-backed stages that admit more than one
/// configured source (subnet/domain feeds, ASN feeds) are plural; the
/// admin-managed lists and the geo/JA3/rate stages are singular.
pub struct Pipeline {
    pub ip_allow: Arc<IpListFilter>,
    pub rate_limiter: Arc<RateLimiterFilter>,
    pub ip_deny: Arc<IpListFilter>,
    pub subnet_feeds: Vec<Arc<SubnetFeedFilter>>,
    pub geo: Arc<GeoFilter>,
    pub asn_feeds: Vec<Arc<AsnFeedFilter>>,
    pub domain_allow: Arc<DomainListFilter>,
    pub domain_deny: Arc<DomainListFilter>,
    pub domain_feeds: Vec<Arc<DomainFeedFilter>>,
    pub ja3: Arc<Ja3FeedFilter>,
}

impl Pipeline {
    /// Runs the fixed composition order from the pipeline design: allow
    /// short-circuit, rate limiter, deny-list, subnet feeds, geo, ASN
    /// feeds, domain allow short-circuit, domain deny + feeds, JA3,
    /// default accept.
    pub fn evaluate(&self, packet: &PacketView<'_>) -> Verdict {
        if self.ip_allow.matches(packet) {
            return Verdict::accept(FilterKind::Ip, self.ip_allow.name());
        }
        if !self.rate_limiter.check(packet) {
            return Verdict::drop(FilterKind::Rate, self.rate_limiter.name());
        }
        if self.ip_deny.matches(packet) {
            return Verdict::drop(FilterKind::Ip, self.ip_deny.name());
        }
        for feed in &self.subnet_feeds {
            if !feed.check(packet) {
                return Verdict::drop(FilterKind::Ip, feed.name());
            }
        }
        if !self.geo.check(packet) {
            return Verdict::drop(FilterKind::Geo, self.geo.name());
        }
        for feed in &self.asn_feeds {
            if !feed.check(packet) {
                return Verdict::drop(FilterKind::Asn, feed.name());
            }
        }
        if self.domain_allow.matches(packet) {
            return Verdict::accept(FilterKind::Domain, self.domain_allow.name());
        }
        if self.domain_deny.matches(packet) {
            return Verdict::drop(FilterKind::Domain, self.domain_deny.name());
        }
        for feed in &self.domain_feeds {
            if !feed.check(packet) {
                return Verdict::drop(FilterKind::Domain, feed.name());
            }
        }
        if !self.ja3.check(packet) {
            return Verdict::drop(FilterKind::Ja3, self.ja3.name());
        }
        Verdict::accept(FilterKind::Meta, "default")
    }

    /// Every filter, for startup `load` and the periodic refresher. Order
    /// doesn't matter here beyond the geo filter populating its ASN table
    /// before the ASN-feed filters' first `check` — `load` only resets
    /// state to empty, so that ordering constraint binds `update`, not
    /// `load`, and the refresher runs sequentially regardless.
    pub fn all_filters(&self) -> Vec<Arc<dyn Filter>> {
        let mut filters: Vec<Arc<dyn Filter>> = vec![
            self.ip_allow.clone(),
            self.rate_limiter.clone(),
            self.ip_deny.clone(),
            self.geo.clone(),
            self.domain_allow.clone(),
            self.domain_deny.clone(),
            self.ja3.clone(),
        ];
        filters.extend(self.subnet_feeds.iter().cloned().map(|f| f as Arc<dyn Filter>));
        filters.extend(self.asn_feeds.iter().cloned().map(|f| f as Arc<dyn Filter>));
        filters.extend(self.domain_feeds.iter().cloned().map(|f| f as Arc<dyn Filter>));
        filters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use vigil_core::{parse_prefix, CountryList};

    fn udp_packet(src: Ipv4Addr) -> Vec<u8> {
        let mut buf = vec![0u8; 28];
        buf[0] = 0x45;
        buf[2] = 0;
        buf[3] = 28;
        buf[9] = 17;
        buf[12..16].copy_from_slice(&src.octets());
        buf[16..20].copy_from_slice(&[8, 8, 8, 8]);
        buf
    }

    fn empty_pipeline() -> Pipeline {
        Pipeline {
            ip_allow: Arc::new(IpListFilter::allow_list("ip-allow")),
            rate_limiter: Arc::new(RateLimiterFilter::new(
                "rate-limiter",
                1_000_000.0,
                1_000_000.0,
                64,
                std::time::Duration::from_secs(60),
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

    #[test]
    fn allow_list_short_circuits_before_any_deny_stage() {
        let pipeline = empty_pipeline();
        pipeline.ip_allow.list().upsert(&[parse_prefix("10.0.0.0/8").unwrap()]).unwrap();
        pipeline.ip_deny.list().upsert(&[parse_prefix("10.0.0.0/8").unwrap()]).unwrap();

        let pkt = udp_packet(Ipv4Addr::new(10, 1, 1, 1));
        let view = PacketView::new(&pkt).unwrap();
        let verdict = pipeline.evaluate(&view);
        assert!(verdict.accept);
        assert_eq!(verdict.reason, "ip-allow");
    }

    #[test]
    fn deny_list_hit_reports_the_feed_name() {
        let pipeline = empty_pipeline();
        pipeline.ip_deny.list().upsert(&[parse_prefix("185.220.101.0/24").unwrap()]).unwrap();

        let pkt = udp_packet(Ipv4Addr::new(185, 220, 101, 7));
        let view = PacketView::new(&pkt).unwrap();
        let verdict = pipeline.evaluate(&view);
        assert!(!verdict.accept);
        assert_eq!(verdict.kind, FilterKind::Ip);
        assert_eq!(verdict.reason, "ip-deny");
    }

    #[test]
    fn unmatched_packet_falls_through_to_default_accept() {
        let pipeline = empty_pipeline();
        let pkt = udp_packet(Ipv4Addr::new(4, 4, 4, 4));
        let view = PacketView::new(&pkt).unwrap();
        let verdict = pipeline.evaluate(&view);
        assert!(verdict.accept);
        assert_eq!(verdict.kind, FilterKind::Meta);
    }
}
