use std::time::Duration;

use crate::error::FirewallError;
use crate::packet::PacketView;

/// What a filter inspects, used for log/metric labels and as the category
/// dimension the control plane routes admin requests against. `Empty`
/// labels a pipeline stage with nothing loaded yet; `Meta` labels verdicts
/// issued before any filter runs at all (decode failure, empty payload).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FilterKind {
    Empty,
    Ip,
    Asn,
    Geo,
    Domain,
    Ja3,
    Rate,
    Meta,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Empty => "empty",
            FilterKind::Ip => "ip",
            FilterKind::Asn => "asn",
            FilterKind::Geo => "geo",
            FilterKind::Domain => "domain",
            FilterKind::Ja3 => "ja3",
            FilterKind::Rate => "rate",
            FilterKind::Meta => "meta",
        }
    }
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context handed to `load`/`update`: an HTTP client for feed filters and a
/// deadline the call must respect. Filters that don't fetch anything (the
/// admin-managed lists) ignore it.
pub struct FilterContext {
    pub http: reqwest::Client,
    pub timeout: Duration,
}

/// Uniform contract every pipeline stage implements, whether it wraps an
/// admin-managed list or an externally fetched feed.
///
/// `check` runs on the packet hot path and must never block or allocate
/// beyond what `PacketView`'s own memoization already does. `load` runs once
/// at startup and is allowed to fail the whole boot. `update` runs on a
/// timer and must leave the previously loaded state untouched on failure —
/// callers never observe a partially built snapshot.
#[async_trait::async_trait]
pub trait Filter: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> FilterKind;

    async fn load(&self, ctx: &FilterContext) -> Result<(), FirewallError>;

    fn check(&self, packet: &PacketView<'_>) -> bool;

    async fn update(&self, ctx: &FilterContext) -> Result<(), FirewallError>;
}
