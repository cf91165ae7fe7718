//! Concrete `Filter` implementations composed into the pipeline by
//! `vigil-engine`: admin-managed lists, feed-backed deny sets, geo/ASN
//! resolution and the rate limiter.

mod http;

pub mod domain;
pub mod domain_feed;
pub mod geo;
pub mod ip;
pub mod ja3;
pub mod rate;
pub mod subnet_feed;

pub use domain::DomainListFilter;
pub use domain_feed::DomainFeedFilter;
pub use geo::{AsnFeedFilter, GeoFilter};
pub use http::{fetch_bytes, fetch_text};
pub use ip::{Disposition, IpListFilter};
pub use ja3::Ja3FeedFilter;
pub use rate::RateLimiterFilter;
pub use subnet_feed::SubnetFeedFilter;
