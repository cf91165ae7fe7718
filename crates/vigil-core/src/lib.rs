//! Shared data model for the vigil packet firewall: the admin-managed and
//! feed-backed lists, the lazy packet view, the filter contract, the
//! lock-free rate limiter, and the injectable clock used to test it all
//! without a real timer.

pub mod error;
pub mod filter;
pub mod list;
pub mod packet;
pub mod rate;
pub mod time;

pub use error::{FirewallError, Result};
pub use filter::{Filter, FilterContext, FilterKind};
pub use list::{parse_prefix, Asn, AsnList, CountryList, DomainList, SubnetList};
pub use packet::PacketView;
pub use rate::{BucketCache, TokenBucket};
