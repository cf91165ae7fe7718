//! Lock-free per-source-IP token bucket, plus a bounded cache of buckets so
//! memory stays flat regardless of how many distinct source IPs are seen.

mod bucket;
mod cache;

pub use bucket::TokenBucket;
pub use cache::BucketCache;
