use std::net::AddrParseError;

/// Stable error taxonomy shared across lists, packet decoding and filters.
///
/// Mirrors the error classes the worker and feed refresher must branch on:
/// a malformed packet is fail-open, a malformed list mutation is rejected
/// in full, a feed failure keeps the previous snapshot in force.
#[derive(Debug, thiserror::Error)]
pub enum FirewallError {
    /// The outer IPv4 layer could not be parsed. Callers must treat this as
    /// fail-open (accept), never propagate it into the kernel callback.
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    /// A list mutation (`Upsert`/`Remove`) contained an unparseable member.
    /// The caller MUST NOT apply any part of the batch.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A feed `update` failed to fetch its source. The previous snapshot
    /// remains published; this is logged and retried on the next interval.
    #[error("feed fetch failed for {source}: {cause}")]
    FeedFetch {
        source: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Opening a kernel queue failed. Fatal at startup.
    #[error("queue open failed (qnum={qnum}): {cause}")]
    QueueOpen {
        qnum: u16,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Persisting a list mutation to the backing store failed. The
    /// in-memory list has already been committed; this is surfaced to the
    /// control plane as a 500 and is replayable on next startup.
    #[error("persist failed: {0}")]
    Persist(String),
}

impl From<AddrParseError> for FirewallError {
    fn from(err: AddrParseError) -> Self {
        FirewallError::InvalidInput(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FirewallError>;
