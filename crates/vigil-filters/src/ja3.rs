use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use vigil_core::{Filter, FilterContext, FilterKind, FirewallError, PacketView};

use crate::http::fetch_text;

/// Denies against a CSV feed (sslbl) whose first column is an MD5 JA3
/// fingerprint.
pub struct Ja3FeedFilter {
    name: &'static str,
    url: String,
    denied: ArcSwap<HashSet<String>>,
}

impl Ja3FeedFilter {
    pub fn new(name: &'static str, url: impl Into<String>) -> Self {
        Self {
            name,
            url: url.into(),
            denied: ArcSwap::from_pointee(HashSet::new()),
        }
    }

    fn parse_csv(body: &str) -> HashSet<String> {
        let mut set = HashSet::new();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .comment(Some(b'#'))
            .flexible(true)
            .from_reader(body.as_bytes());
        for record in reader.records().flatten() {
            if let Some(hash) = record.get(0) {
                let hash = hash.trim();
                if !hash.is_empty() {
                    set.insert(hash.to_ascii_lowercase());
                }
            }
        }
        set
    }
}

#[async_trait::async_trait]
impl Filter for Ja3FeedFilter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Ja3
    }

    async fn load(&self, _ctx: &FilterContext) -> Result<(), FirewallError> {
        Ok(())
    }

    fn check(&self, packet: &PacketView<'_>) -> bool {
        let ja3 = packet.ja3();
        if ja3.is_empty() {
            return true;
        }
        !self.denied.load().contains(ja3)
    }

    async fn update(&self, ctx: &FilterContext) -> Result<(), FirewallError> {
        let body = fetch_text(&ctx.http, &self.url, ctx.timeout).await?;
        self.denied.store(Arc::new(Self::parse_csv(&body)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_column_as_lowercased_hash() {
        let body = "# comment\nAABBCCDDEEFF00112233445566778899,other,fields\n\n";
        let set = Ja3FeedFilter::parse_csv(body);
        assert!(set.contains("aabbccddeeff00112233445566778899"));
    }
}
