use vigil_core::{parse_prefix, Filter, FilterContext, FilterKind, FirewallError, PacketView, SubnetList};

use crate::http::fetch_text;

/// Denies against a set of URLs whose bodies are line-oriented IPv4
/// prefix/bare-address lists (FireHOL, Spamhaus DROP, Abuse.ch, ...).
/// `#`/`;` comments and malformed lines are skipped rather than aborting
/// the whole refresh.
pub struct SubnetFeedFilter {
    name: &'static str,
    urls: Vec<String>,
    list: SubnetList,
}

impl SubnetFeedFilter {
    pub fn new(name: &'static str, urls: Vec<String>) -> Self {
        Self {
            name,
            urls,
            list: SubnetList::new(),
        }
    }

    pub fn list(&self) -> &SubnetList {
        &self.list
    }

    fn parse_body(body: &str) -> Vec<ipnetwork::Ipv4Network> {
        let mut prefixes = Vec::new();
        for raw_line in body.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            let field = line.split_whitespace().next().unwrap_or("");
            if let Ok(prefix) = parse_prefix(field) {
                prefixes.push(prefix);
            }
        }
        prefixes
    }
}

#[async_trait::async_trait]
impl Filter for SubnetFeedFilter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Ip
    }

    async fn load(&self, _ctx: &FilterContext) -> Result<(), FirewallError> {
        Ok(())
    }

    fn check(&self, packet: &PacketView<'_>) -> bool {
        let prefix = ipnetwork::Ipv4Network::new(packet.src_ip(), 32).expect("/32 is always valid");
        !self.list.lookup(prefix)
    }

    async fn update(&self, ctx: &FilterContext) -> Result<(), FirewallError> {
        let mut all = Vec::new();
        for url in &self.urls {
            let body = fetch_text(&ctx.http, url, ctx.timeout).await?;
            all.extend(Self::parse_body(&body));
        }
        self.list.replace_all(&all);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_skips_comments_and_garbage() {
        let body = "# comment\n; also comment\n10.0.0.0/8\nnot-an-ip\n1.2.3.4  trailing ignored\n";
        let parsed = SubnetFeedFilter::parse_body(body);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].prefix(), 32);
    }

    #[test]
    fn empty_body_yields_empty_list() {
        assert!(SubnetFeedFilter::parse_body("").is_empty());
    }
}
