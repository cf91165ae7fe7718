use vigil_core::{DomainList, Filter, FilterContext, FilterKind, FirewallError, PacketView};

use crate::http::fetch_text;

/// Denies against `hosts(5)`-style files (StevenBlack, SomeoneWhoCares):
/// each line is an optional leading IP followed by a domain, with `#`
/// comments. Only the domain is kept.
pub struct DomainFeedFilter {
    name: &'static str,
    urls: Vec<String>,
    list: DomainList,
}

impl DomainFeedFilter {
    pub fn new(name: &'static str, urls: Vec<String>) -> Self {
        Self {
            name,
            urls,
            list: DomainList::new(),
        }
    }

    pub fn list(&self) -> &DomainList {
        &self.list
    }

    fn parse_body(body: &str) -> Vec<String> {
        let mut domains = Vec::new();
        for raw_line in body.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let first = match fields.next() {
                Some(f) => f,
                None => continue,
            };
            let domain = if first.parse::<std::net::Ipv4Addr>().is_ok() {
                match fields.next() {
                    Some(d) => d,
                    None => continue,
                }
            } else {
                first
            };
            if !domain.is_empty() {
                domains.push(domain.to_string());
            }
        }
        domains
    }
}

#[async_trait::async_trait]
impl Filter for DomainFeedFilter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Domain
    }

    async fn load(&self, _ctx: &FilterContext) -> Result<(), FirewallError> {
        Ok(())
    }

    fn check(&self, packet: &PacketView<'_>) -> bool {
        !packet.domains().iter().any(|d| self.list.lookup(d))
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
