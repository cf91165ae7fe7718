use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;

use ipnetwork::Ipv4Network;
use vigil_core::{Asn, AsnList, CountryList, Filter, FilterContext, FilterKind, FirewallError, PacketView};

use crate::http::{fetch_bytes, fetch_text};

/// Resolves the packet's source ASN/country from a zip-archived CSV feed
/// (IPLocate) and denies when the resolved country is in the configured
/// blacklist. Owns the shared `AsnList` that ASN-feed filters borrow
/// read-only — geo is the only writer. The country denylist itself is
/// admin-managed (the control plane writes it directly), so it is also
/// held as a shared handle rather than owned outright.
pub struct GeoFilter {
    name: &'static str,
    url: String,
    asn_table: Arc<AsnList>,
    country_deny: Arc<CountryList>,
}

impl GeoFilter {
    pub fn new(name: &'static str, url: impl Into<String>, country_deny: Arc<CountryList>) -> Self {
        Self {
            name,
            url: url.into(),
            asn_table: Arc::new(AsnList::new()),
            country_deny,
        }
    }

    /// Read-only handle for ASN-feed filters; never a back-reference.
    pub fn asn_table(&self) -> Arc<AsnList> {
        Arc::clone(&self.asn_table)
    }

    /// Shared handle for the control plane, which writes this list
    /// directly rather than through `update`.
    pub fn country_deny(&self) -> Arc<CountryList> {
        Arc::clone(&self.country_deny)
    }

    fn parse_zip(bytes: &[u8]) -> Vec<(Ipv4Network, Asn)> {
        let mut entries = Vec::new();
        let Ok(mut archive) = zip::ZipArchive::new(std::io::Cursor::new(bytes)) else {
            return entries;
        };
        for i in 0..archive.len() {
            let Ok(mut file) = archive.by_index(i) else {
                continue;
            };
            let mut contents = String::new();
            if file.read_to_string(&mut contents).is_err() {
                continue;
            }
            entries.extend(Self::parse_csv(&contents));
        }
        entries
    }

    fn parse_csv(contents: &str) -> Vec<(Ipv4Network, Asn)> {
        let mut entries = Vec::new();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(contents.as_bytes());
        for record in reader.records().flatten() {
            if record.len() < 3 {
                continue;
            }
            let (Some(prefix_raw), Some(asn_raw), Some(country_raw)) =
                (record.get(0), record.get(1), record.get(2))
            else {
                continue;
            };
            let Ok(prefix) = prefix_raw.trim().parse::<Ipv4Network>() else {
                continue;
            };
            let Ok(asn_num) = asn_raw.trim().parse::<u32>() else {
                continue;
            };
            entries.push((prefix, Asn::new(asn_num, country_raw.trim())));
        }
        entries
    }
}

#[async_trait::async_trait]
impl Filter for GeoFilter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Geo
    }

    async fn load(&self, _ctx: &FilterContext) -> Result<(), FirewallError> {
        Ok(())
    }

    fn check(&self, packet: &PacketView<'_>) -> bool {
        match packet.asn(Some(&self.asn_table)) {
            Some(asn) => !self.country_deny.lookup(asn.country_str()),
            None => true,
        }
    }

    async fn update(&self, ctx: &FilterContext) -> Result<(), FirewallError> {
        let bytes = fetch_bytes(&ctx.http, &self.url, ctx.timeout).await?;
        let entries = Self::parse_zip(&bytes);
        self.asn_table.replace_all(&entries);
        Ok(())
    }
}

/// Denies packets whose resolved ASN (via the geo filter's table) is in a
/// set populated from Spamhaus's `asndrop`-style NDJSON feed.
pub struct AsnFeedFilter {
    name: &'static str,
    url: String,
    asn_table: Arc<AsnList>,
    denied: arc_swap::ArcSwap<HashSet<u32>>,
}

impl AsnFeedFilter {
    pub fn new(name: &'static str, url: impl Into<String>, asn_table: Arc<AsnList>) -> Self {
        Self {
            name,
            url: url.into(),
            asn_table,
            denied: arc_swap::ArcSwap::from_pointee(HashSet::new()),
        }
    }

    fn parse_ndjson(body: &str) -> HashSet<u32> {
        let mut set = HashSet::new();
        for line in body.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
                continue;
            };
            let Some(asn) = value.get("asn").and_then(|v| v.as_u64()) else {
                continue;
            };
            if asn == 0 {
                continue;
            }
            set.insert(asn as u32);
        }
        set
    }
}

#[async_trait::async_trait]
impl Filter for AsnFeedFilter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Asn
    }

    async fn load(&self, _ctx: &FilterContext) -> Result<(), FirewallError> {
        Ok(())
    }

    fn check(&self, packet: &PacketView<'_>) -> bool {
        match packet.asn(Some(&self.asn_table)) {
            Some(asn) => !self.denied.load().contains(&asn.asn),
            None => true,
        }
    }

    async fn update(&self, ctx: &FilterContext) -> Result<(), FirewallError> {
        let body = fetch_text(&ctx.http, &self.url, ctx.timeout).await?;
        self.denied.store(std::sync::Arc::new(Self::parse_ndjson(&body)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_csv_rows_skipping_malformed() {
        let csv = "5.45.0.0/16,12345,RU\nnot-a-prefix,1,US\n8.8.8.0/24,15169,us\n";
        let entries = GeoFilter::parse_csv(csv);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].1.asn, 12345);
        assert_eq!(entries[0].1.country_str(), "ru");
    }

    #[test]
    fn ndjson_skips_malformed_and_zero_asn_lines() {
        let body = "{\"asn\": 1234}\nnot json\n{\"asn\": 0}\n{\"other\": 1}\n";
        let set = AsnFeedFilter::parse_ndjson(body);
        assert_eq!(set.len(), 1);
        assert!(set.contains(&1234));
    }
}
