use std::sync::Arc;

use arc_swap::ArcSwap;
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

/// An autonomous system, as resolved by the geo feed for one IPv4 prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asn {
    pub asn: u32,
    /// Lowercase ISO country code.
    pub country: [u8; 2],
}

impl Asn {
    pub fn new(asn: u32, country: &str) -> Self {
        let lower = country.to_ascii_lowercase();
        let bytes = lower.as_bytes();
        let mut country = [b'?', b'?'];
        if bytes.len() == 2 {
            country.copy_from_slice(bytes);
        }
        Self { asn, country }
    }

    pub fn country_str(&self) -> &str {
        std::str::from_utf8(&self.country).unwrap_or("??")
    }
}

#[derive(Clone, Default)]
struct TrieNode {
    value: Option<Asn>,
    children: [Option<Box<TrieNode>>; 2],
}

impl TrieNode {
    fn insert(&mut self, addr: u32, len: u8, value: Asn) {
        let mut node = self;
        for i in 0..len {
            let bit = ((addr >> (31 - i)) & 1) as usize;
            node = node.children[bit].get_or_insert_with(|| Box::new(TrieNode::default()));
        }
        node.value = Some(value);
    }

    /// Longest-prefix lookup: walks the address bits, remembering the last
    /// value seen on a terminal node.
    fn lookup(&self, addr: u32) -> Option<Asn> {
        let mut node = self;
        let mut best = node.value;
        for i in 0..32 {
            let bit = ((addr >> (31 - i)) & 1) as usize;
            match node.children[bit].as_deref() {
                Some(child) => {
                    node = child;
                    if node.value.is_some() {
                        best = node.value;
                    }
                }
                None => break,
            }
        }
        best
    }
}

/// Prefix-trie from IPv4 prefix to resolved `Asn`, populated wholesale by
/// the geo feed and queried by longest-prefix match on a source address.
/// Owned by the geo filter; ASN-feed filters borrow it read-only.
pub struct AsnList {
    root: ArcSwap<TrieNode>,
}

impl Default for AsnList {
    fn default() -> Self {
        Self::new()
    }
}

impl AsnList {
    pub fn new() -> Self {
        Self {
            root: ArcSwap::from_pointee(TrieNode::default()),
        }
    }

    pub fn lookup(&self, addr: std::net::Ipv4Addr) -> Option<Asn> {
        self.root.load().lookup(u32::from(addr))
    }

    /// Atomically replace the whole table, as produced by one geo feed
    /// refresh cycle. Never publishes a partially-built table.
    pub fn replace_all(&self, entries: &[(Ipv4Network, Asn)]) {
        let mut next = TrieNode::default();
        for (prefix, asn) in entries {
            next.insert(u32::from(prefix.network()), prefix.prefix(), *asn);
        }
        self.root.store(Arc::new(next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_resolves_asn_and_country() {
        let list = AsnList::new();
        let prefix: Ipv4Network = "5.45.0.0/16".parse().unwrap();
        list.replace_all(&[(prefix, Asn::new(12345, "RU"))]);
        let resolved = list.lookup("5.45.1.2".parse().unwrap()).unwrap();
        assert_eq!(resolved.asn, 12345);
        assert_eq!(resolved.country_str(), "ru");
    }

    #[test]
    fn unresolved_address_returns_none() {
        let list = AsnList::new();
        assert!(list.lookup("8.8.8.8".parse().unwrap()).is_none());
    }
}
