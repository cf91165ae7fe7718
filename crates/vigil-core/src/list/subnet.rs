use std::sync::Arc;

use arc_swap::ArcSwap;
use ipnetwork::Ipv4Network;

use crate::error::{FirewallError, Result};

/// A binary trie over IPv4 address bits, optimized for longest-prefix
/// overlap queries. Each node below height `len` marks whether a prefix of
/// exactly that length was inserted there.
#[derive(Clone, Default)]
struct TrieNode {
    terminal: bool,
    children: [Option<Box<TrieNode>>; 2],
}

impl TrieNode {
    fn insert(&mut self, addr: u32, len: u8) {
        let mut node = self;
        for i in 0..len {
            let bit = ((addr >> (31 - i)) & 1) as usize;
            node = node.children[bit].get_or_insert_with(|| Box::new(TrieNode::default()));
        }
        node.terminal = true;
    }

    fn remove(&mut self, addr: u32, len: u8) {
        let mut node = self;
        for i in 0..len {
            let bit = ((addr >> (31 - i)) & 1) as usize;
            match node.children[bit].as_deref_mut() {
                Some(child) => node = child,
                None => return,
            }
        }
        node.terminal = false;
    }

    /// True if some stored prefix overlaps `(addr, len)`: either a stored
    /// prefix is an ancestor of (or equal to) the query, or the query is an
    /// ancestor of some stored prefix.
    fn overlaps(&self, addr: u32, len: u8) -> bool {
        let mut node = self;
        for i in 0..len {
            if node.terminal {
                return true;
            }
            let bit = ((addr >> (31 - i)) & 1) as usize;
            match node.children[bit].as_deref() {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.terminal || node.has_any_terminal()
    }

    fn has_any_terminal(&self) -> bool {
        if self.terminal {
            return true;
        }
        self.children
            .iter()
            .flatten()
            .any(|child| child.has_any_terminal())
    }

    fn collect(&self, prefix: u32, depth: u8, out: &mut Vec<Ipv4Network>) {
        if self.terminal {
            out.push(
                Ipv4Network::new(prefix.into(), depth)
                    .expect("depth was produced by trie descent, always <= 32"),
            );
        }
        for (bit, child) in self.children.iter().enumerate() {
            if let Some(child) = child {
                let next = if bit == 1 {
                    prefix | (1u32 << (31 - depth))
                } else {
                    prefix
                };
                child.collect(next, depth + 1, out);
            }
        }
    }
}

/// Versioned, atomically-replaced prefix tree over IPv4 CIDRs.
///
/// `Lookup` never blocks and never observes a partially-applied mutation:
/// every `Upsert`/`Remove` clones the current tree, applies its deltas, and
/// publishes the new root with a single atomic store. Readers always see a
/// complete pre- or post-mutation snapshot.
pub struct SubnetList {
    root: ArcSwap<TrieNode>,
}

impl Default for SubnetList {
    fn default() -> Self {
        Self::new()
    }
}

impl SubnetList {
    pub fn new() -> Self {
        Self {
            root: ArcSwap::from_pointee(TrieNode::default()),
        }
    }

    /// Convenience constructor pre-populated with RFC1918 private ranges
    /// and the IPv4 loopback block.
    pub fn with_rfc1918_and_loopback() -> Self {
        let list = Self::new();
        let seed = [
            "10.0.0.0/8",
            "172.16.0.0/12",
            "192.168.0.0/16",
            "127.0.0.0/8",
        ];
        let prefixes: Vec<Ipv4Network> = seed
            .iter()
            .map(|s| s.parse().expect("static RFC1918/loopback literals always parse"))
            .collect();
        list.upsert(&prefixes).expect("static literals never fail validation");
        list
    }

    pub fn get_all(&self) -> Vec<Ipv4Network> {
        let mut out = Vec::new();
        self.root.load().collect(0, 0, &mut out);
        out
    }

    /// True iff some stored prefix overlaps `prefix`. A `/32` lookup is a
    /// containment test against every stored prefix that encloses it.
    pub fn lookup(&self, prefix: Ipv4Network) -> bool {
        self.root
            .load()
            .overlaps(u32::from(prefix.network()), prefix.prefix())
    }

    pub fn upsert(&self, prefixes: &[Ipv4Network]) -> Result<()> {
        let mut next = (**self.root.load()).clone();
        for p in prefixes {
            next.insert(u32::from(p.network()), p.prefix());
        }
        self.root.store(Arc::new(next));
        Ok(())
    }

    pub fn remove(&self, prefixes: &[Ipv4Network]) -> Result<()> {
        let mut next = (**self.root.load()).clone();
        for p in prefixes {
            next.remove(u32::from(p.network()), p.prefix());
        }
        self.root.store(Arc::new(next));
        Ok(())
    }

    /// Atomically replace the entire snapshot, e.g. from a feed `update`.
    pub fn replace_all(&self, prefixes: &[Ipv4Network]) {
        let mut next = TrieNode::default();
        for p in prefixes {
            next.insert(u32::from(p.network()), p.prefix());
        }
        self.root.store(Arc::new(next));
    }
}

/// Parses a feed/admin-supplied CIDR or bare IPv4 address; a bare address
/// widens to `/32`. Returns `INVALID_INPUT` on anything else.
pub fn parse_prefix(raw: &str) -> Result<Ipv4Network> {
    if let Ok(net) = raw.parse::<Ipv4Network>() {
        return Ok(net);
    }
    raw.parse::<std::net::Ipv4Addr>()
        .map(|addr| Ipv4Network::new(addr, 32).expect("/32 is always valid"))
        .map_err(|_| FirewallError::InvalidInput(format!("not a CIDR or IPv4 address: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> Ipv4Network {
        s.parse().unwrap()
    }

    #[test]
    fn longest_prefix_32_matches_enclosing_subnet() {
        let list = SubnetList::new();
        list.upsert(&[net("10.0.0.0/8")]).unwrap();
        assert!(list.lookup(net("10.1.2.3/32")));
        assert!(!list.lookup(net("11.1.2.3/32")));
    }

    #[test]
    fn upsert_then_lookup_then_remove_then_lookup() {
        let list = SubnetList::new();
        let p = net("185.220.101.0/24");
        list.upsert(&[p]).unwrap();
        assert!(list.lookup(net("185.220.101.7/32")));
        list.remove(&[p]).unwrap();
        assert!(!list.lookup(net("185.220.101.7/32")));
    }

    #[test]
    fn replace_all_swaps_atomically() {
        let list = SubnetList::new();
        list.upsert(&[net("1.2.3.0/24")]).unwrap();
        list.replace_all(&[net("4.5.6.0/24")]);
        assert!(!list.lookup(net("1.2.3.4/32")));
        assert!(list.lookup(net("4.5.6.7/32")));
    }

    #[test]
    fn empty_list_accepts_everything() {
        let list = SubnetList::new();
        assert!(!list.lookup(net("8.8.8.8/32")));
    }

    #[test]
    fn parse_prefix_widens_bare_address() {
        assert_eq!(parse_prefix("1.2.3.4").unwrap(), net("1.2.3.4/32"));
        assert!(parse_prefix("not-an-ip").is_err());
    }

    #[test]
    fn get_all_round_trips_upserted_prefixes() {
        let list = SubnetList::new();
        list.upsert(&[net("9.9.9.0/24")]).unwrap();
        let all = list.get_all();
        assert_eq!(all, vec![net("9.9.9.0/24")]);
    }
}
