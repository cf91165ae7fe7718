use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

/// A node in the label trie, keyed by one reversed DNS label per level
/// (`example.com` is stored as `com` → `example`). `terminal` marks that an
/// entry was inserted ending at this node, which is what makes apex +
/// subdomain matching a longest-prefix walk: any query that walks through a
/// terminal node on its way down has matched that apex or a descendant.
#[derive(Clone, Default)]
struct LabelNode {
    terminal: bool,
    children: HashMap<String, LabelNode>,
}

impl LabelNode {
    fn insert(&mut self, labels: &[&str]) {
        let mut node = self;
        for label in labels {
            node = node.children.entry((*label).to_string()).or_default();
        }
        node.terminal = true;
    }

    /// Remove every entry whose key has `labels` as a prefix (mirrors the
    /// Go source's `DeletePrefix`: removing an apex drops its subdomains).
    fn remove_prefix(&mut self, labels: &[&str]) {
        let Some((first, rest)) = labels.split_first() else {
            self.terminal = false;
            self.children.clear();
            return;
        };
        if let Some(child) = self.children.get_mut(first) {
            if rest.is_empty() {
                self.children.remove(first);
            } else {
                child.remove_prefix(rest);
            }
        }
    }

    fn matches(&self, labels: &[&str]) -> bool {
        let mut node = self;
        if node.terminal {
            return true;
        }
        for label in labels {
            match node.children.get(*label) {
                Some(child) => {
                    node = child;
                    if node.terminal {
                        return true;
                    }
                }
                None => return false,
            }
        }
        false
    }

    fn collect(&self, prefix: &mut Vec<String>, out: &mut Vec<String>) {
        if self.terminal {
            out.push(prefix.iter().rev().cloned().collect::<Vec<_>>().join("."));
        }
        for (label, child) in &self.children {
            prefix.push(label.clone());
            child.collect(prefix, out);
            prefix.pop();
        }
    }
}

/// Reverses and lowercases a domain into the label order used as the trie
/// key: `foo.bar.example` → `["example", "bar", "foo"]`.
fn reversed_labels(domain: &str) -> Vec<String> {
    domain
        .trim_end_matches('.')
        .to_ascii_lowercase()
        .rsplit('.')
        .map(str::to_owned)
        .collect()
}

/// Atomically-replaced radix trie keyed by reversed domain labels.
///
/// A lookup succeeds when any stored key is a prefix of the reversed query,
/// implementing apex + subdomain matching: storing `example.com` matches
/// `example.com`, `x.example.com` and `a.b.example.com`, but not
/// `notexample.com` or `example.com.evil`.
pub struct DomainList {
    root: ArcSwap<LabelNode>,
}

impl Default for DomainList {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainList {
    pub fn new() -> Self {
        Self {
            root: ArcSwap::from_pointee(LabelNode::default()),
        }
    }

    pub fn get_all(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.root.load().collect(&mut Vec::new(), &mut out);
        out
    }

    pub fn lookup(&self, domain: &str) -> bool {
        let labels = reversed_labels(domain);
        let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
        self.root.load().matches(&refs)
    }

    pub fn upsert(&self, domains: &[String]) -> crate::error::Result<()> {
        let mut next = (**self.root.load()).clone();
        for domain in domains {
            let labels = reversed_labels(domain);
            if labels.iter().any(String::is_empty) {
                return Err(crate::error::FirewallError::InvalidInput(format!(
                    "not a domain: {domain}"
                )));
            }
            let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
            next.insert(&refs);
        }
        self.root.store(Arc::new(next));
        Ok(())
    }

    pub fn remove(&self, domains: &[String]) -> crate::error::Result<()> {
        let mut next = (**self.root.load()).clone();
        for domain in domains {
            let labels = reversed_labels(domain);
            let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
            next.remove_prefix(&refs);
        }
        self.root.store(Arc::new(next));
        Ok(())
    }

    pub fn replace_all(&self, domains: &[String]) {
        let mut next = LabelNode::default();
        for domain in domains {
            let labels = reversed_labels(domain);
            let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
            next.insert(&refs);
        }
        self.root.store(Arc::new(next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apex_matches_self_and_subdomains() {
        let list = DomainList::new();
        list.upsert(&["example.com".to_string()]).unwrap();
        assert!(list.lookup("example.com"));
        assert!(list.lookup("x.example.com"));
        assert!(list.lookup("a.b.example.com"));
    }

    #[test]
    fn apex_does_not_match_unrelated_or_suffix_tricks() {
        let list = DomainList::new();
        list.upsert(&["example.com".to_string()]).unwrap();
        assert!(!list.lookup("notexample.com"));
        assert!(!list.lookup("example.com.evil"));
    }

    #[test]
    fn case_is_folded() {
        let list = DomainList::new();
        list.upsert(&["Example.COM".to_string()]).unwrap();
        assert!(list.lookup("example.com"));
    }

    #[test]
    fn upsert_then_lookup_then_remove_then_lookup() {
        let list = DomainList::new();
        list.upsert(&["evil.example".to_string()]).unwrap();
        assert!(list.lookup("login.evil.example"));
        list.remove(&["evil.example".to_string()]).unwrap();
        assert!(!list.lookup("login.evil.example"));
    }

    #[test]
    fn reversed_round_trip_invariant() {
        let list = DomainList::new();
        list.upsert(&["example.com".to_string()]).unwrap();
        let d = "x.example.com";
        assert_eq!(list.lookup(d), list.lookup(d));
    }
}
