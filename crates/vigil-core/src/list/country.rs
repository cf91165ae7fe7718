use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;

/// Atomically-replaced set of lowercase ISO country codes.
pub struct CountryList {
    set: ArcSwap<HashSet<String>>,
}

impl Default for CountryList {
    fn default() -> Self {
        Self::new()
    }
}

impl CountryList {
    pub fn new() -> Self {
        Self {
            set: ArcSwap::from_pointee(HashSet::new()),
        }
    }

    pub fn get_all(&self) -> Vec<String> {
        self.set.load().iter().cloned().collect()
    }

    pub fn lookup(&self, code: &str) -> bool {
        self.set.load().contains(&code.to_ascii_lowercase())
    }

    pub fn upsert(&self, codes: &[String]) -> crate::error::Result<()> {
        let mut next = (**self.set.load()).clone();
        for code in codes {
            next.insert(code.to_ascii_lowercase());
        }
        self.set.store(Arc::new(next));
        Ok(())
    }

    pub fn remove(&self, codes: &[String]) -> crate::error::Result<()> {
        let mut next = (**self.set.load()).clone();
        for code in codes {
            next.remove(&code.to_ascii_lowercase());
        }
        self.set.store(Arc::new(next));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_then_lookup_then_remove_then_lookup() {
        let list = CountryList::new();
        list.upsert(&["RU".to_string()]).unwrap();
        assert!(list.lookup("ru"));
        list.remove(&["ru".to_string()]).unwrap();
        assert!(!list.lookup("ru"));
    }
}
