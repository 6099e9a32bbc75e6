//! Cross-domain index of item ids.
//!
//! Built once per run from the loaded [`DomainSet`] and never mutated
//! afterwards. Every validator and the repairer share the same instance, so
//! they all check against one consistent snapshot.

use crate::store::DomainSet;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
struct DomainIds {
    members: HashSet<String>,
    /// Load order, for deterministic iteration.
    ordered: Vec<String>,
}

/// `domain -> set of item ids`, with O(1) membership tests.
#[derive(Debug, Default)]
pub struct Index {
    domains: HashMap<String, DomainIds>,
    /// Domain order as loaded (schema order).
    order: Vec<String>,
    /// Domains whose file actually loaded. Placeholders for failed loads
    /// are indexed empty but are not available.
    available: HashSet<String>,
}

impl Index {
    pub fn build(set: &DomainSet) -> Self {
        let mut index = Self::default();
        for store in set.stores() {
            let ids = DomainIds {
                members: store.items().iter().map(|i| i.id.clone()).collect(),
                ordered: store.items().iter().map(|i| i.id.clone()).collect(),
            };
            if store.is_loaded() {
                index.available.insert(store.name().to_string());
            }
            index.order.push(store.name().to_string());
            index.domains.insert(store.name().to_string(), ids);
        }
        tracing::debug!(
            domains = index.order.len(),
            items = index.len(),
            "built cross-domain index"
        );
        index
    }

    /// Whether `id` exists in `domain`.
    pub fn exists(&self, domain: &str, id: &str) -> bool {
        self.domains
            .get(domain)
            .is_some_and(|ids| ids.members.contains(id))
    }

    /// Whether `domain` loaded, so absence from it means the id is missing.
    pub fn is_available(&self, domain: &str) -> bool {
        self.available.contains(domain)
    }

    /// Domain names in load order.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Item ids of `domain` in load order.
    pub fn ids(&self, domain: &str) -> impl Iterator<Item = &str> {
        self.domains
            .get(domain)
            .into_iter()
            .flat_map(|ids| ids.ordered.iter().map(String::as_str))
    }

    /// Total number of indexed items.
    pub fn len(&self) -> usize {
        self.domains.values().map(|ids| ids.members.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use crate::store::{DomainStore, LoadWarning};
    use std::path::Path;

    fn set_with(domain: &str, yaml: &str) -> DomainSet {
        let schema = Schema::builtin();
        let spec = schema.domain(domain).unwrap();
        let store = DomainStore::parse(spec, Path::new("x.yaml"), yaml).unwrap();
        DomainSet::from_stores(Path::new("."), vec![store])
    }

    #[test]
    fn test_exists_is_scoped_to_domain() {
        let set = set_with("materials", "materials:\n  steel: {}\n  copper: {}\n");
        let index = Index::build(&set);

        assert!(index.exists("materials", "steel"));
        assert!(!index.exists("materials", "rust"));
        // same literal id, different domain
        assert!(!index.exists("contaminants", "steel"));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_failed_domain_is_not_available() {
        let schema = Schema::builtin();
        let materials = schema.domain("materials").unwrap();
        let compounds = schema.domain("compounds").unwrap();
        let loaded = DomainStore::parse(materials, Path::new("m.yaml"), "materials:\n  steel: {}\n")
            .unwrap();
        let err = DomainStore::parse(compounds, Path::new("c.yaml"), "compounds: [unclosed")
            .unwrap_err();
        let failed = DomainStore::unavailable(
            compounds,
            Path::new("c.yaml"),
            LoadWarning::domain("compounds", err.to_string()),
        );
        let index = Index::build(&DomainSet::from_stores(Path::new("."), vec![loaded, failed]));

        assert!(index.is_available("materials"));
        assert!(!index.is_available("compounds"));
        assert!(!index.is_available("settings"));
        assert_eq!(index.domains().count(), 2);
    }

    #[test]
    fn test_ids_in_load_order() {
        let set = set_with("materials", "materials:\n  zinc: {}\n  brass: {}\n  alpha: {}\n");
        let index = Index::build(&set);

        let ids: Vec<_> = index.ids("materials").collect();
        assert_eq!(ids, vec!["zinc", "brass", "alpha"]);
        assert_eq!(index.ids("unknown").count(), 0);
        assert_eq!(index.domains().collect::<Vec<_>>(), vec!["materials"]);
    }
}
