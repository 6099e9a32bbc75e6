//! Property-based tests for validation and repair invariants
//!
//! Datasets are generated from random id sets, so naming drift, duplicates
//! and dangling references show up in combinations the example tests don't
//! cover.

use super::*;
use crate::issue::IssueKind;
use crate::test_support::{dataset, write_dataset};
use crate::validator::validate;
use proptest::prelude::*;
use tempfile::TempDir;

// Prefixed so generated ids never parse as YAML null/bool keys
fn base_ids() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z]{3,8}", 1..8)
        .prop_map(|ids| ids.into_iter().map(|s| format!("p-{}", s)).collect())
}

fn contaminants_yaml(ids: &[String]) -> String {
    if ids.is_empty() {
        return "contamination_patterns: {}\n".to_string();
    }
    let mut yaml = String::from("contamination_patterns:\n");
    for id in ids {
        yaml.push_str(&format!("  {}: {{}}\n", id));
    }
    yaml
}

fn materials_yaml(references: &[String]) -> String {
    let mut yaml = String::from(
        "materials:\n  m-steel:\n    relationships:\n      related_contaminants:\n",
    );
    if references.is_empty() {
        yaml.push_str("        []\n");
    }
    for id in references {
        yaml.push_str(&format!("        - id: {}\n", id));
    }
    yaml
}

// Property 1: no false negatives
// Every reference to an id that was removed from its domain is reported.
proptest! {
    #[test]
    fn prop_removed_target_is_reported(ids in base_ids(), pick in any::<prop::sample::Index>()) {
        let removed = ids[pick.index(ids.len())].clone();
        let remaining: Vec<String> = ids.iter().filter(|id| **id != removed).cloned().collect();

        let set = dataset(&materials_yaml(&ids), &contaminants_yaml(&remaining));
        let index = Index::build(&set);
        let (_, issues) = validate(&set, &index, &Schema::builtin(), &Scope::All);

        let broken: Vec<_> = issues
            .iter()
            .filter(|i| i.kind == IssueKind::BrokenReference)
            .collect();
        prop_assert_eq!(broken.len(), 1);
        prop_assert_eq!(broken[0].target_id.as_deref(), Some(removed.as_str()));
    }
}

// Property 2: repair converges in one pass
// After one repair, a fresh load has no broken references and nothing to do.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_repair_is_idempotent(
        ids in base_ids(),
        refs in prop::collection::vec((0usize..16, 0u8..3), 0..10)
    ) {
        let existing: Vec<String> = ids.iter().map(|b| format!("{}-contamination", b)).collect();
        let references: Vec<String> = refs
            .iter()
            .map(|(i, kind)| {
                let base = &ids[i % ids.len()];
                match kind {
                    0 => format!("{}-contamination", base),
                    1 => base.clone(),
                    _ => format!("zz-{}", base),
                }
            })
            .collect();

        let temp = TempDir::new().unwrap();
        write_dataset(
            temp.path(),
            &[
                ("materials", &materials_yaml(&references)),
                ("contaminants", &contaminants_yaml(&existing)),
            ],
        );
        let schema = Schema::builtin();
        let registry = StrategyRegistry::builtin();

        let mut first = DomainSet::load(&schema, temp.path());
        let index = Index::build(&first);
        let stats = repair(&mut first, &index, &schema, &registry, &RepairOptions::default());
        prop_assert!(!stats.has_failures());
        let drifted = refs.iter().filter(|(_, kind)| *kind != 0).count();
        prop_assert_eq!(stats.actions.len(), drifted);

        let second = DomainSet::load(&schema, temp.path());
        let index = Index::build(&second);
        let materials = second.get("materials").unwrap();
        prop_assert!(plan(materials, &index, &schema, &registry).is_empty());

        let (graph, issues) = validate(&second, &index, &schema, &Scope::All);
        prop_assert!(issues.iter().all(|i| i.kind != IssueKind::BrokenReference));
        // no inverse edges exist, so each distinct edge lacks its backlink
        let distinct: std::collections::HashSet<_> = graph.edges().iter().collect();
        let missing = crate::backlinks::check(&graph, &schema, &Scope::All);
        prop_assert_eq!(missing.len(), distinct.len());
    }
}
