//! Reference validation.
//!
//! Walks every relationship field of every item, resolves each reference
//! against the [`Index`], and splits them into accepted [`Edge`]s and
//! `broken_reference` / `invalid_relationship_type` issues.
//!
//! The edge graph always covers every domain, because backlink and orphan
//! checks on one domain depend on edges coming from the others. The scope only
//! filters which issues are emitted.
//!
//! References into a domain that failed to load are left unresolved: they
//! yield neither edges nor `broken_reference`, and the domain's load warning
//! stands in for them.

use crate::graph::{Edge, EdgeGraph, NodeRef, Scope};
use crate::index::Index;
use crate::issue::Issue;
use crate::schema::Schema;
use crate::store::{DomainSet, Item, RelationshipField};
use tracing::debug;

/// Result of resolving one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceStatus {
    Valid,
    Broken,
}

/// Resolve `target_id` in `target_domain`.
pub fn check_reference(index: &Index, target_domain: &str, target_id: &str) -> ReferenceStatus {
    if index.exists(target_domain, target_id) {
        ReferenceStatus::Valid
    } else {
        ReferenceStatus::Broken
    }
}

/// Validate all references.
///
/// Processing order is fixed (domains in schema order, items in load order,
/// declared fields in table order, then undeclared fields in file order), so
/// identical input always yields identical issue lists.
pub fn validate(
    set: &DomainSet,
    index: &Index,
    schema: &Schema,
    scope: &Scope,
) -> (EdgeGraph, Vec<Issue>) {
    let mut graph = EdgeGraph::new();
    let mut issues = Vec::new();
    let mut unresolved = 0usize;

    for store in set.stores() {
        let domain = store.name();
        let report = scope.includes(domain);

        for item in store.items() {
            for spec in schema.fields_for(domain) {
                if let Some(field) = item.field(&spec.field) {
                    if !index.is_available(&spec.target) {
                        unresolved += field.references.len();
                        continue;
                    }
                    resolve_field(
                        domain,
                        item,
                        field,
                        &spec.target,
                        index,
                        &mut graph,
                        report.then_some(&mut issues),
                    );
                }
            }

            if report {
                for field in &item.relationships {
                    if schema.target_of(domain, &field.name).is_none() {
                        issues.push(Issue::invalid_relationship_type(
                            domain,
                            &item.id,
                            &field.name,
                        ));
                    }
                }
            }
        }
    }

    debug!(
        edges = graph.len(),
        issues = issues.len(),
        unresolved,
        scope = %scope,
        "reference validation complete"
    );
    (graph, issues)
}

fn resolve_field(
    domain: &str,
    item: &Item,
    field: &RelationshipField,
    target_domain: &str,
    index: &Index,
    graph: &mut EdgeGraph,
    mut issues: Option<&mut Vec<Issue>>,
) {
    for reference in &field.references {
        match check_reference(index, target_domain, &reference.id) {
            ReferenceStatus::Valid => graph.add(Edge::new(
                NodeRef::new(domain, &item.id),
                &field.name,
                NodeRef::new(target_domain, &reference.id),
            )),
            ReferenceStatus::Broken => {
                if let Some(issues) = issues.as_deref_mut() {
                    issues.push(Issue::broken_reference(
                        domain,
                        &item.id,
                        &field.name,
                        target_domain,
                        &reference.id,
                    ));
                }
            }
        }
    }
}
