//! Orphan detection.
//!
//! An item is orphaned when no accepted edge starts or ends at it. Orphans
//! are informational: standalone items (a settings entry with no
//! material-specific guidance yet) are legitimate.

use crate::graph::{EdgeGraph, NodeRef, Scope};
use crate::index::Index;
use crate::issue::Issue;
use std::collections::HashSet;

/// One pass over the edges, one pass over the index.
pub fn find_orphans(index: &Index, graph: &EdgeGraph, scope: &Scope) -> Vec<Issue> {
    let mut has_outgoing: HashSet<&NodeRef> = HashSet::new();
    let mut has_incoming: HashSet<&NodeRef> = HashSet::new();
    for edge in graph.edges() {
        has_outgoing.insert(&edge.source);
        has_incoming.insert(&edge.target);
    }

    let mut issues = Vec::new();
    for domain in index.domains().filter(|d| scope.includes(d)) {
        for id in index.ids(domain) {
            let node = NodeRef::new(domain, id);
            if !has_outgoing.contains(&node) && !has_incoming.contains(&node) {
                issues.push(Issue::orphaned(domain, id));
            }
        }
    }
    issues
}
