//! Bidirectional consistency.
//!
//! For relationship fields declared as inverses of each other, an edge
//! `A --field--> B` should be mirrored by `B --inverse--> A`. A missing mirror
//! is a warning: one-directional data is valid, just not normalized yet.
//!
//! Works purely on the accepted [`EdgeGraph`]; the index is not consulted.

use crate::graph::{EdgeGraph, NodeRef, Scope};
use crate::issue::Issue;
use crate::schema::Schema;
use std::collections::HashSet;

/// Report a `missing_backlink` for every in-scope edge without its inverse.
///
/// A `(source, field, target)` triple is reported at most once even when the
/// same reference is listed twice.
pub fn check(graph: &EdgeGraph, schema: &Schema, scope: &Scope) -> Vec<Issue> {
    let mut issues = Vec::new();
    let mut reported = HashSet::new();

    for edge in graph.edges() {
        if !scope.includes(&edge.source.domain) {
            continue;
        }
        let Some((inverse_domain, inverse_field)) =
            schema.inverse_of(&edge.source.domain, &edge.field)
        else {
            continue;
        };

        // The inverse is declared on the target domain, so this only differs
        // if the schema is inconsistent; skip rather than emit nonsense.
        if inverse_domain != edge.target.domain {
            continue;
        }

        let back_source = NodeRef::new(inverse_domain, &edge.target.id);
        if graph.contains(&back_source, inverse_field, &edge.source) {
            continue;
        }

        if reported.insert(edge) {
            issues.push(Issue::missing_backlink(
                &edge.source.domain,
                &edge.source.id,
                &edge.field,
                &edge.target.domain,
                &edge.target.id,
                inverse_field,
            ));
        }
    }

    issues
}
