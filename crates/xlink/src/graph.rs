//! The accepted edge graph.
//!
//! An [`Edge`] exists only for a reference whose target was confirmed in the
//! [`Index`](crate::index::Index). Broken references never become edges, so
//! everything downstream of the reference validator can assume every edge
//! resolves.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// `domain:id`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NodeRef {
    pub domain: String,
    pub id: String,
}

impl NodeRef {
    pub fn new(domain: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.domain, self.id)
    }
}

/// A resolved reference: `source --field--> target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    pub source: NodeRef,
    pub field: String,
    pub target: NodeRef,
}

impl Edge {
    pub fn new(source: NodeRef, field: impl Into<String>, target: NodeRef) -> Self {
        Self {
            source,
            field: field.into(),
            target,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} --{}--> {}", self.source, self.field, self.target)
    }
}

/// Edges in insertion order plus a set for O(1) existence checks.
///
/// Repeated references produce repeated edges in `edges()`; `contains` only
/// cares whether at least one exists.
#[derive(Debug, Default)]
pub struct EdgeGraph {
    edges: Vec<Edge>,
    keys: HashSet<Edge>,
}

impl EdgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, edge: Edge) {
        self.keys.insert(edge.clone());
        self.edges.push(edge);
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Whether `source --field--> target` was accepted.
    pub fn contains(&self, source: &NodeRef, field: &str, target: &NodeRef) -> bool {
        self.keys.contains(&Edge::new(source.clone(), field, target.clone()))
    }
}

/// Which source domains a run processes.
///
/// All domains are always loaded and indexed; the scope only restricts which
/// items are checked, reported on, or repaired.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    All,
    Domain(String),
}

impl Scope {
    pub fn from_option(domain: Option<&str>) -> Self {
        match domain {
            Some(name) => Scope::Domain(name.to_string()),
            None => Scope::All,
        }
    }

    pub fn includes(&self, domain: &str) -> bool {
        match self {
            Scope::All => true,
            Scope::Domain(name) => name == domain,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => f.write_str("all"),
            Scope::Domain(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_after_add() {
        let mut graph = EdgeGraph::new();
        let steel = NodeRef::new("materials", "steel");
        let rust = NodeRef::new("contaminants", "rust-contamination");
        graph.add(Edge::new(steel.clone(), "related_contaminants", rust.clone()));

        assert!(graph.contains(&steel, "related_contaminants", &rust));
        assert!(!graph.contains(&rust, "related_materials", &steel));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_duplicate_edges_are_kept_in_order() {
        let mut graph = EdgeGraph::new();
        let a = NodeRef::new("materials", "a");
        let b = NodeRef::new("settings", "b");
        graph.add(Edge::new(a.clone(), "related_settings", b.clone()));
        graph.add(Edge::new(a.clone(), "related_settings", b.clone()));

        assert_eq!(graph.len(), 2);
        assert!(graph.contains(&a, "related_settings", &b));
    }

    #[test]
    fn test_scope_includes() {
        assert!(Scope::All.includes("materials"));
        let scope = Scope::from_option(Some("settings"));
        assert!(scope.includes("settings"));
        assert!(!scope.includes("materials"));
        assert_eq!(scope.to_string(), "settings");
    }

    #[test]
    fn test_edge_display() {
        let edge = Edge::new(
            NodeRef::new("materials", "steel"),
            "related_contaminants",
            NodeRef::new("contaminants", "rust-contamination"),
        );
        assert_eq!(
            edge.to_string(),
            "materials:steel --related_contaminants--> contaminants:rust-contamination"
        );
    }
}
