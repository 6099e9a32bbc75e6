//! Integrity findings produced by one validation pass.

use serde::Serialize;
use std::fmt;

/// How serious a finding is.
///
/// Only `Error` affects the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four kinds of integrity finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Target id is absent from the target domain.
    BrokenReference,
    /// An inverse relationship has no matching reverse edge.
    MissingBacklink,
    /// Item has no incoming or outgoing edges.
    Orphaned,
    /// Relationship field not declared for the item's domain.
    InvalidRelationshipType,
}

impl IssueKind {
    pub const ALL: [IssueKind; 4] = [
        IssueKind::BrokenReference,
        IssueKind::MissingBacklink,
        IssueKind::Orphaned,
        IssueKind::InvalidRelationshipType,
    ];

    pub fn severity(self) -> Severity {
        match self {
            IssueKind::BrokenReference => Severity::Error,
            IssueKind::MissingBacklink | IssueKind::InvalidRelationshipType => Severity::Warning,
            IssueKind::Orphaned => Severity::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IssueKind::BrokenReference => "broken_reference",
            IssueKind::MissingBacklink => "missing_backlink",
            IssueKind::Orphaned => "orphaned",
            IssueKind::InvalidRelationshipType => "invalid_relationship_type",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding. Issues are created by validators and never written back into
/// domain data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub domain: String,
    pub item_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    pub message: String,
}

impl Issue {
    pub fn broken_reference(
        domain: &str,
        item_id: &str,
        field: &str,
        target_domain: &str,
        target_id: &str,
    ) -> Self {
        Self {
            kind: IssueKind::BrokenReference,
            severity: IssueKind::BrokenReference.severity(),
            domain: domain.to_string(),
            item_id: item_id.to_string(),
            field: Some(field.to_string()),
            target_domain: Some(target_domain.to_string()),
            target_id: Some(target_id.to_string()),
            message: format!(
                "{}:{} {} references '{}' which does not exist in {}",
                domain, item_id, field, target_id, target_domain
            ),
        }
    }

    pub fn missing_backlink(
        domain: &str,
        item_id: &str,
        field: &str,
        target_domain: &str,
        target_id: &str,
        inverse_field: &str,
    ) -> Self {
        Self {
            kind: IssueKind::MissingBacklink,
            severity: IssueKind::MissingBacklink.severity(),
            domain: domain.to_string(),
            item_id: item_id.to_string(),
            field: Some(field.to_string()),
            target_domain: Some(target_domain.to_string()),
            target_id: Some(target_id.to_string()),
            message: format!(
                "{}:{} {} -> {}:{}, but {}:{} {} does not list '{}'",
                domain,
                item_id,
                field,
                target_domain,
                target_id,
                target_domain,
                target_id,
                inverse_field,
                item_id
            ),
        }
    }

    pub fn orphaned(domain: &str, item_id: &str) -> Self {
        Self {
            kind: IssueKind::Orphaned,
            severity: IssueKind::Orphaned.severity(),
            domain: domain.to_string(),
            item_id: item_id.to_string(),
            field: None,
            target_domain: None,
            target_id: None,
            message: format!("{}:{} has no incoming or outgoing relationships", domain, item_id),
        }
    }

    pub fn invalid_relationship_type(domain: &str, item_id: &str, field: &str) -> Self {
        Self {
            kind: IssueKind::InvalidRelationshipType,
            severity: IssueKind::InvalidRelationshipType.severity(),
            domain: domain.to_string(),
            item_id: item_id.to_string(),
            field: Some(field.to_string()),
            target_domain: None,
            target_id: None,
            message: format!(
                "{}:{} uses relationship field '{}' which is not declared for {}",
                domain, item_id, field, domain
            ),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_by_kind() {
        assert_eq!(IssueKind::BrokenReference.severity(), Severity::Error);
        assert_eq!(IssueKind::MissingBacklink.severity(), Severity::Warning);
        assert_eq!(IssueKind::InvalidRelationshipType.severity(), Severity::Warning);
        assert_eq!(IssueKind::Orphaned.severity(), Severity::Info);
    }

    #[test]
    fn test_issue_serializes_with_snake_case_kind() {
        let issue = Issue::broken_reference(
            "materials",
            "steel",
            "related_contaminants",
            "contaminants",
            "rust",
        );
        let json = serde_json::to_value(&issue).unwrap();

        assert_eq!(json["kind"], "broken_reference");
        assert_eq!(json["severity"], "error");
        assert_eq!(json["target_id"], "rust");
    }

    #[test]
    fn test_orphan_omits_edge_fields() {
        let json = serde_json::to_value(Issue::orphaned("settings", "copper-settings")).unwrap();

        assert!(json.get("field").is_none());
        assert!(json.get("target_id").is_none());
        assert_eq!(json["kind"], "orphaned");
    }

    #[test]
    fn test_display() {
        let issue = Issue::invalid_relationship_type("materials", "steel", "related_machines");
        let text = issue.to_string();

        assert!(text.starts_with("[warning] invalid_relationship_type:"));
        assert!(text.contains("related_machines"));
    }
}
