//! Integrity report aggregation and rendering.

use crate::graph::Scope;
use crate::issue::{Issue, IssueKind, Severity};
use crate::output::ExitCode;
use crate::store::{DomainSet, LoadWarning};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Per-domain load summary.
#[derive(Debug, Clone, Serialize)]
pub struct DomainSummary {
    pub name: String,
    pub path: PathBuf,
    pub items: usize,
    pub loaded: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Counts {
    pub total: usize,
    pub by_severity: BTreeMap<String, usize>,
    pub by_kind: BTreeMap<String, usize>,
}

impl Counts {
    fn tally(issues: &[Issue]) -> Self {
        let mut counts = Counts {
            total: issues.len(),
            ..Default::default()
        };
        for severity in [Severity::Error, Severity::Warning, Severity::Info] {
            counts.by_severity.insert(severity.as_str().to_string(), 0);
        }
        for kind in IssueKind::ALL {
            counts.by_kind.insert(kind.as_str().to_string(), 0);
        }
        for issue in issues {
            *counts
                .by_severity
                .entry(issue.severity.as_str().to_string())
                .or_default() += 1;
            *counts
                .by_kind
                .entry(issue.kind.as_str().to_string())
                .or_default() += 1;
        }
        counts
    }

    pub fn severity(&self, severity: Severity) -> usize {
        self.by_severity
            .get(severity.as_str())
            .copied()
            .unwrap_or(0)
    }

    pub fn kind(&self, kind: IssueKind) -> usize {
        self.by_kind.get(kind.as_str()).copied().unwrap_or(0)
    }
}

/// Result of one validation run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub scope: String,
    pub domains: Vec<DomainSummary>,
    pub load_warnings: Vec<LoadWarning>,
    pub issues: Vec<Issue>,
    pub counts: Counts,
    /// True iff at least one `broken_reference` was found.
    pub has_errors: bool,
}

impl Report {
    pub fn build(set: &DomainSet, scope: &Scope, issues: Vec<Issue>) -> Self {
        let domains = set
            .stores()
            .iter()
            .map(|store| DomainSummary {
                name: store.name().to_string(),
                path: store.path().to_path_buf(),
                items: store.len(),
                loaded: store.is_loaded(),
            })
            .collect();

        let counts = Counts::tally(&issues);
        let has_errors = counts.kind(IssueKind::BrokenReference) > 0;

        Self {
            generated_at: Utc::now(),
            scope: scope.to_string(),
            domains,
            load_warnings: set.load_warnings(),
            issues,
            counts,
            has_errors,
        }
    }

    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.has_errors {
            ExitCode::IntegrityFailed
        } else {
            ExitCode::Success
        }
    }

    /// Multi-line summary for terminals. `verbose` includes info-level issues.
    pub fn render_human(&self, verbose: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Cross-domain integrity report (scope: {})", self.scope);
        let _ = writeln!(out);

        let _ = writeln!(out, "Domains:");
        for domain in &self.domains {
            if domain.loaded {
                let _ = writeln!(
                    out,
                    "  {:<14} {:>5} items  {}",
                    domain.name,
                    domain.items,
                    domain.path.display()
                );
            } else {
                let _ = writeln!(
                    out,
                    "  {:<14} {:>5}        {}",
                    domain.name,
                    "-",
                    domain.path.display()
                );
            }
        }

        if !self.load_warnings.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Load warnings:");
            for warning in &self.load_warnings {
                let _ = writeln!(out, "  ⚠️  {}", warning);
            }
        }

        let shown: Vec<&Issue> = self
            .issues
            .iter()
            .filter(|i| verbose || i.severity != Severity::Info)
            .collect();
        if !shown.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Issues:");
            for issue in shown {
                let marker = match issue.severity {
                    Severity::Error => "❌",
                    Severity::Warning => "⚠️ ",
                    Severity::Info => "ℹ️ ",
                };
                let _ = writeln!(out, "  {} {}", marker, issue);
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Summary: {} error(s), {} warning(s), {} info",
            self.counts.severity(Severity::Error),
            self.counts.severity(Severity::Warning),
            self.counts.severity(Severity::Info)
        );
        if self.has_errors {
            let _ = write!(
                out,
                "❌ {} broken reference(s)",
                self.counts.kind(IssueKind::BrokenReference)
            );
        } else {
            let _ = write!(out, "✓ No broken references");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::dataset;

    fn sample_issues() -> Vec<Issue> {
        vec![
            Issue::broken_reference("materials", "steel", "related_contaminants", "contaminants", "rust"),
            Issue::missing_backlink(
                "materials",
                "steel",
                "related_settings",
                "settings",
                "steel-settings",
                "related_materials",
            ),
            Issue::orphaned("compounds", "ozone"),
        ]
    }

    #[test]
    fn test_counts_by_severity_and_kind() {
        let set = dataset("materials:\n  steel: {}\n", "contamination_patterns: {}\n");
        let report = Report::build(&set, &Scope::All, sample_issues());

        assert!(report.has_errors);
        assert_eq!(report.exit_code(), ExitCode::IntegrityFailed);
        assert_eq!(report.counts.total, 3);
        assert_eq!(report.counts.severity(Severity::Error), 1);
        assert_eq!(report.counts.severity(Severity::Warning), 1);
        assert_eq!(report.counts.severity(Severity::Info), 1);
        assert_eq!(report.counts.kind(IssueKind::InvalidRelationshipType), 0);
        assert_eq!(report.counts.by_kind.len(), IssueKind::ALL.len());
    }

    #[test]
    fn test_warnings_only_is_success() {
        let set = dataset("materials: {}\n", "contamination_patterns: {}\n");
        let issues = sample_issues().into_iter().skip(1).collect();
        let report = Report::build(&set, &Scope::All, issues);

        assert!(!report.has_errors);
        assert_eq!(report.exit_code(), ExitCode::Success);
        assert!(report.render_human(false).contains("✓ No broken references"));
    }

    #[test]
    fn test_render_hides_info_unless_verbose() {
        let set = dataset("materials: {}\n", "contamination_patterns: {}\n");
        let report = Report::build(&set, &Scope::All, sample_issues());

        assert!(!report.render_human(false).contains("ozone"));
        assert!(report.render_human(true).contains("ozone"));
        assert!(report.render_human(false).contains("1 broken reference(s)"));
    }

    #[test]
    fn test_report_serializes_kinds_as_snake_case() {
        let set = dataset("materials: {}\n", "contamination_patterns: {}\n");
        let report = Report::build(&set, &Scope::All, sample_issues());
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["has_errors"], true);
        assert_eq!(json["issues"][0]["kind"], "broken_reference");
        assert_eq!(json["counts"]["by_kind"]["missing_backlink"], 1);
        assert_eq!(json["domains"].as_array().unwrap().len(), 4);
    }
}
