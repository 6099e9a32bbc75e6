//! Run orchestration: load, index, validate, repair, report.

use crate::backlinks;
use crate::config::XlinkConfig;
use crate::errors::{unknown_domain, ActionableError};
use crate::graph::Scope;
use crate::index::Index;
use crate::orphans;
use crate::output::ExitCode;
use crate::repair::{self, RepairOptions, RepairStats, StrategyRegistry};
use crate::report::Report;
use crate::schema::Schema;
use crate::store::DomainSet;
use crate::validator;
use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything a run needs, resolved once from CLI arguments and config.
pub struct Engine {
    data_dir: PathBuf,
    schema: Schema,
    registry: StrategyRegistry,
    report_orphans: bool,
    backup_suffix: String,
}

/// Result of `repair`: the report it acted on, what it did, and (when files
/// were written) a report from a fresh load afterwards.
#[derive(Debug, Serialize)]
pub struct RepairRun {
    pub before: Report,
    pub stats: RepairStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Report>,
}

impl RepairRun {
    /// Dry run: 1 if anything would change. Write mode: 1 if a file was
    /// abandoned or broken references remain.
    pub fn exit_code(&self) -> ExitCode {
        let failed = if self.stats.dry_run {
            !self.stats.actions.is_empty()
        } else {
            self.stats.has_failures()
                || self
                    .after
                    .as_ref()
                    .map(|r| r.has_errors)
                    .unwrap_or(self.before.has_errors)
        };
        if failed {
            ExitCode::IntegrityFailed
        } else {
            ExitCode::Success
        }
    }
}

impl Engine {
    pub fn new(data_dir: &Path, config: &XlinkConfig) -> Result<Self> {
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            schema: Schema::with_config(config)?,
            registry: StrategyRegistry::with_config(config),
            report_orphans: config.report_orphans(),
            backup_suffix: config.backup_suffix(),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Turn `--domain` into a scope, rejecting names the schema doesn't know.
    pub fn scope(&self, domain: Option<&str>) -> Result<Scope, ActionableError> {
        match domain {
            Some(name) if !self.schema.has_domain(name) => {
                Err(unknown_domain(name, &self.schema.domain_names()))
            }
            other => Ok(Scope::from_option(other)),
        }
    }

    pub fn load(&self) -> DomainSet {
        DomainSet::load(&self.schema, &self.data_dir)
    }

    /// Load the dataset and validate it.
    pub fn validate(&self, scope: &Scope) -> Report {
        let set = self.load();
        let index = Index::build(&set);
        self.check(&set, &index, scope)
    }

    /// Validate an already-loaded set against its index.
    pub fn check(&self, set: &DomainSet, index: &Index, scope: &Scope) -> Report {
        let (graph, mut issues) = validator::validate(set, index, &self.schema, scope);
        issues.extend(backlinks::check(&graph, &self.schema, scope));
        if self.report_orphans {
            issues.extend(orphans::find_orphans(index, &graph, scope));
        }

        let report = Report::build(set, scope, issues);
        info!(
            scope = %scope,
            issues = report.counts.total,
            has_errors = report.has_errors,
            "validation complete"
        );
        report
    }

    /// Validate, repair, and (unless dry-run) re-validate from disk.
    pub fn repair(&self, scope: &Scope, dry_run: bool, diff: bool) -> RepairRun {
        let mut set = self.load();
        let index = Index::build(&set);
        let before = self.check(&set, &index, scope);

        let options = RepairOptions {
            dry_run,
            diff,
            backup_suffix: self.backup_suffix.clone(),
            scope: scope.clone(),
        };
        let stats = repair::repair(&mut set, &index, &self.schema, &self.registry, &options);
        info!(
            fixed = stats.fixed(),
            removed = stats.removed(),
            files = stats.files_written.len(),
            failures = stats.failures.len(),
            dry_run,
            "repair pass complete"
        );

        let after = (!dry_run && !stats.files_written.is_empty()).then(|| self.validate(scope));

        RepairRun {
            before,
            stats,
            after,
        }
    }
}
