//! Broken link repair.
//!
//! Every reference in a declared relationship field goes through
//! `Unchecked -> Valid | Fixable | Unfixable`:
//!
//! - **Valid**: the target exists, nothing to do.
//! - **Fixable**: a [`RepairStrategy`] registered for the target domain
//!   proposes an id that exists; the reference is rewritten (metadata kept).
//! - **Unfixable**: no strategy applies; the reference is removed.
//!
//! Fields whose target domain failed to load are never classified. Their
//! references are kept as they are and reported as [`SkippedField`]s.
//!
//! Strategies are deterministic string transforms, never fuzzy matches, so
//! every change is auditable and reversible from the backup.
//!
//! When not in dry-run mode each modified file is committed in two steps:
//! copy the original to `<file>.backup` and verify the copy by SHA-256, then
//! write the edited document atomically. If the backup step fails nothing is
//! written for that file and the next file is processed.

use crate::config::XlinkConfig;
use crate::errors::RepairError;
use crate::graph::Scope;
use crate::index::Index;
use crate::schema::{Schema, CONTAMINANTS, SETTINGS};
use crate::store::{DomainSet, DomainStore};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Proposes a replacement id for a broken reference.
pub trait RepairStrategy: Send + Sync {
    /// Short name recorded with each fix.
    fn name(&self) -> &str;

    /// Return an id that `exists` accepts, or `None`.
    fn try_fix(&self, id: &str, exists: &dyn Fn(&str) -> bool) -> Option<String>;
}

/// Appends `suffix` when absent, strips it when present.
#[derive(Debug, Clone)]
pub struct SuffixStrategy {
    suffix: String,
    name: String,
}

impl SuffixStrategy {
    pub fn new(suffix: impl Into<String>) -> Self {
        let suffix = suffix.into();
        let name = format!("suffix({})", suffix);
        Self { suffix, name }
    }
}

impl RepairStrategy for SuffixStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_fix(&self, id: &str, exists: &dyn Fn(&str) -> bool) -> Option<String> {
        if self.suffix.is_empty() {
            return None;
        }
        let candidate = match id.strip_suffix(self.suffix.as_str()) {
            Some("") => return None,
            Some(stem) => stem.to_string(),
            None => format!("{}{}", id, self.suffix),
        };
        exists(&candidate).then_some(candidate)
    }
}

/// Strategies keyed by target domain. Domains without an entry are never
/// fixed, only pruned.
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Box<dyn RepairStrategy>>,
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        Self {
            strategies: BTreeMap::new(),
        }
    }

    /// `contaminants: -contamination`, `settings: -settings`.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(CONTAMINANTS, SuffixStrategy::new("-contamination"));
        registry.register(SETTINGS, SuffixStrategy::new("-settings"));
        registry
    }

    /// Builtins overridden or extended by `[repair.suffixes]`.
    pub fn with_config(config: &XlinkConfig) -> Self {
        let mut registry = Self::builtin();
        for (domain, suffix) in config.suffix_overrides() {
            registry.register(domain, SuffixStrategy::new(suffix.clone()));
        }
        registry
    }

    pub fn register(&mut self, domain: &str, strategy: impl RepairStrategy + 'static) {
        self.strategies
            .insert(domain.to_string(), Box::new(strategy));
    }

    pub fn get(&self, domain: &str) -> Option<&dyn RepairStrategy> {
        self.strategies.get(domain).map(|s| s.as_ref())
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Classification of one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceState {
    Valid,
    Fixable { replacement: String, strategy: String },
    Unfixable,
}

/// Classify `id` as a reference into `target_domain`.
pub fn classify(
    index: &Index,
    registry: &StrategyRegistry,
    target_domain: &str,
    id: &str,
) -> ReferenceState {
    if index.exists(target_domain, id) {
        return ReferenceState::Valid;
    }
    let exists = |candidate: &str| index.exists(target_domain, candidate);
    match registry
        .get(target_domain)
        .and_then(|s| s.try_fix(id, &exists).map(|fix| (fix, s.name().to_string())))
    {
        Some((replacement, strategy)) => ReferenceState::Fixable {
            replacement,
            strategy,
        },
        None => ReferenceState::Unfixable,
    }
}

/// What happened to one broken reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RepairOutcome {
    Fixed { replacement: String, strategy: String },
    Removed { reason: String },
}

/// One change to one reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairAction {
    pub domain: String,
    pub item_id: String,
    pub field: String,
    pub target_domain: String,
    pub original_id: String,
    #[serde(skip)]
    pub position: usize,
    #[serde(flatten)]
    pub outcome: RepairOutcome,
}

impl std::fmt::Display for RepairAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.outcome {
            RepairOutcome::Fixed { replacement, .. } => write!(
                f,
                "{}:{} {}: '{}' -> '{}'",
                self.domain, self.item_id, self.field, self.original_id, replacement
            ),
            RepairOutcome::Removed { reason } => write!(
                f,
                "{}:{} {}: remove '{}' ({})",
                self.domain, self.item_id, self.field, self.original_id, reason
            ),
        }
    }
}

/// A file whose repairs were abandoned.
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub domain: String,
    pub path: PathBuf,
    pub error: String,
    /// Actions that were planned but not written.
    pub abandoned_actions: usize,
}

/// A field left untouched because its target domain did not load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedField {
    pub domain: String,
    pub item_id: String,
    pub field: String,
    pub target_domain: String,
    pub references: usize,
}

impl std::fmt::Display for SkippedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} {}: {} reference(s) kept, {} did not load",
            self.domain, self.item_id, self.field, self.references, self.target_domain
        )
    }
}

/// Unified diff of a file that a dry run would change.
#[derive(Debug, Clone, Serialize)]
pub struct FilePreview {
    pub domain: String,
    pub path: PathBuf,
    pub diff: String,
}

#[derive(Debug, Clone)]
pub struct RepairOptions {
    pub dry_run: bool,
    /// Render a diff per changed file (dry run only).
    pub diff: bool,
    pub backup_suffix: String,
    pub scope: Scope,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            diff: false,
            backup_suffix: crate::config::DEFAULT_BACKUP_SUFFIX.to_string(),
            scope: Scope::All,
        }
    }
}

/// Outcome of one repair pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairStats {
    pub dry_run: bool,
    /// Applied (or, in a dry run, planned) actions in deterministic order.
    pub actions: Vec<RepairAction>,
    pub files_written: Vec<PathBuf>,
    pub backups: Vec<PathBuf>,
    pub failures: Vec<FileFailure>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedField>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub previews: Vec<FilePreview>,
}

impl RepairStats {
    pub fn fixed(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a.outcome, RepairOutcome::Fixed { .. }))
            .count()
    }

    pub fn removed(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a.outcome, RepairOutcome::Removed { .. }))
            .count()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Repair every in-scope domain.
///
/// `index` must be the snapshot the data was validated against; it is not
/// rebuilt as files change.
pub fn repair(
    set: &mut DomainSet,
    index: &Index,
    schema: &Schema,
    registry: &StrategyRegistry,
    options: &RepairOptions,
) -> RepairStats {
    let mut stats = RepairStats {
        dry_run: options.dry_run,
        ..Default::default()
    };

    let domains: Vec<String> = set
        .stores()
        .iter()
        .filter(|s| s.is_loaded() && options.scope.includes(s.name()))
        .map(|s| s.name().to_string())
        .collect();

    for domain in domains {
        let Some(store) = set.get_mut(&domain) else {
            continue;
        };

        stats.skipped.extend(unresolved_fields(store, index, schema));
        let actions = plan(store, index, schema, registry);
        if actions.is_empty() {
            continue;
        }

        let mut edited = store.clone();
        apply(&mut edited, &actions);

        if options.dry_run {
            if options.diff {
                match preview(store, &edited) {
                    Ok(preview) => stats.previews.push(preview),
                    Err(err) => warn!(domain = %domain, "cannot render diff: {}", err),
                }
            }
            stats.actions.extend(actions);
            continue;
        }

        match commit(&edited, &options.backup_suffix) {
            Ok(backup) => {
                info!(
                    domain = %domain,
                    actions = actions.len(),
                    backup = %backup.display(),
                    "repaired domain file"
                );
                stats.files_written.push(edited.path().to_path_buf());
                stats.backups.push(backup);
                stats.actions.extend(actions);
                *store = edited;
            }
            Err(err) => {
                warn!(domain = %domain, "repair aborted: {}", err);
                stats.failures.push(FileFailure {
                    domain: domain.clone(),
                    path: store.path().to_path_buf(),
                    error: err.to_string(),
                    abandoned_actions: actions.len(),
                });
            }
        }
    }

    stats
}

/// Compute the actions for one store without touching it.
pub fn plan(
    store: &DomainStore,
    index: &Index,
    schema: &Schema,
    registry: &StrategyRegistry,
) -> Vec<RepairAction> {
    let domain = store.name();
    let mut actions = Vec::new();

    for item in store.items() {
        for field in &item.relationships {
            // Undeclared fields have no known target; leave them alone.
            let Some(target) = schema.target_of(domain, &field.name) else {
                continue;
            };
            // Without the target's ids every reference would look broken.
            if !index.is_available(target) {
                continue;
            }

            let mut present: HashSet<String> = field
                .references
                .iter()
                .filter(|r| index.exists(target, &r.id))
                .map(|r| r.id.clone())
                .collect();

            for (position, reference) in field.references.iter().enumerate() {
                let outcome = match classify(index, registry, target, &reference.id) {
                    ReferenceState::Valid => continue,
                    ReferenceState::Fixable {
                        replacement,
                        strategy,
                    } => {
                        if present.insert(replacement.clone()) {
                            RepairOutcome::Fixed {
                                replacement,
                                strategy,
                            }
                        } else {
                            RepairOutcome::Removed {
                                reason: format!("duplicate of '{}'", replacement),
                            }
                        }
                    }
                    ReferenceState::Unfixable => RepairOutcome::Removed {
                        reason: format!("no matching id in {}", target),
                    },
                };

                actions.push(RepairAction {
                    domain: domain.to_string(),
                    item_id: item.id.clone(),
                    field: field.name.clone(),
                    target_domain: target.to_string(),
                    original_id: reference.id.clone(),
                    position,
                    outcome,
                });
            }
        }
    }

    actions
}

/// Declared fields of `store` whose target domain is unavailable.
pub fn unresolved_fields(store: &DomainStore, index: &Index, schema: &Schema) -> Vec<SkippedField> {
    let domain = store.name();
    store
        .items()
        .iter()
        .flat_map(|item| {
            item.relationships.iter().filter_map(move |field| {
                let target = schema.target_of(domain, &field.name)?;
                (!index.is_available(target) && !field.references.is_empty()).then(|| {
                    SkippedField {
                        domain: domain.to_string(),
                        item_id: item.id.clone(),
                        field: field.name.clone(),
                        target_domain: target.to_string(),
                        references: field.references.len(),
                    }
                })
            })
        })
        .collect()
}

/// Apply planned actions to a store: rewrites first, then removals.
fn apply(store: &mut DomainStore, actions: &[RepairAction]) {
    let mut removals: BTreeMap<(&str, &str), Vec<usize>> = BTreeMap::new();

    for action in actions {
        match &action.outcome {
            RepairOutcome::Fixed { replacement, .. } => {
                store.replace_reference(&action.item_id, &action.field, action.position, replacement);
            }
            RepairOutcome::Removed { .. } => removals
                .entry((action.item_id.as_str(), action.field.as_str()))
                .or_default()
                .push(action.position),
        }
    }

    for ((item_id, field), positions) in removals {
        store.remove_references(item_id, field, &positions);
    }
}

/// `<file>.<suffix>` next to the original.
pub fn backup_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

fn commit(store: &DomainStore, backup_suffix: &str) -> Result<PathBuf, RepairError> {
    let path = store.path();
    let yaml = store.to_yaml().map_err(|source| RepairError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let backup = write_backup(path, backup_suffix)?;
    write_atomic(path, yaml.as_bytes()).map_err(|source| RepairError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(backup)
}

/// Copy `path` to its backup location and verify the copy.
fn write_backup(path: &Path, suffix: &str) -> Result<PathBuf, RepairError> {
    let backup = backup_path(path, suffix);
    let backup_err = |source| RepairError::Backup {
        path: path.to_path_buf(),
        backup: backup.clone(),
        source,
    };

    let original = compute_file_hash(path).map_err(backup_err)?;
    fs::copy(path, &backup).map_err(backup_err)?;
    let copied = compute_file_hash(&backup).map_err(backup_err)?;

    if original != copied {
        return Err(RepairError::BackupMismatch {
            path: path.to_path_buf(),
            backup,
        });
    }
    Ok(backup)
}

/// Write to a temp file in the same directory, then rename over `path`.
///
/// The temp file takes the permissions of the file it replaces.
fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    if let Ok(existing) = fs::metadata(path) {
        fs::set_permissions(temp.path(), existing.permissions())?;
    }
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn compute_file_hash(path: &Path) -> Result<String, std::io::Error> {
    let content = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(format!("{:x}", hasher.finalize()))
}

fn preview(before: &DomainStore, after: &DomainStore) -> Result<FilePreview, serde_yaml::Error> {
    use similar::TextDiff;

    let old = before.to_yaml()?;
    let new = after.to_yaml()?;
    let label = before.path().display().to_string();
    let diff = TextDiff::from_lines(&old, &new)
        .unified_diff()
        .context_radius(2)
        .header(&format!("a/{}", label), &format!("b/{}", label))
        .to_string();

    Ok(FilePreview {
        domain: before.name().to_string(),
        path: before.path().to_path_buf(),
        diff,
    })
}


#[cfg(test)]
#[path = "repair_proptests.rs"]
mod proptests;
