//! Configuration file loading and parsing.
//!
//! xlink reads optional settings from `xlink.toml` in the data directory, or
//! from a file passed with `--config`. If no config file exists, the compiled
//! defaults apply.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default config file name, looked up inside the data directory.
pub const CONFIG_FILE: &str = "xlink.toml";

/// Default suffix appended to a domain file name to form its backup path.
pub const DEFAULT_BACKUP_SUFFIX: &str = "backup";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct XlinkConfig {
    /// Per-domain file location overrides (optional).
    pub domains: Option<BTreeMap<String, DomainFileConfig>>,
    /// Validation behavior (optional).
    pub validation: Option<ValidationConfig>,
    /// Link repair behavior (optional).
    pub repair: Option<RepairConfig>,
    /// Schema extensions (optional).
    pub schema: Option<SchemaConfig>,
}

/// Override where a domain's file lives or which root key it uses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DomainFileConfig {
    /// File path relative to the data directory.
    pub file: Option<String>,
    /// Root container key inside the file.
    pub container_key: Option<String>,
}

/// Validation behavior configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidationConfig {
    /// Emit `orphaned` info issues (default: true).
    pub report_orphans: Option<bool>,
}

impl ValidationConfig {
    pub fn report_orphans(&self) -> bool {
        self.report_orphans.unwrap_or(true)
    }
}

/// Link repair configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepairConfig {
    /// Extension appended to backups: `<file>.<backup_suffix>` (default: "backup").
    pub backup_suffix: Option<String>,
    /// Target domain to id suffix used by the suffix repair strategy.
    /// Entries override or extend the builtin suffixes.
    pub suffixes: Option<BTreeMap<String, String>>,
}

impl RepairConfig {
    pub fn backup_suffix(&self) -> String {
        self.backup_suffix
            .clone()
            .unwrap_or_else(|| DEFAULT_BACKUP_SUFFIX.to_string())
    }
}

/// Schema extensions declared in config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaConfig {
    pub relationships: Option<Vec<RelationshipConfig>>,
}

/// An extra relationship field, optionally paired with an inverse.
#[derive(Debug, Clone, Deserialize)]
pub struct RelationshipConfig {
    pub domain: String,
    pub field: String,
    pub target: String,
    /// Inverse field as `<domain>.<field>`.
    pub inverse: Option<String>,
}

impl XlinkConfig {
    /// Load configuration from `path` if it exists.
    ///
    /// Returns the default config if the file doesn't exist.
    /// Returns an error if the file exists but is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config: XlinkConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        Ok(config)
    }

    /// Resolve and load the config for a run.
    ///
    /// An explicit path must exist; the implicit `<data_dir>/xlink.toml` is optional.
    pub fn resolve(data_dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Self::load(path)
            }
            None => Self::load(&Self::default_path(data_dir)),
        }
    }

    pub fn default_path(data_dir: &Path) -> PathBuf {
        data_dir.join(CONFIG_FILE)
    }

    pub fn domain_overrides(&self) -> impl Iterator<Item = (&String, &DomainFileConfig)> {
        self.domains.iter().flatten()
    }

    pub fn extra_relationships(&self) -> &[RelationshipConfig] {
        self.schema
            .as_ref()
            .and_then(|s| s.relationships.as_deref())
            .unwrap_or(&[])
    }

    pub fn report_orphans(&self) -> bool {
        self.validation
            .as_ref()
            .map(ValidationConfig::report_orphans)
            .unwrap_or(true)
    }

    pub fn backup_suffix(&self) -> String {
        self.repair
            .as_ref()
            .map(RepairConfig::backup_suffix)
            .unwrap_or_else(|| DEFAULT_BACKUP_SUFFIX.to_string())
    }

    pub fn suffix_overrides(&self) -> impl Iterator<Item = (&String, &String)> {
        self.repair
            .as_ref()
            .and_then(|r| r.suffixes.as_ref())
            .into_iter()
            .flatten()
    }
}
