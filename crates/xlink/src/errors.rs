//! Error types and actionable error formatting.
//!
//! Library failures are typed enums ([`DomainLoadError`], [`RepairError`]).
//! User-facing failures that abort a command are wrapped in
//! [`ActionableError`], which carries possible causes and remediation steps.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to load one domain file.
///
/// Fatal for that domain only: the run continues with an empty item map and a
/// load warning.
#[derive(Debug, Error)]
pub enum DomainLoadError {
    #[error("domain '{domain}': file not found: {}", path.display())]
    Missing { domain: String, path: PathBuf },

    #[error("domain '{domain}': failed to read {}: {source}", path.display())]
    Io {
        domain: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("domain '{domain}': failed to parse {}: {source}", path.display())]
    Parse {
        domain: String,
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(
        "domain '{domain}': expected root key '{expected}' in {}, found [{}]",
        path.display(),
        found.join(", ")
    )]
    WrongRoot {
        domain: String,
        path: PathBuf,
        expected: String,
        found: Vec<String>,
    },

    #[error("domain '{domain}': '{key}' in {} is not a mapping of items", path.display())]
    NotAMapping {
        domain: String,
        path: PathBuf,
        key: String,
    },
}

impl DomainLoadError {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. })
    }
}

/// Failure while committing repairs to one domain file.
///
/// Fatal for that file only: nothing is written and the repairer moves on.
#[derive(Debug, Error)]
pub enum RepairError {
    #[error("failed to back up {} to {}: {source}", path.display(), backup.display())]
    Backup {
        path: PathBuf,
        backup: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("backup {} does not match {} (checksum mismatch)", backup.display(), path.display())]
    BackupMismatch { path: PathBuf, backup: PathBuf },

    #[error("failed to serialize {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An error with diagnostic context and remediation steps.
///
/// # Example
///
/// ```
/// use xlink::errors::ActionableError;
///
/// let error = ActionableError::new("Unknown domain 'metals'")
///     .with_cause("The domain name may be misspelled")
///     .with_remedy("List known domains: xlink schema");
///
/// eprintln!("{}", error);
/// ```
#[derive(Debug, Clone)]
pub struct ActionableError {
    error: String,
    causes: Vec<String>,
    remediation: Vec<String>,
}

impl ActionableError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            causes: Vec::new(),
            remediation: Vec::new(),
        }
    }

    /// Add a possible cause (diagnostic hint).
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    /// Add a remediation step (actionable fix).
    pub fn with_remedy(mut self, remedy: impl Into<String>) -> Self {
        self.remediation.push(remedy.into());
        self
    }

    /// The one-line error, without causes or remedies.
    pub fn message(&self) -> &str {
        &self.error
    }

    pub fn remedies(&self) -> &[String] {
        &self.remediation
    }

    /// Convert to a formatted error message suitable for display.
    pub fn to_error_message(&self) -> String {
        let mut msg = format!("{}\n", self.error);

        if !self.causes.is_empty() {
            msg.push_str("\nPossible causes:\n");
            for cause in &self.causes {
                msg.push_str(&format!("  • {}\n", cause));
            }
        }

        if !self.remediation.is_empty() {
            msg.push_str("\nTo fix:\n");
            for remedy in &self.remediation {
                msg.push_str(&format!("  • {}\n", remedy));
            }
        }

        msg
    }
}

impl fmt::Display for ActionableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_error_message())
    }
}

impl std::error::Error for ActionableError {}

/// `--domain` named a domain the schema doesn't know.
pub fn unknown_domain(name: &str, known: &[&str]) -> ActionableError {
    ActionableError::new(format!("Unknown domain '{}'", name))
        .with_cause("The domain name may be misspelled")
        .with_cause("Domain names are lowercase and plural (e.g. 'materials')")
        .with_remedy(format!("Use one of: {}", known.join(", ")))
        .with_remedy("List the compiled schema: xlink schema")
}

/// The config file could not be read or parsed.
pub fn invalid_config(path: &std::path::Path, cause: &anyhow::Error) -> ActionableError {
    ActionableError::new(format!("Invalid configuration in {}", path.display()))
        .with_cause(format!("{:#}", cause))
        .with_remedy("Check the TOML syntax of the config file")
        .with_remedy("Run without --config to use the compiled defaults")
}

/// The data directory does not exist at all.
pub fn data_dir_missing(path: &std::path::Path) -> ActionableError {
    ActionableError::new(format!("Data directory not found: {}", path.display()))
        .with_cause("The command may have been run from the wrong directory")
        .with_cause("XLINK_DATA_DIR may point to a stale location")
        .with_remedy("Pass the dataset root explicitly: xlink --data-dir <dir> validate")
}
