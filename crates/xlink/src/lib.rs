//! Cross-domain relationship integrity for YAML datasets.
//!
//! A dataset is a set of domain files (materials, contaminants, compounds,
//! settings) whose items reference each other by id. This library loads them,
//! indexes every id, reports broken, one-directional and orphaned links, and
//! repairs known naming drift with backups.

pub mod backlinks;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod index;
pub mod issue;
pub mod orphans;
pub mod output;
pub mod repair;
pub mod report;
pub mod schema;
pub mod store;
pub mod validator;

mod test_support;

// Re-export commonly used types
pub use engine::{Engine, RepairRun};
pub use graph::Scope;
pub use issue::{Issue, IssueKind, Severity};
pub use output::{ExitCode, JsonError, JsonOutput};
pub use report::Report;
pub use schema::Schema;
pub use store::DomainSet;
