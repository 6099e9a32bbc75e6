//! Command-line interface definitions using clap.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Cross-domain relationship integrity checker
///
/// Validates and repairs the references between the materials, contaminants,
/// compounds and settings YAML files of a dataset.
///
/// Exit Codes:
///   0  - No broken references
///   1  - Broken references found (validate), changes pending (repair --dry-run),
///        or repair incomplete
///   2  - Invalid arguments or configuration
///  10  - Unexpected file system failure
#[derive(Parser, Debug)]
#[command(name = "xlink", version)]
#[command(about = "Cross-domain relationship integrity checker", long_about = None)]
pub struct Cli {
    /// Dataset root containing one directory per domain
    #[arg(long, global = true, env = "XLINK_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Config file (default: <data-dir>/xlink.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Only check and repair items of this source domain
    #[arg(long, global = true)]
    pub domain: Option<String>,

    /// Output JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output (for scripting)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check every reference and report integrity issues
    ///
    /// Reports broken references (errors), missing backlinks and undeclared
    /// relationship fields (warnings), and orphaned items (info, shown with -v).
    Validate,

    /// Fix or prune broken references
    ///
    /// Known naming drifts (e.g. 'rust' vs 'rust-contamination') are rewritten;
    /// references with no match are removed. Each modified file is copied to
    /// '<file>.backup' before it is overwritten.
    Repair {
        /// Show what would change without writing anything
        #[arg(long)]
        dry_run: bool,

        /// With --dry-run, print a unified diff per file
        #[arg(long, requires = "dry_run")]
        diff: bool,
    },

    /// Print the relationship schema in effect
    Schema,
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Validate => "validate",
            Commands::Repair { .. } => "repair",
            Commands::Schema => "schema",
        }
    }
}
