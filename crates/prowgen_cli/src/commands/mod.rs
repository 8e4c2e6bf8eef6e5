//! CLI command definitions.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prowgen_templates::GeneratorConfig;

pub mod generate;
pub mod lint;

/// prowgen - Prow job generator and linter
#[derive(Parser)]
#[command(name = "prowgen")]
#[command(version, about = "prowgen - expand job templates into Prow jobs and lint them")]
#[command(long_about = r#"
prowgen expands job templates into Prow job configuration and checks
generated job files against the job conventions.

COMMANDS:
  generate  → Expand job templates over the configured axes and write Prow jobs
  lint      → Check presubmit and postsubmit job files

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Lint failure
  4 - Template error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate Prow jobs from job templates
    Generate(generate::GenerateArgs),

    /// Lint Prow job files
    Lint(lint::LintArgs),
}

/// Returned when linting found convention violations.
#[derive(Debug)]
pub struct LintFailed {
    pub violations: usize,
}

impl fmt::Display for LintFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validations failed with {} violation(s)", self.violations)
    }
}

impl std::error::Error for LintFailed {}

/// Load the generator configuration, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<GeneratorConfig> {
    match path {
        Some(path) => GeneratorConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(GeneratorConfig::default()),
    }
}

/// Resolve a path against a base directory unless it is absolute.
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
