//! Lint command - Check Prow job files against the job conventions.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use prowgen_lint::{GitOps, Linter};

use super::{load_config, LintFailed};

#[derive(Args)]
pub struct LintArgs {
    /// Repository root; defaults to the git top-level of the current directory
    #[arg(long)]
    root: Option<PathBuf>,

    /// Base revision of the change
    #[arg(long, env = "PULL_BASE_SHA", requires = "head")]
    base: Option<String>,

    /// Head revision of the change
    #[arg(long, env = "PULL_PULL_SHA", requires = "base")]
    head: Option<String>,

    /// Generator configuration file (YAML)
    #[arg(short, long, env = "PROWGEN_CONFIG")]
    config: Option<PathBuf>,

    /// Job files to lint, relative to the root; overrides --base/--head
    files: Vec<String>,
}

pub fn execute(args: LintArgs) -> Result<()> {
    let root = match args.root {
        Some(root) => root,
        None => GitOps::toplevel(&std::env::current_dir()?)
            .context("Failed to find repository root")?,
    };
    let config = load_config(args.config.as_deref())?;

    let files = if !args.files.is_empty() {
        args.files
    } else {
        match (&args.base, &args.head) {
            (Some(base), Some(head)) => GitOps::new(&root)
                .changed_job_files(base, head)
                .context("Failed to list changed files")?,
            _ => anyhow::bail!("Either job files or --base and --head must be given"),
        }
    };

    if files.is_empty() {
        println!("⚠️  No job files to lint");
        return Ok(());
    }
    info!("Linting {} job file(s) under {:?}", files.len(), root);

    let linter = Linter::new(&root, &config).context("Failed to index job names")?;
    let report = linter.lint_files(&files).context("Failed to lint job files")?;

    print!("{}", report);
    println!();

    if report.passed() {
        println!("✅ Validations passed!");
        Ok(())
    } else {
        println!("❌ Validations failed!");
        Err(LintFailed {
            violations: report.violation_count(),
        }
        .into())
    }
}
