//! Git helpers for finding the job files touched by a change.

use std::path::{Path, PathBuf};
use std::process::Command;

use glob::Pattern;
use tracing::{debug, info};

use crate::error::{LintError, LintResult};

/// Job file patterns the linter checks, relative to the repository root.
pub const JOB_FILE_PATTERNS: [&str; 2] = ["jobs/**/*presubmits*.yaml", "jobs/**/*postsubmits*.yaml"];

/// Git operations on a repository checkout.
#[derive(Debug)]
pub struct GitOps {
    repo_path: PathBuf,
}

impl GitOps {
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Self {
        Self {
            repo_path: repo_path.as_ref().to_path_buf(),
        }
    }

    /// Top-level directory of the repository containing `path`.
    pub fn toplevel(path: &Path) -> LintResult<PathBuf> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(path)
            .output()
            .map_err(|e| LintError::Git(format!("Failed to run git rev-parse: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LintError::Git(format!("git rev-parse failed: {}", stderr)));
        }

        Ok(PathBuf::from(String::from_utf8_lossy(&output.stdout).trim()))
    }

    /// Files changed between two revisions.
    pub fn changed_files(&self, base: &str, head: &str) -> LintResult<Vec<String>> {
        info!("git -C {} diff --name-only {} {}", self.repo_path.display(), base, head);

        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo_path)
            .args(["diff", "--name-only", base, head])
            .output()
            .map_err(|e| LintError::Git(format!("Failed to run git diff: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LintError::Git(format!("git diff failed: {}", stderr)));
        }

        let files: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .split_whitespace()
            .map(str::to_string)
            .collect();
        debug!("{} file(s) changed", files.len());
        Ok(files)
    }

    /// Changed presubmit and postsubmit job files between two revisions.
    pub fn changed_job_files(&self, base: &str, head: &str) -> LintResult<Vec<String>> {
        Ok(filter_job_files(self.changed_files(base, head)?))
    }
}

/// Keep only presubmit and postsubmit job files.
pub fn filter_job_files<I, S>(files: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let patterns: Vec<Pattern> = JOB_FILE_PATTERNS
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .collect();

    files
        .into_iter()
        .map(Into::into)
        .filter(|file| patterns.iter().any(|p| p.matches(file)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_job_files() {
        let files = filter_job_files([
            "jobs/aws/eks-distro/build-1-28-presubmits.yaml",
            "jobs/aws/eks-distro/build-1-28-postsubmits.yaml",
            "jobs/aws/eks-distro/nightly-periodics.yaml",
            "templater/jobs/presubmit/eks-distro/build-1-X-presubmits.yaml.bak",
            "README.md",
        ]);

        assert_eq!(
            files,
            vec![
                "jobs/aws/eks-distro/build-1-28-presubmits.yaml",
                "jobs/aws/eks-distro/build-1-28-postsubmits.yaml",
            ]
        );
    }

    #[test]
    fn test_job_file_patterns_are_valid() {
        for pattern in JOB_FILE_PATTERNS {
            assert!(Pattern::new(pattern).is_ok());
        }
    }
}
