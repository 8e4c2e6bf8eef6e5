//! Lint engine.
//!
//! Loads the job files to check, runs the presubmit or postsubmit rule set
//! against the first job of each, and collects the violations per file.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use prowgen_templates::{GeneratorConfig, JobType};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{LintError, LintResult};
use crate::job::{JobFile, ProwJobFile};
use crate::rules::{JobNameCounts, RuleSet, RuleViolation};

/// Count job names across every job file of an org directory.
///
/// Only the first job of each job list is counted, the same job each file is
/// linted by.
pub fn count_job_names(org_dir: &Path) -> LintResult<JobNameCounts> {
    let mut counts = JobNameCounts::new();
    if !org_dir.exists() {
        return Ok(counts);
    }

    for entry in WalkDir::new(org_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| LintError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !["presubmit", "postsubmit", "periodic"]
            .iter()
            .any(|kind| name.contains(kind))
        {
            continue;
        }

        let contents =
            std::fs::read_to_string(entry.path()).map_err(|source| LintError::FileRead {
                path: entry.path().to_path_buf(),
                source,
            })?;
        let file = ProwJobFile::parse(entry.path(), &contents)?;
        for job_name in file.first_job_names() {
            *counts.entry(job_name.to_string()).or_insert(0) += 1;
        }
    }

    debug!("Counted {} distinct job name(s)", counts.len());
    Ok(counts)
}

/// Violations of one job type, keyed by job file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileViolations {
    pub files: BTreeMap<String, Vec<RuleViolation>>,
}

impl FileViolations {
    pub fn has_errors(&self) -> bool {
        self.files.values().any(|v| !v.is_empty())
    }

    fn add(&mut self, file_name: &str, violations: Vec<RuleViolation>) {
        if !violations.is_empty() {
            self.files
                .entry(file_name.to_string())
                .or_default()
                .extend(violations);
        }
    }
}

impl fmt::Display for FileViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (file, violations) in &self.files {
            writeln!(f, "\n{}:", file)?;
            for violation in violations {
                writeln!(f, "{}", violation.report_line())?;
            }
        }
        Ok(())
    }
}

/// Outcome of a lint run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintReport {
    pub presubmits: FileViolations,
    pub postsubmits: FileViolations,
    /// Number of files actually checked.
    pub files_checked: usize,
}

impl LintReport {
    pub fn passed(&self) -> bool {
        !self.presubmits.has_errors() && !self.postsubmits.has_errors()
    }

    pub fn violation_count(&self) -> usize {
        self.presubmits
            .files
            .values()
            .chain(self.postsubmits.files.values())
            .map(Vec::len)
            .sum()
    }
}

impl fmt::Display for LintReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.presubmits)?;
        write!(f, "{}", self.postsubmits)
    }
}

/// Runs the convention checks over job files of a repository checkout.
pub struct Linter {
    root: PathBuf,
    presubmit: RuleSet,
    postsubmit: RuleSet,
    names: JobNameCounts,
}

impl Linter {
    /// Create a linter for the checkout at `root`, counting job names under
    /// `<root>/jobs/<org>`.
    pub fn new(root: impl Into<PathBuf>, config: &GeneratorConfig) -> LintResult<Self> {
        let root = root.into();
        let names = count_job_names(&root.join("jobs").join(&config.org))?;
        Self::with_names(root, config, names)
    }

    /// Create a linter with precomputed job name counts.
    pub fn with_names(
        root: impl Into<PathBuf>,
        config: &GeneratorConfig,
        names: JobNameCounts,
    ) -> LintResult<Self> {
        Ok(Self {
            root: root.into(),
            presubmit: RuleSet::for_job_type(
                JobType::Presubmit,
                config.defaults_for(JobType::Presubmit),
            )?,
            postsubmit: RuleSet::for_job_type(
                JobType::Postsubmit,
                config.defaults_for(JobType::Postsubmit),
            )?,
            names,
        })
    }

    /// Lint job files given relative to the root.
    ///
    /// Files are checked as presubmits when their name contains `presubmits`
    /// and as postsubmits when it contains `postsubmits`. Missing files are
    /// skipped; unreadable or malformed files abort the run.
    pub fn lint_files<P: AsRef<Path>>(&self, files: &[P]) -> LintResult<LintReport> {
        let mut report = LintReport::default();

        for relative in files {
            let relative = relative.as_ref();
            let name = relative
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let kinds: Vec<JobType> = [JobType::Presubmit, JobType::Postsubmit]
                .into_iter()
                .filter(|kind| name.contains(&format!("{}s", kind.as_str())))
                .collect();
            if kinds.is_empty() {
                debug!("Skipping {:?}, not a presubmit or postsubmit file", relative);
                continue;
            }

            let file = match JobFile::load(&self.root, relative)? {
                Some(file) => file,
                None => continue,
            };
            report.files_checked += 1;

            for kind in kinds {
                let violations = self.lint_job_file(&file, kind)?;
                match kind {
                    JobType::Presubmit => report.presubmits.add(&file.file_name, violations),
                    _ => report.postsubmits.add(&file.file_name, violations),
                }
            }
        }

        info!(
            "Linted {} file(s), {} violation(s)",
            report.files_checked,
            report.violation_count()
        );
        Ok(report)
    }

    /// Check the first job listed for the file's repository.
    pub fn lint_job_file(&self, file: &JobFile, job_type: JobType) -> LintResult<Vec<RuleViolation>> {
        let (jobs, rules) = match job_type {
            JobType::Presubmit => (&file.jobs.presubmits, &self.presubmit),
            JobType::Postsubmit => (&file.jobs.postsubmits, &self.postsubmit),
            JobType::Periodic => return Ok(Vec::new()),
        };

        let repo_jobs = jobs.get(&file.repo).ok_or_else(|| LintError::MissingRepo {
            file: file.path.display().to_string(),
            repo: file.repo.clone(),
            job_type: job_type.to_string(),
        })?;
        let job = repo_jobs.first().ok_or_else(|| LintError::EmptyJobList {
            file: file.path.display().to_string(),
            repo: file.repo.clone(),
            job_type: job_type.to_string(),
        })?;

        Ok(rules.evaluate(job, &file.contents, &self.names))
    }
}
