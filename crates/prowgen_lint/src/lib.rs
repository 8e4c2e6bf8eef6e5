//! # prowgen_lint
//!
//! Convention checks for generated Prow job files.
//!
//! The linter reads presubmit and postsubmit job files, either listed
//! explicitly or taken from a `git diff` between two revisions, and checks the
//! first job of each against the conventions of its job type: cluster, upload
//! bucket and service account, the make target it runs, reporting flags and
//! job name uniqueness.
//!
//! ## Example
//!
//! ```rust,no_run
//! use prowgen_lint::{GitOps, Linter};
//! use prowgen_templates::GeneratorConfig;
//!
//! let root = GitOps::toplevel(std::path::Path::new(".")).unwrap();
//! let files = GitOps::new(&root).changed_job_files("origin/main", "HEAD").unwrap();
//!
//! let linter = Linter::new(&root, &GeneratorConfig::default()).unwrap();
//! let report = linter.lint_files(&files).unwrap();
//! if !report.passed() {
//!     print!("{}", report);
//! }
//! ```

pub mod engine;
pub mod error;
pub mod git;
pub mod job;
pub mod rules;

pub use engine::{count_job_names, FileViolations, LintReport, Linter};
pub use error::{LintError, LintResult};
pub use git::{filter_job_files, GitOps};
pub use job::{find_line_number, JobFile, ProwJob, ProwJobFile};
pub use rules::{JobConstants, JobNameCounts, LintRule, MakeTargetRule, RuleSet, RuleType, RuleViolation};
