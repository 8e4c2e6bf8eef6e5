//! Lint rules and rule sets.
//!
//! A rule set holds the checks run against the first job of a presubmit or
//! postsubmit file. Each check either passes or yields a violation carrying
//! the line it points at.

use std::collections::HashMap;

use prowgen_templates::{JobDefaults, JobType};
use regex::Regex;
use serde::Serialize;
use tracing::info;

use crate::error::{LintError, LintResult};
use crate::job::{find_line_number, ProwJob};

/// Jobs exempt from the cluster, bucket and service account checks.
const EXEMPT_JOB_NAME: &str = "builder-base-tooling-presubmit";

/// Values every job of a job type must use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConstants {
    pub cluster: String,
    pub bucket: String,
    pub service_account_name: String,
}

impl JobConstants {
    pub fn new(defaults: &JobDefaults) -> Self {
        Self {
            cluster: defaults.cluster.clone(),
            bucket: defaults.bucket.clone(),
            service_account_name: defaults.service_account_name.clone(),
        }
    }
}

/// How a make target check picks the expected target from the job name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameSelector {
    Contains(String),
    Prefix(String),
}

impl NameSelector {
    fn matches(&self, job_name: &str) -> bool {
        match self {
            NameSelector::Contains(s) => job_name.contains(s.as_str()),
            NameSelector::Prefix(s) => job_name.starts_with(s.as_str()),
        }
    }
}

/// Expected make target of a job, by job name.
#[derive(Debug, Clone)]
pub struct MakeTargetRule {
    pattern: Regex,
    skip: Vec<Regex>,
    targets: Vec<(NameSelector, String)>,
    default_target: String,
}

impl MakeTargetRule {
    pub fn new(
        pattern: &str,
        skip: &[&str],
        targets: Vec<(NameSelector, String)>,
        default_target: impl Into<String>,
    ) -> LintResult<Self> {
        Ok(Self {
            pattern: compile(pattern)?,
            skip: skip.iter().map(|s| compile(s)).collect::<LintResult<_>>()?,
            targets,
            default_target: default_target.into(),
        })
    }

    /// Presubmit make targets.
    pub fn presubmit() -> LintResult<Self> {
        Self::new(
            r"make (\w+[-\w]+?).*",
            &[
                "golang.*presubmit",
                "golang.*presubmits",
                "eks-distro-base-test-presubmit",
                "eks-distro-base-tooling-presubmit",
                "lint",
            ],
            vec![
                (NameSelector::Contains("helm-chart".into()), "verify".into()),
                (NameSelector::Contains("release-tooling".into()), "test".into()),
                (NameSelector::Contains("test".into()), "test".into()),
            ],
            "build",
        )
    }

    /// Postsubmit make targets.
    pub fn postsubmit() -> LintResult<Self> {
        Self::new(
            r"make (\w+[-\w]*)",
            &[
                "golang.*postsubmit",
                "golang.*postsubmits",
                "build-1-2[1-9].*postsubmit",
                "announcement",
                "release",
            ],
            vec![
                (
                    NameSelector::Prefix("build-".into()),
                    "postsubmit-conformance".into(),
                ),
                (
                    NameSelector::Contains("attribution".into()),
                    "update-attribution-files".into(),
                ),
            ],
            "release",
        )
    }

    pub fn is_skipped(&self, job_name: &str) -> bool {
        self.skip.iter().any(|r| r.is_match(job_name))
    }

    pub fn expected_target(&self, job_name: &str) -> &str {
        self.targets
            .iter()
            .find(|(selector, _)| selector.matches(job_name))
            .map(|(_, target)| target.as_str())
            .unwrap_or(&self.default_target)
    }

    /// Make target invoked by a command line, if any.
    pub fn actual_target(&self, command_line: &str) -> Option<String> {
        self.pattern
            .captures(command_line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }
}

fn compile(pattern: &str) -> LintResult<Regex> {
    Regex::new(pattern).map_err(|source| LintError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// A single check.
#[derive(Debug, Clone)]
pub enum RuleType {
    AlwaysRunDisabled,
    SkipReportDisabled,
    Cluster { exempt: Option<String> },
    Bucket { exempt: Option<String> },
    ServiceAccount { exempt: Option<String> },
    MakeTarget(MakeTargetRule),
    UniqueName,
}

/// A lint rule.
#[derive(Debug, Clone)]
pub struct LintRule {
    pub id: String,
    pub rule_type: RuleType,
}

impl LintRule {
    pub fn new(id: impl Into<String>, rule_type: RuleType) -> Self {
        Self {
            id: id.into(),
            rule_type,
        }
    }
}

/// A violated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleViolation {
    pub rule_id: String,
    /// 1-based line in the job file, 0 when no line matched.
    pub line: usize,
    pub message: String,
}

impl RuleViolation {
    /// Report line: `<line>\t<message>`.
    pub fn report_line(&self) -> String {
        format!("{}\t{}", self.line, self.message)
    }
}

/// Number of jobs carrying each job name across the job tree.
pub type JobNameCounts = HashMap<String, usize>;

/// An ordered set of lint rules.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub name: String,
    pub constants: JobConstants,
    pub rules: Vec<LintRule>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>, constants: JobConstants) -> Self {
        Self {
            name: name.into(),
            constants,
            rules: Vec::new(),
        }
    }

    /// Presubmit rules.
    pub fn presubmit(constants: JobConstants) -> LintResult<Self> {
        let exempt = || Some(EXEMPT_JOB_NAME.to_string());
        let mut set = Self::new("presubmit", constants);
        set.add(LintRule::new("always-run", RuleType::AlwaysRunDisabled));
        set.add(LintRule::new("cluster", RuleType::Cluster { exempt: exempt() }));
        set.add(LintRule::new("skip-report", RuleType::SkipReportDisabled));
        set.add(LintRule::new("bucket", RuleType::Bucket { exempt: exempt() }));
        set.add(LintRule::new(
            "service-account",
            RuleType::ServiceAccount { exempt: exempt() },
        ));
        set.add(LintRule::new(
            "make-target",
            RuleType::MakeTarget(MakeTargetRule::presubmit()?),
        ));
        set.add(LintRule::new("unique-name", RuleType::UniqueName));
        Ok(set)
    }

    /// Postsubmit rules.
    pub fn postsubmit(constants: JobConstants) -> LintResult<Self> {
        let mut set = Self::new("postsubmit", constants);
        set.add(LintRule::new("cluster", RuleType::Cluster { exempt: None }));
        set.add(LintRule::new("bucket", RuleType::Bucket { exempt: None }));
        set.add(LintRule::new(
            "make-target",
            RuleType::MakeTarget(MakeTargetRule::postsubmit()?),
        ));
        set.add(LintRule::new("unique-name", RuleType::UniqueName));
        Ok(set)
    }

    /// Rule set for a job type. Periodics have no rules.
    pub fn for_job_type(job_type: JobType, defaults: &JobDefaults) -> LintResult<Self> {
        let constants = JobConstants::new(defaults);
        match job_type {
            JobType::Presubmit => Self::presubmit(constants),
            JobType::Postsubmit => Self::postsubmit(constants),
            JobType::Periodic => Ok(Self::new("periodic", constants)),
        }
    }

    /// Add a rule to the set.
    pub fn add(&mut self, rule: LintRule) {
        self.rules.push(rule);
    }

    /// Run every rule against a job, in order.
    pub fn evaluate(
        &self,
        job: &ProwJob,
        contents: &str,
        names: &JobNameCounts,
    ) -> Vec<RuleViolation> {
        self.rules
            .iter()
            .filter_map(|rule| self.check(rule, job, contents, names))
            .collect()
    }

    fn check(
        &self,
        rule: &LintRule,
        job: &ProwJob,
        contents: &str,
        names: &JobNameCounts,
    ) -> Option<RuleViolation> {
        let violation = |search: &str, message: String| {
            Some(RuleViolation {
                rule_id: rule.id.clone(),
                line: find_line_number(contents, search),
                message,
            })
        };
        let is_exempt = |exempt: &Option<String>| {
            exempt
                .as_deref()
                .map_or(false, |name| job.name.contains(name))
        };
        let constants = &self.constants;

        match &rule.rule_type {
            RuleType::AlwaysRunDisabled if job.always_run => {
                violation("always_run:", "Please set always_run to false".to_string())
            }
            RuleType::SkipReportDisabled if job.skip_report => {
                violation("skip_report:", "Please set skip_report to false".to_string())
            }
            RuleType::Cluster { exempt }
                if !is_exempt(exempt) && job.cluster != constants.cluster =>
            {
                violation(
                    "cluster:",
                    format!(
                        "Incorrect cluster configuration, please configure cluster as => cluster: \"{}\"",
                        constants.cluster
                    ),
                )
            }
            RuleType::Bucket { exempt } if !is_exempt(exempt) && job.bucket() != constants.bucket => {
                violation(
                    "bucket:",
                    format!(
                        "Incorrect bucket configuration, please configure S3 bucket as => bucket: {}",
                        constants.bucket
                    ),
                )
            }
            RuleType::ServiceAccount { exempt }
                if !is_exempt(exempt)
                    && job.service_account_name() != constants.service_account_name =>
            {
                violation(
                    "serviceaccountName:",
                    format!(
                        "Incorrect service account configuration, please configure service account as => serviceaccountName: {}",
                        constants.service_account_name
                    ),
                )
            }
            RuleType::MakeTarget(targets) => {
                if targets.is_skipped(&job.name) {
                    info!("Skipping check on {} job {}", self.name, job.name);
                    return None;
                }
                let expected = targets.expected_target(&job.name);
                match targets.actual_target(&job.command_line()) {
                    Some(actual) if actual == expected => None,
                    _ => violation(
                        "make",
                        format!("Invalid make target, please use the \"{}\" target", expected),
                    ),
                }
            }
            RuleType::UniqueName if names.get(&job.name).copied().unwrap_or(0) > 1 => violation(
                &format!("name: {}", job.name),
                format!("Duplicate job name => name: {}", job.name),
            ),
            _ => None,
        }
    }
}
