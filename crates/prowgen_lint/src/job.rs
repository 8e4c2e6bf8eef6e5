//! Prow job files as read by the linter.
//!
//! Only the fields the checks look at are modelled; everything else in a job
//! file is ignored.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{LintError, LintResult};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProwJobFile {
    pub presubmits: BTreeMap<String, Vec<ProwJob>>,
    pub postsubmits: BTreeMap<String, Vec<ProwJob>>,
    pub periodics: Vec<ProwJob>,
}

impl ProwJobFile {
    pub fn parse(path: &Path, contents: &str) -> LintResult<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents).map_err(|source| LintError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Name of the first job of every job list in the file.
    pub fn first_job_names(&self) -> Vec<&str> {
        self.presubmits
            .values()
            .chain(self.postsubmits.values())
            .filter_map(|jobs| jobs.first())
            .chain(self.periodics.first())
            .map(|job| job.name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProwJob {
    pub name: String,
    pub always_run: bool,
    pub skip_report: bool,
    pub cluster: String,
    pub decoration_config: Option<DecorationConfig>,
    pub spec: Option<PodSpec>,
}

impl ProwJob {
    /// Upload bucket, empty when not configured.
    pub fn bucket(&self) -> &str {
        self.decoration_config
            .as_ref()
            .and_then(|d| d.gcs_configuration.as_ref())
            .map(|g| g.bucket.as_str())
            .unwrap_or("")
    }

    pub fn service_account_name(&self) -> &str {
        self.spec
            .as_ref()
            .map(|s| s.service_account_name.as_str())
            .unwrap_or("")
    }

    /// Command of the first container, joined with spaces.
    pub fn command_line(&self) -> String {
        self.spec
            .as_ref()
            .and_then(|s| s.containers.first())
            .map(|c| c.command.join(" "))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DecorationConfig {
    pub gcs_configuration: Option<GcsConfiguration>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GcsConfiguration {
    pub bucket: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PodSpec {
    #[serde(rename = "serviceaccountName", alias = "serviceAccountName")]
    pub service_account_name: String,
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Container {
    pub command: Vec<String>,
}

/// A job file loaded for linting.
#[derive(Debug, Clone)]
pub struct JobFile {
    /// Path relative to the repository root (`jobs/aws/eks-distro/x.yaml`).
    pub path: PathBuf,
    /// `org/repo` key the file's jobs are listed under.
    pub repo: String,
    pub file_name: String,
    pub contents: String,
    pub jobs: ProwJobFile,
}

impl JobFile {
    /// Load a job file given relative to `root`. A file that does not exist
    /// yields `None`.
    pub fn load(root: &Path, relative: &Path) -> LintResult<Option<Self>> {
        let absolute = root.join(relative);
        if !absolute.exists() {
            debug!("Skipping {:?}, file not found", absolute);
            return Ok(None);
        }

        let contents = fs::read_to_string(&absolute).map_err(|source| LintError::FileRead {
            path: relative.to_path_buf(),
            source,
        })?;
        let jobs = ProwJobFile::parse(relative, &contents)?;

        Ok(Some(Self {
            path: relative.to_path_buf(),
            repo: repo_key(relative),
            file_name: relative
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            contents,
            jobs,
        }))
    }
}

/// `org/repo` key for a job file path: its directory without the leading
/// `jobs/`.
pub fn repo_key(relative: &Path) -> String {
    let parent = relative
        .parent()
        .map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default();
    parent.replacen("jobs/", "", 1)
}

/// 1-based number of the first line containing `search`, or 0.
pub fn find_line_number(contents: &str, search: &str) -> usize {
    contents
        .split('\n')
        .position(|line| line.contains(search))
        .map(|i| i + 1)
        .unwrap_or(0)
}
