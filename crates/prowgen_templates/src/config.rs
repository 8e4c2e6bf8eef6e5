//! Generator configuration.
//!
//! Every field has a built-in default, so an empty (or missing) config file
//! yields the standard setup. The configuration is loaded once and handed to
//! the components that need it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::axis::{strings, Axis, AxisRegistry};
use crate::error::{TemplateError, TemplateResult};
use crate::job::JobType;

fn default_org() -> String {
    "aws".to_string()
}

fn default_builder_base_tag() -> String {
    "latest".to_string()
}

fn default_buildkit_image_tag() -> String {
    "v0.10.5-rootless".to_string()
}

/// Repositories whose job directories are read, per job type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    pub periodic: Vec<String>,
    pub postsubmit: Vec<String>,
    pub presubmit: Vec<String>,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            periodic: strings(&["eks-distro", "eks-distro-build-tooling"]),
            postsubmit: strings(&["eks-distro", "eks-distro-build-tooling"]),
            presubmit: strings(&[
                "eks-distro",
                "eks-distro-build-tooling",
                "eks-distro-prow-jobs",
            ]),
        }
    }
}

/// Values of the built-in axes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisValues {
    pub golang: Vec<String>,
    pub python: Vec<String>,
    pub amazon_linux: Vec<String>,
    pub release_branches: Vec<String>,
    /// Additional axes, applied after the runtime axes and before release branches.
    pub extra: Vec<Axis>,
}

impl Default for AxisValues {
    fn default() -> Self {
        let standard = AxisRegistry::standard();
        let values = |name: &str| {
            standard
                .get(name)
                .map(|axis| axis.values.clone())
                .unwrap_or_default()
        };

        Self {
            golang: values("golang"),
            python: values("python"),
            amazon_linux: values("amazon-linux"),
            release_branches: values("release-branch"),
            extra: Vec::new(),
        }
    }
}

/// Text wrapped around every command of a job generated for the newest
/// release branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandGuard {
    pub prefix: String,
    pub suffix: String,
}

impl Default for CommandGuard {
    fn default() -> Self {
        Self {
            prefix: "if make check-release-branch-supported; then ".to_string(),
            suffix: "; else echo \"Release branch not supported, skipping\"; fi".to_string(),
        }
    }
}

/// Values used for a job type when the job definition leaves them unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobDefaults {
    pub cluster: String,
    pub bucket: String,
    pub service_account_name: String,
}

impl Default for JobDefaults {
    fn default() -> Self {
        Self {
            cluster: "prow-postsubmits-cluster".to_string(),
            bucket: "s3://prow-data-devstack-prowbucket7c73355c-h7e0qjaxyp8j".to_string(),
            service_account_name: String::new(),
        }
    }
}

impl JobDefaults {
    fn presubmit() -> Self {
        Self {
            cluster: "prow-presubmits-cluster".to_string(),
            bucket: "s3://prow-data-presubmits-devstack-prowbucket7c73355c-11dl00wefbvlc"
                .to_string(),
            service_account_name: "presubmits-build-account".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobTypeDefaults {
    pub periodic: JobDefaults,
    pub postsubmit: JobDefaults,
    pub presubmit: JobDefaults,
}

impl Default for JobTypeDefaults {
    fn default() -> Self {
        Self {
            periodic: JobDefaults::default(),
            postsubmit: JobDefaults::default(),
            presubmit: JobDefaults::presubmit(),
        }
    }
}

/// Complete generator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// GitHub org the repositories belong to.
    #[serde(default = "default_org")]
    pub org: String,
    pub repos: RepoConfig,
    pub axes: AxisValues,
    pub guard: CommandGuard,
    pub defaults: JobTypeDefaults,
    #[serde(default = "default_builder_base_tag")]
    pub builder_base_tag: String,
    #[serde(default = "default_buildkit_image_tag")]
    pub buildkit_image_tag: String,
    /// Directory with output template overrides (`presubmits.yaml`, ...).
    pub output_templates_dir: Option<PathBuf>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            org: default_org(),
            repos: RepoConfig::default(),
            axes: AxisValues::default(),
            guard: CommandGuard::default(),
            defaults: JobTypeDefaults::default(),
            builder_base_tag: default_builder_base_tag(),
            buildkit_image_tag: default_buildkit_image_tag(),
            output_templates_dir: None,
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> TemplateResult<Self> {
        debug!("Loading generator config from {:?}", path);
        let content = fs::read_to_string(path).map_err(|source| TemplateError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(content: &str) -> TemplateResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        if config.org.is_empty() {
            return Err(TemplateError::InvalidConfig("org must not be empty".to_string()));
        }
        Ok(config)
    }

    /// Build the axis registry described by this configuration.
    pub fn registry(&self) -> TemplateResult<AxisRegistry> {
        let mut axes = vec![
            Axis::golang(self.axes.golang.clone()),
            Axis::python(self.axes.python.clone()),
            Axis::amazon_linux(self.axes.amazon_linux.clone()),
        ];
        axes.extend(self.axes.extra.iter().cloned());
        axes.push(Axis::release_branch(self.axes.release_branches.clone()));
        AxisRegistry::new(axes)
    }

    /// Repositories processed for a job type.
    pub fn repos_for(&self, job_type: JobType) -> &[String] {
        match job_type {
            JobType::Periodic => &self.repos.periodic,
            JobType::Postsubmit => &self.repos.postsubmit,
            JobType::Presubmit => &self.repos.presubmit,
        }
    }

    pub fn defaults_for(&self, job_type: JobType) -> &JobDefaults {
        match job_type {
            JobType::Periodic => &self.defaults.periodic,
            JobType::Postsubmit => &self.defaults.postsubmit,
            JobType::Presubmit => &self.defaults.presubmit,
        }
    }

    /// Key under which a repository's jobs are written (`org/repo`).
    pub fn repo_name(&self, repo: &str) -> String {
        format!("{}/{}", self.org, repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_matches_standard() {
        let config = GeneratorConfig::default();
        assert_eq!(config.registry().unwrap(), AxisRegistry::standard());
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(GeneratorConfig::from_yaml("").unwrap(), GeneratorConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = GeneratorConfig::from_yaml(
            r#"
axes:
  release_branches: ["1-30", "1-31"]
repos:
  presubmit: ["eks-distro"]
buildkit_image_tag: v0.12.0-rootless
"#,
        )
        .unwrap();

        assert_eq!(config.org, "aws");
        assert_eq!(config.axes.release_branches, vec!["1-30", "1-31"]);
        assert_eq!(config.axes.golang, AxisValues::default().golang);
        assert_eq!(config.repos_for(JobType::Presubmit).to_vec(), vec!["eks-distro"]);
        assert_eq!(config.repos_for(JobType::Periodic).len(), 2);
        assert_eq!(config.buildkit_image_tag, "v0.12.0-rootless");
        assert_eq!(config.guard, CommandGuard::default());
    }

    #[test]
    fn test_extra_axis_is_placed_before_release_branches() {
        let config = GeneratorConfig::from_yaml(
            r#"
axes:
  extra:
    - name: node
      token: node-X
      prefix: node-
      kind: plain
      key: nodeVersion
      values: ["20"]
"#,
        )
        .unwrap();

        let registry = config.registry().unwrap();
        let names: Vec<&str> = registry.axes().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["golang", "python", "amazon-linux", "node", "release-branch"]
        );
    }

    #[test]
    fn test_presubmit_defaults() {
        let config = GeneratorConfig::default();
        assert_eq!(
            config.defaults_for(JobType::Presubmit).cluster,
            "prow-presubmits-cluster"
        );
        assert_eq!(config.defaults_for(JobType::Postsubmit).service_account_name, "");
        assert_eq!(config.repo_name("eks-distro"), "aws/eks-distro");
    }
}
