//! Job definitions read from rendered templates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TemplateError, TemplateResult};

/// Kind of Prow job, also the name of its directory under `jobs/`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Periodic,
    Postsubmit,
    Presubmit,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Periodic => "periodic",
            JobType::Postsubmit => "postsubmit",
            JobType::Presubmit => "presubmit",
        }
    }

    /// Name of the embedded output template for this job type.
    pub fn output_template_name(&self) -> &'static str {
        match self {
            JobType::Periodic => "periodics.yaml",
            JobType::Postsubmit => "postsubmits.yaml",
            JobType::Presubmit => "presubmits.yaml",
        }
    }

    pub fn all() -> Vec<Self> {
        vec![JobType::Periodic, JobType::Postsubmit, JobType::Presubmit]
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobType {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "periodic" | "periodics" => Ok(JobType::Periodic),
            "postsubmit" | "postsubmits" => Ok(JobType::Postsubmit),
            "presubmit" | "presubmits" => Ok(JobType::Presubmit),
            other => Err(TemplateError::InvalidConfig(format!(
                "Unsupported job type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraRef {
    #[serde(default)]
    pub base_ref: String,
    #[serde(default)]
    pub org: String,
    #[serde(default)]
    pub repo: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvVar {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    #[serde(default)]
    pub requests: Option<ResourceConfig>,
    #[serde(default)]
    pub limits: Option<ResourceConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cpu: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub memory: String,
    #[serde(
        default,
        rename = "ephemeral-storage",
        skip_serializing_if = "String::is_empty"
    )]
    pub ephemeral_storage: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostPath {
    #[serde(default)]
    pub path: String,
    #[serde(default, rename = "type")]
    pub path_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub default_mode: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub volume_type: String,
    #[serde(default)]
    pub host_path: Option<HostPath>,
    #[serde(default)]
    pub secret: Option<Secret>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mount_path: String,
    #[serde(default)]
    pub read_only: bool,
}

/// A single job definition, as written in a job template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobConfig {
    pub architecture: String,
    pub job_name: String,
    pub run_if_changed: String,
    pub skip_if_only_changed: String,
    pub branches: Vec<String>,
    pub max_concurrency: u32,
    pub cron_expression: String,
    pub timeout: String,
    pub image_build: bool,
    #[serde(rename = "useDockerBuildX")]
    pub use_docker_buildx: bool,
    pub use_minimal_builder_base: bool,
    pub pr_creation: bool,
    pub runtime_image: String,
    pub local_registry: bool,
    pub extra_refs: Vec<ExtraRef>,
    pub service_account_name: String,
    pub env_vars: Vec<EnvVar>,
    pub commands: Vec<String>,
    pub resources: Option<Resources>,
    pub volume_mounts: Vec<VolumeMount>,
    pub volumes: Vec<Volume>,
    pub automount_service_account_token: String,
    pub cluster: String,
    pub bucket: String,
    pub project_path: String,
    pub run_as_user: String,
    pub run_as_group: String,
}

impl JobConfig {
    /// Parse a job definition from (rendered) YAML.
    ///
    /// `file` names the job file in the error.
    pub fn parse(file: &str, contents: &[u8]) -> TemplateResult<Self> {
        // An empty document is a job with every field unset.
        if contents.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        serde_yaml::from_slice(contents).map_err(|source| TemplateError::Parse {
            file: file.to_string(),
            source,
        })
    }

    /// Wrap every command in `prefix` and `suffix`.
    pub fn guard_commands(&mut self, prefix: &str, suffix: &str) {
        for command in &mut self.commands {
            *command = format!("{}{}{}", prefix, command, suffix);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_config() {
        let job = JobConfig::parse(
            "build-1-28-presubmits.yaml",
            br#"
jobName: build-1-28-presubmit
runIfChanged: projects/.*
useDockerBuildX: true
maxConcurrency: 10
commands:
  - make build RELEASE_BRANCH=1-28
envVars:
  - name: RELEASE_BRANCH
    value: "1-28"
resources:
  requests:
    cpu: "2"
    memory: 4Gi
    ephemeral-storage: 20Gi
volumes:
  - name: docker-sock
    hostPath:
      path: /var/run/docker.sock
      type: Socket
"#,
        )
        .unwrap();

        assert_eq!(job.job_name, "build-1-28-presubmit");
        assert!(job.use_docker_buildx);
        assert_eq!(job.max_concurrency, 10);
        assert_eq!(job.env_vars, vec![EnvVar::new("RELEASE_BRANCH", "1-28")]);
        let requests = job.resources.unwrap().requests.unwrap();
        assert_eq!(requests.ephemeral_storage, "20Gi");
        assert_eq!(job.volumes[0].host_path.as_ref().unwrap().path_type, "Socket");
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = JobConfig::parse("bad.yaml", b"commands: [unterminated").unwrap_err();
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn test_parse_empty_document() {
        assert_eq!(JobConfig::parse("empty.yaml", b"\n").unwrap(), JobConfig::default());
    }

    #[test]
    fn test_guard_commands() {
        let mut job = JobConfig {
            commands: vec!["make build".to_string(), "make test".to_string()],
            ..Default::default()
        };
        job.guard_commands("if ok; then ", "; fi");
        assert_eq!(
            job.commands,
            vec!["if ok; then make build; fi", "if ok; then make test; fi"]
        );
    }

    #[test]
    fn test_job_type_round_trip() {
        for job_type in JobType::all() {
            assert_eq!(job_type.as_str().parse::<JobType>().unwrap(), job_type);
        }
        assert!("nightly".parse::<JobType>().is_err());
    }
}
