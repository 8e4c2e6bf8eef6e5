//! Prow job output.
//!
//! Generated job definitions are rendered through a per-job-type output
//! template into Prow configuration and written under
//! `<output_root>/<org>/<repo>/<file>`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::GeneratorConfig;
use crate::error::{TemplateError, TemplateResult};
use crate::generator::JobList;
use crate::job::{EnvVar, JobConfig, JobType};
use crate::renderer::TemplateRenderer;

const EDIT_WARNING: &str = include_str!("../templates/warning.txt");
const PRESUBMITS_TEMPLATE: &str = include_str!("../templates/presubmits.yaml");
const POSTSUBMITS_TEMPLATE: &str = include_str!("../templates/postsubmits.yaml");
const PERIODICS_TEMPLATE: &str = include_str!("../templates/periodics.yaml");

const BUILDER_BASE_IMAGE: &str = "public.ecr.aws/eks-distro-build-tooling/builder-base";
const DEFAULT_POSTSUBMIT_BRANCH: &str = "^main$";

/// Writes generated jobs as Prow job files.
pub struct ProwJobWriter {
    renderer: TemplateRenderer,
    config: GeneratorConfig,
    output_root: PathBuf,
}

impl ProwJobWriter {
    pub fn new(config: GeneratorConfig, output_root: impl Into<PathBuf>) -> Self {
        Self {
            renderer: TemplateRenderer::new(),
            config,
            output_root: output_root.into(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Output template text for a job type.
    ///
    /// A file of the same name in the configured override directory wins over
    /// the built-in template.
    pub fn output_template(&self, job_type: JobType) -> TemplateResult<String> {
        let name = job_type.output_template_name();
        if let Some(dir) = &self.config.output_templates_dir {
            let path = dir.join(name);
            if path.is_file() {
                debug!("Using output template override {:?}", path);
                return fs::read_to_string(&path)
                    .map_err(|source| TemplateError::FileRead { path, source });
            }
        }

        Ok(match job_type {
            JobType::Periodic => PERIODICS_TEMPLATE,
            JobType::Postsubmit => POSTSUBMITS_TEMPLATE,
            JobType::Presubmit => PRESUBMITS_TEMPLATE,
        }
        .to_string())
    }

    /// Data handed to the output template for one job.
    ///
    /// Every key an output template may reference is present, unset values
    /// included.
    pub fn prowjob_data(
        &self,
        job_type: JobType,
        repo_name: &str,
        job: &JobConfig,
    ) -> TemplateResult<Value> {
        let defaults = self.config.defaults_for(job_type);

        let mut env_vars = job.env_vars.clone();
        if job.use_docker_buildx {
            env_vars.push(EnvVar::new(
                "BUILDKITD_IMAGE",
                format!("moby/buildkit:{}", self.config.buildkit_image_tag),
            ));
        }

        let mut branches = job.branches.clone();
        if job_type == JobType::Postsubmit && branches.is_empty() {
            branches.push(DEFAULT_POSTSUBMIT_BRANCH.to_string());
        }

        let image = if job.runtime_image.is_empty() {
            format!("{}:{}", BUILDER_BASE_IMAGE, self.config.builder_base_tag)
        } else {
            job.runtime_image.clone()
        };

        let (requests, limits) = match &job.resources {
            Some(resources) => (
                serde_json::to_value(resources.requests.clone().unwrap_or_default())?,
                serde_json::to_value(resources.limits.clone().unwrap_or_default())?,
            ),
            None => (json!({}), json!({})),
        };

        Ok(json!({
            "editWarning": EDIT_WARNING.trim_end(),
            "architecture": job.architecture,
            "repoName": repo_name,
            "prowjobName": job.job_name,
            "runIfChanged": job.run_if_changed,
            "skipIfOnlyChanged": job.skip_if_only_changed,
            "branches": branches,
            "cronExpression": job.cron_expression,
            "maxConcurrency": job.max_concurrency,
            "timeout": job.timeout,
            "extraRefs": serde_json::to_value(&job.extra_refs)?,
            "imageBuild": job.image_build,
            "useDockerBuildX": job.use_docker_buildx,
            "prCreation": job.pr_creation,
            "runtimeImage": job.runtime_image,
            "image": image,
            "localRegistry": job.local_registry,
            "serviceAccountName": or_default(&job.service_account_name, &defaults.service_account_name),
            "cluster": or_default(&job.cluster, &defaults.cluster),
            "bucket": or_default(&job.bucket, &defaults.bucket),
            "command": job.commands.join("\n&&\n"),
            "builderBaseTag": self.config.builder_base_tag,
            "buildkitImageTag": self.config.buildkit_image_tag,
            "hasResources": job.resources.is_some(),
            "resourceRequests": requests,
            "resourceLimits": limits,
            "envVars": serde_json::to_value(&env_vars)?,
            "volumes": serde_json::to_value(&job.volumes)?,
            "volumeMounts": serde_json::to_value(&job.volume_mounts)?,
            "automountServiceAccountToken": job.automount_service_account_token,
            "projectPath": job.project_path,
        }))
    }

    /// Render one job into Prow job YAML.
    pub fn render(
        &self,
        job_type: JobType,
        repo_name: &str,
        file_name: &str,
        job: &JobConfig,
    ) -> TemplateResult<Vec<u8>> {
        let template = self.output_template(job_type)?;
        let data = self.prowjob_data(job_type, repo_name, job)?;
        self.renderer.render(file_name, &template, &data)
    }

    /// Where a job file of a repository (`org/repo`) is written.
    pub fn job_path(&self, repo_name: &str, file_name: &str) -> PathBuf {
        let mut path = self.output_root.clone();
        for part in repo_name.split('/') {
            path.push(part);
        }
        path.join(file_name)
    }

    /// Render and write one job, returning the written path.
    pub fn write(
        &self,
        job_type: JobType,
        repo_name: &str,
        file_name: &str,
        job: &JobConfig,
    ) -> TemplateResult<PathBuf> {
        let rendered = self.render(job_type, repo_name, file_name, job)?;
        let path = self.job_path(repo_name, file_name);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| TemplateError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, rendered).map_err(|source| TemplateError::Write {
            path: path.clone(),
            source,
        })?;

        debug!("Wrote {:?}", path);
        Ok(path)
    }

    /// Write every job of a job type, keyed by `org/repo`.
    pub fn write_job_type(
        &self,
        job_type: JobType,
        jobs_by_repo: &BTreeMap<String, JobList>,
    ) -> TemplateResult<Vec<PathBuf>> {
        let mut written = Vec::new();
        for (repo_name, jobs) in jobs_by_repo {
            for (file_name, job) in jobs {
                written.push(self.write(job_type, repo_name, file_name, job)?);
            }
        }
        info!("Wrote {} {} job file(s)", written.len(), job_type);
        Ok(written)
    }

    /// Remove previously generated jobs of the configured org.
    pub fn clean(&self) -> TemplateResult<()> {
        let dir = self.output_root.join(&self.config.org);
        if dir.exists() {
            info!("Removing generated jobs under {:?}", dir);
            fs::remove_dir_all(&dir).map_err(|source| TemplateError::Write { path: dir, source })?;
        }
        Ok(())
    }
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}
