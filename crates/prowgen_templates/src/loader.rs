//! Job template discovery.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{TemplateError, TemplateResult};
use crate::generator::TemplateSource;
use crate::job::JobType;
use crate::matrix::WorkingSet;

/// Finds job templates under `<jobs_root>/<job type>/<repo>/`.
pub struct TemplateLoader {
    jobs_root: PathBuf,
}

impl TemplateLoader {
    /// Create a new template loader.
    pub fn new(jobs_root: impl Into<PathBuf>) -> Self {
        Self {
            jobs_root: jobs_root.into(),
        }
    }

    pub fn jobs_root(&self) -> &Path {
        &self.jobs_root
    }

    /// Directory holding the templates of one repository.
    pub fn job_dir(&self, job_type: JobType, repo: &str) -> PathBuf {
        self.jobs_root.join(job_type.as_str()).join(repo)
    }

    /// List the templates of one repository as an unexpanded working set.
    ///
    /// Only regular files directly inside the directory are considered.
    pub fn discover(&self, job_type: JobType, repo: &str) -> TemplateResult<WorkingSet> {
        let dir = self.job_dir(job_type, repo);
        debug!("Reading job directory {:?}", dir);

        let mut file_names = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| TemplateError::DirectoryRead {
                path: dir.clone(),
                source: e.into(),
            })?;
            if entry.file_type().is_file() {
                file_names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        info!(
            "Found {} {} template(s) for {}",
            file_names.len(),
            job_type,
            repo
        );
        WorkingSet::from_file_names(file_names)
    }

    /// Template source reading from one repository's directory.
    pub fn source(&self, job_type: JobType, repo: &str) -> DirectorySource {
        DirectorySource::new(self.job_dir(job_type, repo))
    }
}

/// Reads templates from a directory by file name.
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TemplateSource for DirectorySource {
    fn read(&self, template_name: &str) -> TemplateResult<String> {
        let path = self.dir.join(template_name);
        fs::read_to_string(&path).map_err(|source| TemplateError::FileRead { path, source })
    }

    fn location(&self, template_name: &str) -> PathBuf {
        self.dir.join(template_name)
    }
}
