//! Job generation: render each expanded entry and parse it into a job.

use std::collections::hash_map::{self, HashMap};
use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::axis::AxisRegistry;
use crate::config::{CommandGuard, GeneratorConfig};
use crate::error::{TemplateError, TemplateResult};
use crate::job::{JobConfig, JobType};
use crate::loader::TemplateLoader;
use crate::matrix::{MatrixExpander, TemplateEntry, WorkingSet};
use crate::renderer::TemplateRenderer;

/// Jobs of one repository, keyed by final file name.
pub type JobList = BTreeMap<String, JobConfig>;

/// Where literal template text comes from, looked up by template file name.
pub trait TemplateSource {
    fn read(&self, template_name: &str) -> TemplateResult<String>;

    /// Path a template is reported under in errors.
    fn location(&self, template_name: &str) -> PathBuf {
        PathBuf::from(template_name)
    }
}

/// Templates held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    templates: HashMap<String, String>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.templates.insert(name.into(), content.into());
        self
    }
}

impl TemplateSource for InMemorySource {
    fn read(&self, template_name: &str) -> TemplateResult<String> {
        self.templates
            .get(template_name)
            .cloned()
            .ok_or_else(|| TemplateError::NotFound(template_name.to_string()))
    }
}

/// Turns terminal working-set entries into job definitions.
pub struct JobGenerator {
    renderer: TemplateRenderer,
    guard: CommandGuard,
}

impl Default for JobGenerator {
    fn default() -> Self {
        Self::new(CommandGuard::default())
    }
}

impl JobGenerator {
    pub fn new(guard: CommandGuard) -> Self {
        Self {
            renderer: TemplateRenderer::new(),
            guard,
        }
    }

    /// Generate a job for every entry of an expanded working set.
    ///
    /// Each template is read once, however many entries expand from it. The
    /// first failure aborts the whole set; render and parse failures name both
    /// the job file and the template it was expanded from.
    pub fn generate(
        &self,
        working_set: &WorkingSet,
        source: &dyn TemplateSource,
    ) -> TemplateResult<JobList> {
        let mut contents: HashMap<&str, String> = HashMap::new();
        let mut jobs = JobList::new();

        for entry in working_set.iter() {
            let content = match contents.entry(entry.provenance.as_str()) {
                hash_map::Entry::Occupied(cached) => cached.into_mut(),
                hash_map::Entry::Vacant(slot) => slot.insert(source.read(&entry.provenance)?),
            };
            let job = self
                .generate_entry(entry, content)
                .map_err(|err| TemplateError::Generation {
                    file: entry.file_name.clone(),
                    template: source.location(&entry.provenance),
                    source: Box::new(err),
                })?;
            jobs.insert(entry.file_name.clone(), job);
        }

        Ok(jobs)
    }

    /// Generate the job for a single entry from its template text.
    pub fn generate_entry(&self, entry: &TemplateEntry, content: &str) -> TemplateResult<JobConfig> {
        let mut job = if entry.parameters.is_empty() {
            JobConfig::parse(&entry.file_name, content.as_bytes())?
        } else {
            let rendered = self
                .renderer
                .render(&entry.file_name, content, &entry.parameters)?;
            JobConfig::parse(&entry.file_name, &rendered)?
        };

        if entry.is_latest_release_branch() {
            debug!("Guarding commands of {}", entry.file_name);
            job.guard_commands(&self.guard.prefix, &self.guard.suffix);
        }

        Ok(job)
    }

    /// Discover, expand and generate the jobs of one repository.
    pub fn generate_repo(
        &self,
        loader: &TemplateLoader,
        registry: &AxisRegistry,
        job_type: JobType,
        repo: &str,
    ) -> TemplateResult<JobList> {
        let discovered = loader.discover(job_type, repo)?;
        let expanded = MatrixExpander::expand_registry(discovered, registry)?;
        self.generate(&expanded, &loader.source(job_type, repo))
    }

    /// Generate every job of a job type, keyed by `org/repo`.
    pub fn generate_job_type(
        &self,
        config: &GeneratorConfig,
        loader: &TemplateLoader,
        registry: &AxisRegistry,
        job_type: JobType,
    ) -> TemplateResult<BTreeMap<String, JobList>> {
        let mut by_repo = BTreeMap::new();

        for repo in config.repos_for(job_type) {
            let jobs = self.generate_repo(loader, registry, job_type, repo)?;
            info!("Generated {} {} job(s) for {}", jobs.len(), job_type, repo);
            by_repo.insert(config.repo_name(repo), jobs);
        }

        Ok(by_repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::{strings, Axis};
    use std::cell::RefCell;

    const BRANCH_TEMPLATE: &str = r#"jobName: build-{{releaseBranch}}-presubmit
runIfChanged: "^projects/(?!{{otherReleaseBranches}})"
commands:
  - make build RELEASE_BRANCH={{releaseBranch}}
"#;

    struct CountingSource {
        inner: InMemorySource,
        reads: RefCell<Vec<String>>,
    }

    impl TemplateSource for CountingSource {
        fn read(&self, template_name: &str) -> TemplateResult<String> {
            self.reads.borrow_mut().push(template_name.to_string());
            self.inner.read(template_name)
        }
    }

    fn expand(names: &[&str], axes: &[Axis]) -> WorkingSet {
        MatrixExpander::expand(WorkingSet::from_file_names(names.iter().copied()).unwrap(), axes)
            .unwrap()
    }

    #[test]
    fn test_generate_branch_jobs() {
        let axis = Axis::release_branch(strings(&["1-27", "1-28", "1-29"]));
        let set = expand(&["build-1-X-presubmits.yaml"], &[axis]);
        let source = InMemorySource::new().with_template("build-1-X-presubmits.yaml", BRANCH_TEMPLATE);

        let jobs = JobGenerator::default().generate(&set, &source).unwrap();

        assert_eq!(jobs.len(), 3);
        let first = &jobs["build-1-27-presubmits.yaml"];
        assert_eq!(first.job_name, "build-1-27-presubmit");
        assert_eq!(first.run_if_changed, "^projects/(?!1-28|1-29)");
        assert_eq!(first.commands, vec!["make build RELEASE_BRANCH=1-27"]);
    }

    #[test]
    fn test_latest_branch_commands_are_guarded() {
        let axis = Axis::release_branch(strings(&["1-27", "1-28"]));
        let set = expand(&["build-1-X-presubmits.yaml"], &[axis]);
        let source = InMemorySource::new().with_template("build-1-X-presubmits.yaml", BRANCH_TEMPLATE);
        let guard = CommandGuard {
            prefix: "if supported; then ".to_string(),
            suffix: "; fi".to_string(),
        };

        let jobs = JobGenerator::new(guard).generate(&set, &source).unwrap();

        assert_eq!(
            jobs["build-1-27-presubmits.yaml"].commands,
            vec!["make build RELEASE_BRANCH=1-27"]
        );
        assert_eq!(
            jobs["build-1-28-presubmits.yaml"].commands,
            vec!["if supported; then make build RELEASE_BRANCH=1-28; fi"]
        );
    }

    #[test]
    fn test_template_read_once_per_provenance() {
        let axis = Axis::release_branch(strings(&["1-27", "1-28", "1-29"]));
        let set = expand(&["build-1-X-presubmits.yaml", "lint-presubmits.yaml"], &[axis]);
        let source = CountingSource {
            inner: InMemorySource::new()
                .with_template("build-1-X-presubmits.yaml", BRANCH_TEMPLATE)
                .with_template("lint-presubmits.yaml", "jobName: lint-presubmit\n"),
            reads: RefCell::new(Vec::new()),
        };

        let jobs = JobGenerator::default().generate(&set, &source).unwrap();

        assert_eq!(jobs.len(), 4);
        let mut reads = source.reads.into_inner();
        reads.sort();
        assert_eq!(reads, vec!["build-1-X-presubmits.yaml", "lint-presubmits.yaml"]);
    }

    #[test]
    fn test_literal_template_is_not_rendered() {
        // Handlebars-looking text survives untouched when there is nothing to render.
        let set = expand(&["lint-presubmits.yaml"], &[]);
        let content = "jobName: lint\ncommands:\n  - echo '{{ not a template }}'\n";
        let source = InMemorySource::new().with_template("lint-presubmits.yaml", content);

        let jobs = JobGenerator::default().generate(&set, &source).unwrap();
        assert_eq!(
            jobs["lint-presubmits.yaml"],
            JobConfig::parse("lint-presubmits.yaml", content.as_bytes()).unwrap()
        );
    }

    #[test]
    fn test_render_failure_aborts_generation() {
        let axis = Axis::golang(strings(&["1-22"]));
        let set = expand(&["test-golang-1-X.yaml", "ok.yaml"], &[axis]);
        let source = InMemorySource::new()
            .with_template("test-golang-1-X.yaml", "jobName: {{releaseBranch}}\n")
            .with_template("ok.yaml", "jobName: ok\n");

        let err = JobGenerator::default().generate(&set, &source).unwrap_err();
        match err {
            TemplateError::Generation {
                file,
                template,
                source,
            } => {
                assert_eq!(file, "test-golang-1-22.yaml");
                assert_eq!(template, PathBuf::from("test-golang-1-X.yaml"));
                assert!(matches!(*source, TemplateError::RenderingFailed { .. }));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_template_aborts_generation() {
        let set = expand(&["gone.yaml"], &[]);
        let result = JobGenerator::default().generate(&set, &InMemorySource::new());
        assert!(matches!(result, Err(TemplateError::NotFound(_))));
    }

    #[test]
    fn test_parse_failure_names_job_and_template() {
        let axis = Axis::release_branch(strings(&["1-27"]));
        let set = expand(&["bad-1-X.yaml"], &[axis]);
        let source = InMemorySource::new().with_template("bad-1-X.yaml", "commands: [{{releaseBranch}}\n");

        let err = JobGenerator::default().generate(&set, &source).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("bad-1-27.yaml"));
        assert!(message.contains("bad-1-X.yaml"));
        match err {
            TemplateError::Generation { source, .. } => {
                assert!(matches!(*source, TemplateError::Parse { .. }))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
