//! # prowgen_templates
//!
//! Job-matrix expansion and Prow job generation for prowgen.
//!
//! Job templates live under `jobs/<job type>/<repo>/`. A template whose file
//! name carries an axis token (`1-X`, `golang-1-X`, `python-3-X`, `al-X`) is
//! expanded into one job per axis value, rendered with that value's
//! parameters and parsed into a [`JobConfig`]. Generated jobs are then
//! written out as Prow configuration.
//!
//! ## Example
//!
//! ```rust,no_run
//! use prowgen_templates::{GeneratorConfig, JobGenerator, JobType, ProwJobWriter, TemplateLoader};
//!
//! let config = GeneratorConfig::default();
//! let registry = config.registry().unwrap();
//! let loader = TemplateLoader::new("jobs");
//! let generator = JobGenerator::new(config.guard.clone());
//!
//! let jobs = generator
//!     .generate_job_type(&config, &loader, &registry, JobType::Presubmit)
//!     .unwrap();
//!
//! let writer = ProwJobWriter::new(config, "templater/jobs");
//! writer.write_job_type(JobType::Presubmit, &jobs).unwrap();
//! ```

pub mod axis;
pub mod config;
pub mod error;
pub mod generator;
pub mod job;
pub mod loader;
pub mod matrix;
pub mod renderer;
pub mod writer;

pub use axis::{Axis, AxisKind, AxisRegistry};
pub use config::{AxisValues, CommandGuard, GeneratorConfig, JobDefaults, RepoConfig};
pub use error::{TemplateError, TemplateResult};
pub use generator::{InMemorySource, JobGenerator, JobList, TemplateSource};
pub use job::{EnvVar, ExtraRef, JobConfig, JobType};
pub use loader::{DirectorySource, TemplateLoader};
pub use matrix::{MatrixExpander, ParameterBundle, TemplateEntry, WorkingSet};
pub use renderer::TemplateRenderer;
pub use writer::ProwJobWriter;
