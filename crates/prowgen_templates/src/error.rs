//! Error types for template expansion and job generation.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur while expanding, rendering or writing jobs.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Error reading job directory {path}: {source}")]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error reading job template {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template rendering failed for {template}: {message}")]
    RenderingFailed { template: String, message: String },

    #[error("Error unmarshaling contents of file {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Error generating {file} from template {}: {source}", template.display())]
    Generation {
        file: String,
        template: PathBuf,
        #[source]
        source: Box<TemplateError>,
    },

    #[error("Axis {axis} has no values but matches template {file}")]
    EmptyAxis { axis: String, file: String },

    #[error("Expansion of {provenance} produced duplicate job file {file}")]
    DuplicateEntry { file: String, provenance: String },

    #[error("Invalid axis registry: {0}")]
    InvalidRegistry(String),

    #[error("Invalid generator configuration: {0}")]
    InvalidConfig(String),

    #[error("Error writing Prow job {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
