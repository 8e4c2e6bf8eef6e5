//! Error types for the linter.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for lint operations.
pub type LintResult<T> = Result<T, LintError>;

/// Errors that stop a lint run. Convention violations are not errors; they
/// are collected in the report.
#[derive(Error, Debug)]
pub enum LintError {
    #[error("Error reading contents of {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error unmarshaling contents of {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Key {repo} does not exist in {job_type} configuration map of {file}")]
    MissingRepo {
        file: String,
        repo: String,
        job_type: String,
    },

    #[error("{job_type} configuration for the {repo} repo is empty in {file}")]
    EmptyJobList {
        file: String,
        repo: String,
        job_type: String,
    },

    #[error("Invalid pattern {pattern}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Git error: {0}")]
    Git(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
