// crates/salesflow-core/src/error.rs

use std::path::{Path, PathBuf};

use salesflow_parser::ParserError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("source format error: {0}")]
    SourceFormat(#[from] ParserError),

    #[error("write failure at {}: {message}", path.display())]
    WriteFailure { path: PathBuf, message: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[cfg(feature = "runtime")]
    #[error("pipeline task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PipelineError {
    pub fn write_failure(path: impl AsRef<Path>, message: impl std::fmt::Display) -> Self {
        PipelineError::WriteFailure {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        PipelineError::Configuration(message.into())
    }

    /// Name of the stage that raised the error, used in user-facing reports.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::SourceFormat(_) => "extract",
            PipelineError::WriteFailure { .. } => "load",
            PipelineError::Configuration(_) => "configure",
            #[cfg(feature = "runtime")]
            PipelineError::Task(_) => "transform",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
