//! Error types for geoflow

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for geoflow operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for geoflow
///
/// Collaborator failures are surfaced through the first four variants; the
/// engine wraps whatever a stage returned in [`PipelineError::Stage`] without
/// altering it.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Network or remote-resource failure
    #[error("Transport error fetching {url}: {message}")]
    Transport { url: String, message: String },

    /// Corrupt or unreadable tar archive or gzip stream
    #[error("Archive error in {}: {message}", path.display())]
    Archive { path: PathBuf, message: String },

    /// Malformed tabular content
    #[error("Parse error in {context}: {message}")]
    Parse { context: String, message: String },

    /// Expected column absent while projecting a table
    #[error("Schema error: table '{table}' is missing column(s): {}", missing.join(", "))]
    Schema { table: String, missing: Vec<String> },

    #[error("Invalid dataset identifier: {0}")]
    InvalidDatasetId(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stage '{stage}' failed for dataset {dataset}: {source}")]
    Stage {
        stage: String,
        dataset: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    pub fn transport(url: impl Into<String>, message: impl ToString) -> Self {
        PipelineError::Transport {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn archive(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        PipelineError::Archive {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn parse(context: impl Into<String>, message: impl ToString) -> Self {
        PipelineError::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Innermost error, looking through any number of stage wrappers
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            PipelineError::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
