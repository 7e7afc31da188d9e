use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a synthesis call. There is no partial output.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("invalid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{0}")]
    Validation(String),

    #[error("failed to render profile: {0}")]
    Render(String),

    #[error("template unavailable at {}: {source}", path.display())]
    TemplateUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SynthesisError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        SynthesisError::Validation(message.into())
    }
}

pub type Result<T, E = SynthesisError> = std::result::Result<T, E>;
