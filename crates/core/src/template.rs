use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tokio::fs;

use crate::error::{Result, SynthesisError};
use crate::merge::synthesize;
use crate::model::Profile;

/// Raw text of the base profile that subscriptions are merged into.
///
/// The text is kept unparsed so each merge starts from a fresh working copy.
#[derive(Debug, Clone)]
pub struct Template {
    source: Option<PathBuf>,
    text: String,
}

impl Template {
    pub async fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .await
            .map_err(|source| SynthesisError::TemplateUnavailable {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(path = %path.display(), bytes = text.len(), "loaded template");
        Ok(Self {
            source: Some(path.to_path_buf()),
            text,
        })
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            source: None,
            text: text.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Merges a parsed subscription document into a copy of this template.
    pub fn synthesize(&self, subscription_doc: &Value) -> Result<Profile> {
        synthesize(&self.text, subscription_doc)
    }
}
