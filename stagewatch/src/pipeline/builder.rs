//! Pipeline builder.

use super::Pipeline;
use crate::collaborators::Collaborators;
use crate::config::StagewatchConfig;
use crate::errors::Result;
use crate::watermark::WatermarkStore;
use std::path::PathBuf;

/// Builder for a [`Pipeline`] rooted at a project directory.
///
/// Anything not supplied is derived: configuration is read from the root,
/// the watermark store from the configured state file, and collaborators
/// from the configured commands.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    root: PathBuf,
    config: Option<StagewatchConfig>,
    collaborators: Option<Collaborators>,
}

impl PipelineBuilder {
    /// Creates a builder for the project at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            config: None,
            collaborators: None,
        }
    }

    /// Uses `config` instead of reading `stagewatch.json`.
    #[must_use]
    pub fn config(mut self, config: StagewatchConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Uses `collaborators` instead of the configured commands.
    #[must_use]
    pub fn collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = Some(collaborators);
        self
    }

    /// Builds the pipeline, loading persisted watermarks.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration or the state file exists but
    /// can't be read.
    pub fn build(self) -> Result<Pipeline> {
        let config = match self.config {
            Some(config) => config,
            None => StagewatchConfig::load(&self.root)?,
        };
        let store = WatermarkStore::load_from(self.root.join(&config.state_file))?;
        let collaborators = self
            .collaborators
            .unwrap_or_else(|| Collaborators::from_config(&config));

        Ok(Pipeline::from_parts(self.root, config, store, collaborators))
    }
}
