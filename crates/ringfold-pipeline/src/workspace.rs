use std::path::{Path, PathBuf};

use ringfold_build::{DescriptorParser, ImageCatalog};
use ringfold_core::{Repository, RingLedger, RingfoldConfig};

use crate::error::{PipelineError, Result};

/// A project checkout together with its resolved settings.
///
/// Everything path-related is resolved against `root`; the process working
/// directory is never consulted.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    config: RingfoldConfig,
    ledger: RingLedger,
    project: String,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, config: RingfoldConfig) -> Result<Self> {
        let project = config
            .project
            .project
            .clone()
            .filter(|p| !p.trim().is_empty())
            .ok_or(PipelineError::MissingProject)?;
        let ledger = RingLedger::new(config.rings.iter().cloned())?;

        Ok(Self {
            root: root.into(),
            config,
            ledger,
            project,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &RingfoldConfig {
        &self.config
    }

    pub fn ledger(&self) -> &RingLedger {
        &self.ledger
    }

    pub fn registry(&self) -> &str {
        &self.config.project.registry
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn etc_dir(&self) -> PathBuf {
        self.root.join(&self.config.project.etc_dir)
    }

    pub fn repository(&self, image: &str) -> Repository {
        Repository::new(self.registry(), &self.project, image)
    }

    /// Discovers and orders the project's images.
    pub fn catalog(&self) -> Result<ImageCatalog> {
        let parser = DescriptorParser::new(self.registry(), &self.project)
            .map_err(|e| PipelineError::Descriptor { source: e })?;
        let catalog = ImageCatalog::discover(
            &self.etc_dir(),
            &self.config.project.descriptor_extension,
            &parser,
        )?;
        tracing::debug!(images = catalog.len(), "catalog loaded");
        Ok(catalog)
    }
}
