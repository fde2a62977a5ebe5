//! Decides, builds, tags and pushes images for one ring.
//!
//! Images are processed in catalog order. For each image the stored labels
//! on the ring are compared with the freshly computed revision hash and with
//! the versions its dependencies resolved to earlier in the same run; only
//! images whose inputs changed are rebuilt. A failure stops the run, since
//! every later image may depend on the one that failed.

use std::collections::{BTreeMap, HashMap, HashSet};

use ringfold_build::{ImageCatalog, RevisionHash, RevisionHasher};
use ringfold_core::image::LABEL_VENDOR;
use ringfold_core::version::bump;
use ringfold_core::{Image, LabelSet, Version};
use ringfold_registry::{BuildRequest, ImageBuilder, RegistryClient};

use crate::error::{PipelineError, Result};
use crate::update::ManifestUpdater;
use crate::workspace::Workspace;

/// Build argument carrying the ring name into descriptors.
pub const RING_BUILD_ARG: &str = "RING";

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub ring: String,
    /// Rebuild even when nothing changed.
    pub force: bool,
    /// Bump the major part regardless of the previous ring.
    pub force_major: bool,
    /// Decide and report, but never call the builder.
    pub dry_run: bool,
    /// Images to process; empty processes the whole catalog.
    pub images: Vec<String>,
}

/// Why an image is rebuilt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildReason {
    Forced,
    NeverBuilt,
    RevisionChanged,
    DependencyChanged { dependency: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Built {
        image: String,
        from: Option<Version>,
        to: Version,
        revision: RevisionHash,
        reason: RebuildReason,
    },
    Skipped {
        image: String,
        version: Option<Version>,
    },
}

impl ImageOutcome {
    pub fn image(&self) -> &str {
        match self {
            Self::Built { image, .. } | Self::Skipped { image, .. } => image,
        }
    }

    /// The version the image carries on the ring after this run.
    pub fn version(&self) -> Option<&Version> {
        match self {
            Self::Built { to, .. } => Some(to),
            Self::Skipped { version, .. } => version.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub ring: String,
    pub dry_run: bool,
    pub outcomes: Vec<ImageOutcome>,
}

impl BuildReport {
    pub fn built(&self) -> impl Iterator<Item = &ImageOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ImageOutcome::Built { .. }))
    }

    pub fn get(&self, image: &str) -> Option<&ImageOutcome> {
        self.outcomes.iter().find(|o| o.image() == image)
    }
}

pub struct BuildOrchestrator<'a, R: RegistryClient, B: ImageBuilder> {
    workspace: &'a Workspace,
    registry: &'a R,
    builder: &'a B,
}

/// Per-run state: versions resolved so far, in this run or from the registry.
struct RunState<'o> {
    ring: &'o str,
    resolved: HashMap<String, Version>,
    looked_up: HashSet<String>,
}

impl<'a, R: RegistryClient, B: ImageBuilder> BuildOrchestrator<'a, R, B> {
    pub fn new(workspace: &'a Workspace, registry: &'a R, builder: &'a B) -> Self {
        Self {
            workspace,
            registry,
            builder,
        }
    }

    pub async fn run(&self, catalog: &ImageCatalog, options: &BuildOptions) -> Result<BuildReport> {
        let ledger = self.workspace.ledger();
        let ring = options.ring.as_str();
        ledger.position_of(ring)?;
        let reference_ring = if options.force_major {
            None
        } else {
            ledger.previous(ring)?
        };

        let selected: HashSet<&str> = catalog
            .select(&options.images)?
            .into_iter()
            .map(|image| image.name.as_str())
            .collect();

        tracing::info!(
            %ring,
            reference = reference_ring.unwrap_or("-"),
            images = selected.len(),
            dry_run = options.dry_run,
            "starting build"
        );

        let mut state = RunState {
            ring,
            resolved: HashMap::new(),
            looked_up: HashSet::new(),
        };
        let mut report = BuildReport {
            ring: ring.to_owned(),
            dry_run: options.dry_run,
            outcomes: Vec::new(),
        };

        for image in catalog.images() {
            if !selected.contains(image.name.as_str()) {
                continue;
            }
            let outcome = self
                .process(catalog, image, reference_ring, options, &mut state)
                .await?;
            if let Some(version) = outcome.version() {
                state.resolved.insert(image.name.clone(), *version);
            }
            state.looked_up.insert(image.name.clone());
            report.outcomes.push(outcome);
        }

        Ok(report)
    }

    async fn process(
        &self,
        catalog: &ImageCatalog,
        image: &Image,
        reference_ring: Option<&str>,
        options: &BuildOptions,
        state: &mut RunState<'_>,
    ) -> Result<ImageOutcome> {
        let ring = state.ring;
        let repository = self.workspace.repository(&image.name);

        let stored = self
            .registry
            .labels(&repository, ring)
            .await?
            .unwrap_or_default();
        let current = stored.version().map_err(|e| PipelineError::InvalidLabel {
            image: image.name.clone(),
            source: e,
        })?;

        if image.requires_update {
            let updates = ManifestUpdater::new(self.workspace, self.registry)
                .update(ring, options.dry_run)
                .await?;
            tracing::info!(image = %image.name, files = updates.len(), "updated manifests");
        }

        for dependency in &image.dependencies {
            self.resolve(dependency, state).await?;
        }
        let revision = RevisionHasher::new(self.workspace.root())
            .hash(image, &state.resolved)
            .map_err(|e| PipelineError::Revision {
                image: image.name.clone(),
                source: e,
            })?;

        let dependency_versions = self.dependency_versions(catalog, image, state).await?;

        let Some(reason) = rebuild_reason(
            options.force,
            current.as_ref(),
            &stored,
            &revision,
            &dependency_versions,
        ) else {
            tracing::info!(image = %image.name, version = ?current, "no change detected, skipping");
            return Ok(ImageOutcome::Skipped {
                image: image.name.clone(),
                version: current,
            });
        };

        let reference = match reference_ring {
            Some(previous) => self.registry.get_tag(&repository, previous).await?,
            None => None,
        };
        let target = bump(current.as_ref(), reference.as_ref(), options.force_major)?;
        tracing::info!(
            image = %image.name,
            ?reason,
            from = ?current,
            reference = ?reference,
            to = %target,
            "rebuilding"
        );

        let mut labels = self.common_labels();
        for (dependency, version) in &dependency_versions {
            labels.set_dependency(dependency, version);
        }
        labels.set_reference_name(&image.name);
        labels.set_version(&target);
        labels.set_revision(revision.as_str());

        if !options.dry_run {
            let versioned = repository.reference(&target.to_string());
            let ringed = repository.reference(ring);
            let request = BuildRequest {
                descriptor: self.workspace.root().join(&image.descriptor_path),
                context: self.workspace.root().to_path_buf(),
                build_args: BTreeMap::from([(RING_BUILD_ARG.to_owned(), ring.to_owned())]),
                labels,
                image: versioned.clone(),
            };

            self.builder.build(&request).await?;
            self.builder.tag(&versioned, &ringed).await?;
            self.builder.push(&versioned).await?;
            self.builder.push(&ringed).await?;
        }

        Ok(ImageOutcome::Built {
            image: image.name.clone(),
            from: current,
            to: target,
            revision,
            reason,
        })
    }

    /// Versions recorded as `dependency.<name>` labels: every other image for
    /// the root image, the declared dependencies otherwise.
    async fn dependency_versions(
        &self,
        catalog: &ImageCatalog,
        image: &Image,
        state: &mut RunState<'_>,
    ) -> Result<BTreeMap<String, Version>> {
        let names: Vec<&str> = if image.is_root_image {
            catalog
                .images()
                .iter()
                .filter(|other| other.name != image.name)
                .map(|other| other.name.as_str())
                .collect()
        } else {
            image.dependencies.iter().map(String::as_str).collect()
        };

        let mut versions = BTreeMap::new();
        for name in names {
            if let Some(version) = self.resolve(name, state).await? {
                versions.insert(name.to_owned(), version);
            }
        }
        Ok(versions)
    }

    /// The version of `image` on the ring: resolved earlier in this run, or
    /// read from the registry once for images this run does not process.
    async fn resolve(&self, image: &str, state: &mut RunState<'_>) -> Result<Option<Version>> {
        if let Some(version) = state.resolved.get(image) {
            return Ok(Some(*version));
        }
        if !state.looked_up.insert(image.to_owned()) {
            return Ok(None);
        }

        let version = self
            .registry
            .get_tag(&self.workspace.repository(image), state.ring)
            .await?;
        tracing::debug!(%image, ring = state.ring, ?version, "resolved from registry");
        if let Some(version) = version {
            state.resolved.insert(image.to_owned(), version);
        }
        Ok(version)
    }

    fn common_labels(&self) -> LabelSet {
        let config = self.workspace.config();
        let mut labels: LabelSet = config
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(vendor) = &config.project.vendor {
            labels.insert(LABEL_VENDOR, vendor.as_str());
        }
        labels
    }
}

fn rebuild_reason(
    force: bool,
    current: Option<&Version>,
    stored: &LabelSet,
    revision: &RevisionHash,
    dependency_versions: &BTreeMap<String, Version>,
) -> Option<RebuildReason> {
    if force {
        return Some(RebuildReason::Forced);
    }
    if current.is_none() {
        return Some(RebuildReason::NeverBuilt);
    }
    if !revision.matches(stored.revision()) {
        return Some(RebuildReason::RevisionChanged);
    }
    dependency_versions
        .iter()
        .find(|(name, version)| stored.dependency(name) != Some(version.to_string().as_str()))
        .map(|(name, _)| RebuildReason::DependencyChanged {
            dependency: name.clone(),
        })
}
