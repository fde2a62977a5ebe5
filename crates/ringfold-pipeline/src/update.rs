use std::path::PathBuf;

use ringfold_build::Kustomization;
use ringfold_core::{Repository, Version};
use ringfold_registry::RegistryClient;

use crate::error::Result;
use crate::workspace::Workspace;

/// One `newTag` rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagChange {
    pub repository: String,
    pub from: String,
    pub to: Version,
}

/// The rewrites applied to one kustomization file.
#[derive(Debug, Clone)]
pub struct ManifestUpdate {
    pub path: PathBuf,
    pub changes: Vec<TagChange>,
}

/// Points kustomization `newTag` entries at the versions tagged on a ring.
pub struct ManifestUpdater<'a, R: RegistryClient> {
    workspace: &'a Workspace,
    registry: &'a R,
}

impl<'a, R: RegistryClient> ManifestUpdater<'a, R> {
    pub fn new(workspace: &'a Workspace, registry: &'a R) -> Self {
        Self {
            workspace,
            registry,
        }
    }

    /// Rewrites every managed entry whose ring version differs from its
    /// current tag. Files are only written when something changed and
    /// `dry_run` is off. Entries without a version on `ring` are left alone.
    pub async fn update(&self, ring: &str, dry_run: bool) -> Result<Vec<ManifestUpdate>> {
        self.workspace.ledger().position_of(ring)?;

        let mut updates = Vec::new();
        for path in Kustomization::discover(&self.workspace.etc_dir())? {
            let mut kustomization = Kustomization::load(&path)?;
            let mut changes = Vec::new();

            for entry in kustomization.managed_images() {
                let repository = Repository::from_name(entry.repository.as_str());
                let Some(version) = self.registry.get_tag(&repository, ring).await? else {
                    tracing::debug!(%repository, %ring, "no version on ring, keeping tag");
                    continue;
                };
                if entry.tag == version.to_string() {
                    continue;
                }

                kustomization.set_tag(entry.index, &version.to_string());
                changes.push(TagChange {
                    repository: entry.repository,
                    from: entry.tag,
                    to: version,
                });
            }

            if changes.is_empty() {
                continue;
            }
            if !dry_run {
                kustomization.save()?;
            }
            tracing::info!(
                path = %path.display(),
                changes = changes.len(),
                dry_run,
                "updated kustomization"
            );
            updates.push(ManifestUpdate { path, changes });
        }

        Ok(updates)
    }
}
