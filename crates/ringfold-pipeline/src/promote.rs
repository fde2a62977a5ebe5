use ringfold_build::ImageCatalog;
use ringfold_core::{Repository, RingLedger, Shift, Version};
use ringfold_registry::RegistryClient;

use crate::error::Result;
use crate::workspace::Workspace;

/// Outcome of promoting one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub image: String,
    pub source_ring: String,
    pub target_ring: String,
    /// The version copied, `None` when nothing was tagged on the source ring.
    pub version: Option<Version>,
}

/// Copies the version tagged on `source_ring` to the adjacent ring.
///
/// Only the tag pointer moves; nothing is rebuilt. Returns the target ring
/// and the version that was copied.
pub async fn promote<'l, R: RegistryClient>(
    registry: &R,
    ledger: &'l RingLedger,
    repository: &Repository,
    source_ring: &str,
    shift: Shift,
) -> Result<(&'l str, Option<Version>)> {
    let target_ring = ledger.target_ring(source_ring, shift)?;

    let Some(version) = registry.get_tag(repository, source_ring).await? else {
        tracing::info!(%repository, %source_ring, "nothing tagged, skipping");
        return Ok((target_ring, None));
    };

    registry.set_tag(repository, target_ring, &version).await?;
    tracing::info!(%repository, %version, from = %source_ring, to = %target_ring, "{shift}");
    Ok((target_ring, Some(version)))
}

/// Promotes the named images (all catalog images when `images` is empty) in
/// catalog order. The boundary is checked before any tag is touched.
pub async fn promote_images<R: RegistryClient>(
    workspace: &Workspace,
    registry: &R,
    catalog: &ImageCatalog,
    ring: &str,
    shift: Shift,
    images: &[String],
) -> Result<Vec<Promotion>> {
    let ledger = workspace.ledger();
    ledger.target_ring(ring, shift)?;

    let mut promotions = Vec::new();
    for image in catalog.select(images)? {
        let repository = workspace.repository(&image.name);
        let (target_ring, version) = promote(registry, ledger, &repository, ring, shift).await?;
        promotions.push(Promotion {
            image: image.name.clone(),
            source_ring: ring.to_owned(),
            target_ring: target_ring.to_owned(),
            version,
        });
    }

    Ok(promotions)
}
