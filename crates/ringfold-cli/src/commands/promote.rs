use ringfold_core::Shift;
use ringfold_pipeline::promote_images;
use ringfold_registry::Skopeo;

use crate::settings::Settings;

pub async fn promote(settings: &Settings, shift: Shift, images: &[String]) -> anyhow::Result<()> {
    let workspace = &settings.workspace;
    let catalog = workspace.catalog()?;
    let registry = Skopeo::new();

    let promotions =
        promote_images(workspace, &registry, &catalog, &settings.ring, shift, images).await?;

    for promotion in &promotions {
        match &promotion.version {
            Some(version) => println!(
                "{}: {} {} -> {}",
                promotion.image, version, promotion.source_ring, promotion.target_ring
            ),
            None => println!(
                "{}: nothing tagged on {}",
                promotion.image, promotion.source_ring
            ),
        }
    }
    Ok(())
}
