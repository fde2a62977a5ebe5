use std::collections::BTreeMap;

use ringfold_pipeline::PipelineError;
use ringfold_registry::{RegistryClient, Skopeo};

use crate::settings::Settings;

/// Tags per image, keyed by image name.
pub async fn list(settings: &Settings, images: &[String]) -> anyhow::Result<()> {
    let workspace = &settings.workspace;
    let catalog = workspace.catalog()?;
    let registry = Skopeo::new();

    let mut listings = BTreeMap::new();
    for image in catalog.select(images).map_err(PipelineError::from)? {
        let listing = registry
            .list(&workspace.repository(&image.name))
            .await
            .map_err(PipelineError::from)?;
        listings.insert(image.name.as_str(), listing);
    }

    println!("{}", serde_json::to_string_pretty(&listings)?);
    Ok(())
}

/// Version behind `tag` (default: the ring) per image, or the full inspect
/// document with `verbose`.
pub async fn get(
    settings: &Settings,
    tag: Option<&str>,
    verbose: bool,
    images: &[String],
) -> anyhow::Result<()> {
    let workspace = &settings.workspace;
    let catalog = workspace.catalog()?;
    let registry = Skopeo::new();
    let tag = tag.unwrap_or(&settings.ring);

    let mut result = BTreeMap::new();
    for image in catalog.select(images).map_err(PipelineError::from)? {
        let repository = workspace.repository(&image.name);
        let value = if verbose {
            registry
                .inspect(&repository, tag)
                .await
                .map_err(PipelineError::from)?
                .unwrap_or(serde_json::Value::Null)
        } else {
            let version = registry
                .get_tag(&repository, tag)
                .await
                .map_err(PipelineError::from)?;
            serde_json::to_value(version)?
        };
        result.insert(image.name.as_str(), value);
    }

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// The catalog in build order with dependencies and markers.
pub fn images(settings: &Settings) -> anyhow::Result<()> {
    let catalog = settings.workspace.catalog()?;

    for image in catalog.images() {
        let mut line = image.name.clone();
        if !image.dependencies.is_empty() {
            line.push_str(&format!(" <- {}", image.dependencies.join(", ")));
        }
        let flags: Vec<&str> = [
            (image.is_root_image, "root"),
            (image.deferred, "sort-last"),
            (image.requires_update, "update"),
        ]
        .into_iter()
        .filter_map(|(set, flag)| set.then_some(flag))
        .collect();
        if !flags.is_empty() {
            line.push_str(&format!(" [{}]", flags.join(", ")));
        }
        println!("{line}");
    }
    for rejected in catalog.rejected() {
        println!("skipped: {rejected}");
    }
    Ok(())
}
