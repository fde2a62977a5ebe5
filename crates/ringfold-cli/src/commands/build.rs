use ringfold_pipeline::{BuildOptions, BuildOrchestrator, ImageOutcome, RebuildReason};
use ringfold_registry::{Buildah, Skopeo};

use crate::settings::Settings;

pub async fn build(
    settings: &Settings,
    force: bool,
    force_major: bool,
    dry_run: bool,
    images: Vec<String>,
) -> anyhow::Result<()> {
    let workspace = &settings.workspace;
    let catalog = workspace.catalog()?;
    let registry = Skopeo::new();
    let builder = Buildah::new();

    let options = BuildOptions {
        ring: settings.ring.clone(),
        force,
        force_major,
        dry_run,
        images,
    };
    let report = BuildOrchestrator::new(workspace, &registry, &builder)
        .run(&catalog, &options)
        .await?;

    let prefix = if report.dry_run { "would build" } else { "built" };
    for outcome in &report.outcomes {
        match outcome {
            ImageOutcome::Built {
                image,
                from,
                to,
                reason,
                ..
            } => {
                let from = from.map_or_else(|| "-".to_owned(), |v| v.to_string());
                println!("{prefix} {image}: {from} -> {to} ({})", describe(reason));
            }
            ImageOutcome::Skipped { image, version } => {
                let version = version.map_or_else(|| "-".to_owned(), |v| v.to_string());
                println!("unchanged {image}: {version}");
            }
        }
    }
    println!(
        "{} of {} image(s) rebuilt on {}",
        report.built().count(),
        report.outcomes.len(),
        report.ring
    );
    Ok(())
}

fn describe(reason: &RebuildReason) -> String {
    match reason {
        RebuildReason::Forced => "forced".to_owned(),
        RebuildReason::NeverBuilt => "never built".to_owned(),
        RebuildReason::RevisionChanged => "revision changed".to_owned(),
        RebuildReason::DependencyChanged { dependency } => format!("{dependency} changed"),
    }
}
