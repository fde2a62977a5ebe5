use ringfold_pipeline::ManifestUpdater;
use ringfold_registry::Skopeo;

use crate::settings::Settings;

pub async fn update(settings: &Settings, dry_run: bool) -> anyhow::Result<()> {
    let registry = Skopeo::new();
    let updates = ManifestUpdater::new(&settings.workspace, &registry)
        .update(&settings.ring, dry_run)
        .await?;

    if updates.is_empty() {
        println!("All kustomizations match {}", settings.ring);
        return Ok(());
    }

    for update in &updates {
        println!("{}", update.path.display());
        for change in &update.changes {
            println!("  {}: {} -> {}", change.repository, change.from, change.to);
        }
    }
    if dry_run {
        println!("(dry run, nothing written)");
    }
    Ok(())
}
