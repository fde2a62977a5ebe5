use ringfold_pipeline::{collect_checks, run_checks};

use crate::settings::Settings;

pub async fn check(settings: &Settings, name: Option<&str>) -> anyhow::Result<()> {
    let workspace = &settings.workspace;
    let catalog = workspace.catalog()?;
    let checks = collect_checks(workspace.config(), &catalog, name)?;

    if checks.is_empty() {
        println!("No checks defined");
        return Ok(());
    }

    run_checks(workspace.root(), &checks).await?;
    println!("{} check(s) passed", checks.len());
    Ok(())
}
