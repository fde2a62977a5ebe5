use ringfold_pipeline::{DeployOptions, DeployOutcome, WatchOptions};
use ringfold_registry::{Buildah, Kubectl, Skopeo};

use crate::settings::Settings;

fn deploy_options(
    settings: &Settings,
    kustomization: Option<String>,
    image: Option<String>,
) -> anyhow::Result<DeployOptions> {
    let catalog = settings.workspace.catalog()?;
    let mut options = DeployOptions::from_config(
        &settings.workspace,
        &catalog,
        &settings.ring,
        image.as_deref(),
    )?;
    if kustomization.is_some() {
        options.kustomization = kustomization;
    }
    Ok(options)
}

pub async fn deploy(
    settings: &Settings,
    kustomization: Option<String>,
    image: Option<String>,
) -> anyhow::Result<()> {
    let options = deploy_options(settings, kustomization, image)?;
    let outcome = ringfold_pipeline::deploy(
        &settings.workspace,
        &Skopeo::new(),
        &Kubectl::new(),
        &options,
    )
    .await?;

    match outcome {
        DeployOutcome::NothingTagged => {
            println!("Nothing tagged on {} for {}", options.ring, options.image)
        }
        DeployOutcome::UpToDate { version } => {
            println!("Pod {} already runs {version}", options.pod)
        }
        DeployOutcome::Deployed { previous, image } => {
            println!(
                "Deployed {image} (was {})",
                previous.as_deref().unwrap_or("not running")
            )
        }
    }
    Ok(())
}

pub async fn watch(
    settings: &Settings,
    wait: Option<i64>,
    kustomization: Option<String>,
    image: Option<String>,
) -> anyhow::Result<()> {
    let options = WatchOptions {
        deploy: deploy_options(settings, kustomization, image)?,
        wait_minutes: wait.unwrap_or(settings.workspace.config().watch.wait_minutes),
        login: super::registry_login(settings)?,
    };
    if options.login.is_none() {
        tracing::info!("no registry credentials, cycles run without login");
    }

    ringfold_pipeline::watch(
        &settings.workspace,
        &Skopeo::new(),
        &Buildah::new(),
        &Kubectl::new(),
        &options,
    )
    .await?;
    Ok(())
}
