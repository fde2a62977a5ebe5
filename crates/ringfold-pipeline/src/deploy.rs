use std::future::Future;
use std::time::Duration;

use ringfold_build::{CatalogError, ImageCatalog};
use ringfold_core::Version;
use ringfold_registry::{ClusterControl, ImageBuilder, RegistryClient, RunRequest};

use crate::error::{PipelineError, Result};
use crate::login::{RegistryLogin, login};
use crate::workspace::Workspace;

#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub ring: String,
    /// Catalog image whose ring version is deployed.
    pub image: String,
    pub pod: String,
    pub service_account: String,
    /// Value of the pod's `app.kubernetes.io/name` label.
    pub app_name: String,
    /// Handed to the deploy container as its argument.
    pub kustomization: Option<String>,
}

impl DeployOptions {
    /// Options from `[watch]`. The deploy image is `image` when given, then
    /// `[watch].image`, then the catalog's root image; a named image must be
    /// in the catalog. The pod label reuses the service account name.
    pub fn from_config(
        workspace: &Workspace,
        catalog: &ImageCatalog,
        ring: &str,
        image: Option<&str>,
    ) -> Result<Self> {
        let watch = &workspace.config().watch;
        let image = match image.or(watch.image.as_deref()) {
            Some(name) => catalog
                .get(name)
                .map(|image| image.name.clone())
                .ok_or_else(|| CatalogError::UnknownImage(name.to_owned()))?,
            None => catalog
                .root()
                .map(|root| root.name.clone())
                .ok_or(PipelineError::MissingDeployImage)?,
        };

        Ok(Self {
            ring: ring.to_owned(),
            image,
            pod: watch.pod.clone(),
            service_account: watch.service_account.clone(),
            app_name: watch.service_account.clone(),
            kustomization: watch.kustomization.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// The ring has no version of the deploy image yet.
    NothingTagged,
    UpToDate { version: Version },
    Deployed {
        previous: Option<String>,
        image: String,
    },
}

/// Replaces the deploy pod when the ring's version of the deploy image
/// differs from the one it runs.
pub async fn deploy<R: RegistryClient, C: ClusterControl>(
    workspace: &Workspace,
    registry: &R,
    cluster: &C,
    options: &DeployOptions,
) -> Result<DeployOutcome> {
    workspace.ledger().position_of(&options.ring)?;
    let repository = workspace.repository(&options.image);

    let running = cluster.running_image(&options.pod).await?;
    let running_tag = running
        .as_deref()
        .and_then(|image| image.rsplit_once(':'))
        .map(|(_, tag)| tag);

    let Some(version) = registry.get_tag(&repository, &options.ring).await? else {
        tracing::info!(%repository, ring = %options.ring, "no version tagged, nothing to deploy");
        return Ok(DeployOutcome::NothingTagged);
    };
    tracing::info!(current = running_tag.unwrap_or("-"), new = %version, "checked deploy");

    if running_tag == Some(version.to_string().as_str()) {
        return Ok(DeployOutcome::UpToDate { version });
    }

    if running.is_some() {
        cluster.delete_pod(&options.pod).await?;
    }

    let image = repository.reference(&version.to_string());
    cluster
        .run(&RunRequest {
            pod: options.pod.clone(),
            image: image.clone(),
            service_account: options.service_account.clone(),
            app_name: options.app_name.clone(),
            args: options.kustomization.iter().cloned().collect(),
        })
        .await?;

    Ok(DeployOutcome::Deployed {
        previous: running,
        image,
    })
}

pub struct WatchOptions {
    pub deploy: DeployOptions,
    /// Minutes between cycles; zero or less runs a single cycle.
    pub wait_minutes: i64,
    pub login: Option<RegistryLogin>,
}

/// Runs login + deploy cycles until `shutdown` resolves.
///
/// A failing cycle is logged and the loop goes on. With a non-positive wait
/// a single cycle runs and its result is returned.
pub async fn watch_until<R, B, C, S>(
    workspace: &Workspace,
    registry: &R,
    builder: &B,
    cluster: &C,
    options: &WatchOptions,
    shutdown: S,
) -> Result<()>
where
    R: RegistryClient,
    B: ImageBuilder,
    C: ClusterControl,
    S: Future,
{
    if options.wait_minutes <= 0 {
        return cycle(workspace, registry, builder, cluster, options)
            .await
            .map(|_| ());
    }

    let wait = Duration::from_secs(options.wait_minutes.unsigned_abs().saturating_mul(60));
    tokio::pin!(shutdown);

    loop {
        match cycle(workspace, registry, builder, cluster, options).await {
            Ok(outcome) => tracing::debug!(?outcome, "deploy cycle finished"),
            Err(e) => tracing::error!(kind = e.kind(), error = %e, "deploy cycle failed"),
        }

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = &mut shutdown => {
                tracing::info!("watch interrupted, exiting");
                return Ok(());
            }
        }
    }
}

async fn cycle<R: RegistryClient, B: ImageBuilder, C: ClusterControl>(
    workspace: &Workspace,
    registry: &R,
    builder: &B,
    cluster: &C,
    options: &WatchOptions,
) -> Result<DeployOutcome> {
    if let Some(credentials) = &options.login {
        login(registry, builder, credentials).await?;
    }
    deploy(workspace, registry, cluster, &options.deploy).await
}

/// [`watch_until`] interrupted by Ctrl-C.
pub async fn watch<R: RegistryClient, B: ImageBuilder, C: ClusterControl>(
    workspace: &Workspace,
    registry: &R,
    builder: &B,
    cluster: &C,
    options: &WatchOptions,
) -> Result<()> {
    watch_until(
        workspace,
        registry,
        builder,
        cluster,
        options,
        tokio::signal::ctrl_c(),
    )
    .await
}
