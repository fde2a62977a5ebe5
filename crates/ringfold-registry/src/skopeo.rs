use ringfold_core::image::LABEL_VERSION;
use ringfold_core::{LabelSet, Repository, Version};
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::client::{
    Credentials, RegistryClient, RegistryError, SymbolicTag, TagListing, args, docker_ref,
};
use crate::executor::{RealExecutor, ToolExecutor};

/// [`RegistryClient`] backed by the `skopeo` CLI.
pub struct Skopeo<E: ToolExecutor = RealExecutor> {
    executor: E,
}

impl Skopeo<RealExecutor> {
    pub fn new() -> Self {
        Self {
            executor: RealExecutor::new("skopeo"),
        }
    }
}

impl Default for Skopeo<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct TagList {
    #[serde(rename = "Tags", default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct InspectLabels {
    #[serde(rename = "Labels", default)]
    labels: Option<std::collections::BTreeMap<String, String>>,
}

impl<E: ToolExecutor> Skopeo<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }

    /// All tags of `repo`; a repository that does not exist has none.
    pub async fn list_tags(&self, repo: &Repository) -> Result<Vec<String>, RegistryError> {
        let reference = docker_ref(repo, None);
        let output = match self.executor.exec(&args(["list-tags", &reference])).await {
            Ok(output) => output,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => {
                return Err(RegistryError::ListTags {
                    repository: repo.to_string(),
                    source: e,
                });
            }
        };

        let list: TagList = serde_json::from_str(&output)
            .map_err(|e| RegistryError::Parse { reference, source: e })?;
        Ok(list.tags)
    }

    /// Highest version tag of `repo`.
    pub async fn latest_version(&self, repo: &Repository) -> Result<Option<Version>, RegistryError> {
        let tags = self.list_tags(repo).await?;
        Ok(tags.iter().filter_map(|tag| tag.parse::<Version>().ok()).max())
    }

    async fn inspect_raw(&self, repo: &Repository, tag: &str) -> Result<Option<String>, RegistryError> {
        let reference = docker_ref(repo, Some(tag));
        match self.executor.exec(&args(["inspect", &reference])).await {
            Ok(output) => Ok(Some(output)),
            Err(e) if e.is_not_found() => {
                tracing::debug!(%reference, "tag not present");
                Ok(None)
            }
            Err(e) => Err(RegistryError::Inspect {
                reference,
                source: e,
            }),
        }
    }
}

impl<E: ToolExecutor> RegistryClient for Skopeo<E> {
    async fn get_tag(
        &self,
        repo: &Repository,
        tag: &str,
    ) -> Result<Option<Version>, RegistryError> {
        if let Ok(version) = tag.parse::<Version>() {
            return Ok(Some(version));
        }
        if tag == "latest" {
            return self.latest_version(repo).await;
        }

        let Some(labels) = self.labels(repo, tag).await? else {
            return Ok(None);
        };
        labels.version().map_err(|e| RegistryError::InvalidLabel {
            reference: repo.reference(tag),
            source: e,
        })
    }

    async fn set_tag(
        &self,
        repo: &Repository,
        tag: &str,
        version: &Version,
    ) -> Result<(), RegistryError> {
        let source_ref = docker_ref(repo, Some(&version.to_string()));
        let target_ref = docker_ref(repo, Some(tag));
        tracing::info!(%repo, %version, %tag, "tagging");

        self.executor
            .exec(&args(["copy", &source_ref, &target_ref]))
            .await
            .map_err(|e| RegistryError::Copy {
                source_ref,
                target_ref,
                source: e,
            })?;

        Ok(())
    }

    async fn labels(
        &self,
        repo: &Repository,
        tag: &str,
    ) -> Result<Option<LabelSet>, RegistryError> {
        let Some(output) = self.inspect_raw(repo, tag).await? else {
            return Ok(None);
        };

        let inspected: InspectLabels =
            serde_json::from_str(&output).map_err(|e| RegistryError::Parse {
                reference: repo.reference(tag),
                source: e,
            })?;
        let labels: LabelSet = inspected.labels.unwrap_or_default().into_iter().collect();

        tracing::debug!(
            reference = %repo.reference(tag),
            version = labels.get(LABEL_VERSION),
            "read labels"
        );
        Ok(Some(labels))
    }

    async fn inspect(
        &self,
        repo: &Repository,
        tag: &str,
    ) -> Result<Option<serde_json::Value>, RegistryError> {
        let Some(output) = self.inspect_raw(repo, tag).await? else {
            return Ok(None);
        };
        serde_json::from_str(&output)
            .map(Some)
            .map_err(|e| RegistryError::Parse {
                reference: repo.reference(tag),
                source: e,
            })
    }

    async fn list(&self, repo: &Repository) -> Result<TagListing, RegistryError> {
        let mut listing = TagListing::default();

        for tag in self.list_tags(repo).await? {
            match tag.parse::<Version>() {
                Ok(version) => listing.versions.push(version),
                Err(_) => {
                    let version = self.get_tag(repo, &tag).await?;
                    listing.tags.push(SymbolicTag { name: tag, version });
                }
            }
        }
        listing.versions.sort();

        Ok(listing)
    }

    async fn login(&self, registry: &str, credentials: &Credentials) -> Result<(), RegistryError> {
        self.executor
            .exec_with_stdin(
                &args([
                    "login",
                    "--username",
                    &credentials.username,
                    "--password-stdin",
                    registry,
                ]),
                credentials.password.expose_secret().as_bytes(),
            )
            .await
            .map_err(|e| RegistryError::Login {
                registry: registry.to_owned(),
                source: e,
            })?;

        Ok(())
    }
}
