//! Collaborator contracts for the registry, the image builder and the
//! cluster, plus the request and result types they exchange.

use std::collections::BTreeMap;
use std::path::PathBuf;

use ringfold_core::{LabelSet, Repository, Version};
use secrecy::SecretString;
use serde::Serialize;

use crate::tool::ToolError;

/// Registry user and password. The password never appears in `Debug`
/// output or on a command line.
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Tags of one repository, split into version tags and symbolic tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagListing {
    /// Version tags, ascending.
    pub versions: Vec<Version>,
    /// Ring and other non-version tags with the version they point at.
    pub tags: Vec<SymbolicTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolicTag {
    pub name: String,
    pub version: Option<Version>,
}

/// Version and label bookkeeping in a container registry.
#[allow(async_fn_in_trait)]
pub trait RegistryClient: Send + Sync {
    /// The version behind `tag`. A literal `M.N.P` tag resolves to itself,
    /// `latest` to the highest version tag, anything else to the version
    /// label of the tagged artifact. `None` when the tag does not exist.
    async fn get_tag(&self, repo: &Repository, tag: &str)
    -> Result<Option<Version>, RegistryError>;

    /// Points `tag` at the artifact already tagged `version`.
    async fn set_tag(
        &self,
        repo: &Repository,
        tag: &str,
        version: &Version,
    ) -> Result<(), RegistryError>;

    async fn labels(&self, repo: &Repository, tag: &str)
    -> Result<Option<LabelSet>, RegistryError>;

    /// The raw inspect document of the tagged artifact.
    async fn inspect(
        &self,
        repo: &Repository,
        tag: &str,
    ) -> Result<Option<serde_json::Value>, RegistryError>;

    async fn list(&self, repo: &Repository) -> Result<TagListing, RegistryError>;

    async fn login(&self, registry: &str, credentials: &Credentials) -> Result<(), RegistryError>;
}

/// One image build.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub descriptor: PathBuf,
    pub context: PathBuf,
    pub build_args: BTreeMap<String, String>,
    pub labels: LabelSet,
    /// `repository:tag` the result is tagged with.
    pub image: String,
}

/// Builds, tags and pushes images.
#[allow(async_fn_in_trait)]
pub trait ImageBuilder: Send + Sync {
    async fn build(&self, request: &BuildRequest) -> Result<(), BuildError>;

    async fn tag(&self, source: &str, target: &str) -> Result<(), BuildError>;

    async fn push(&self, image: &str) -> Result<(), BuildError>;

    async fn login(&self, registry: &str, credentials: &Credentials) -> Result<(), BuildError>;
}

/// A single-shot pod.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub pod: String,
    pub image: String,
    pub service_account: String,
    /// Value of the `app.kubernetes.io/name` label.
    pub app_name: String,
    /// Arguments passed to the container entrypoint.
    pub args: Vec<String>,
}

/// Pod operations used by deploy and watch.
#[allow(async_fn_in_trait)]
pub trait ClusterControl: Send + Sync {
    /// Image of the first container of `pod`, `None` when there is no such pod.
    async fn running_image(&self, pod: &str) -> Result<Option<String>, ClusterError>;

    async fn delete_pod(&self, pod: &str) -> Result<(), ClusterError>;

    async fn run(&self, request: &RunRequest) -> Result<(), ClusterError>;
}

// ── Helper ──

pub(crate) fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}

/// `docker://repository[:tag]` transport reference.
pub(crate) fn docker_ref(repo: &Repository, tag: Option<&str>) -> String {
    match tag {
        Some(tag) => format!("docker://{}", repo.reference(tag)),
        None => format!("docker://{repo}"),
    }
}

// ── Error types ──

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to inspect {reference}")]
    Inspect { reference: String, source: ToolError },

    #[error("failed to list tags of {repository}")]
    ListTags { repository: String, source: ToolError },

    #[error("failed to copy {source_ref} to {target_ref}")]
    Copy {
        source_ref: String,
        target_ref: String,
        source: ToolError,
    },

    #[error("registry login to {registry} failed")]
    Login { registry: String, source: ToolError },

    #[error("unexpected output for {reference}")]
    Parse {
        reference: String,
        source: serde_json::Error,
    },

    #[error("invalid version label on {reference}")]
    InvalidLabel {
        reference: String,
        source: ringfold_core::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),

    #[error("build of {image} failed")]
    Build { image: String, source: ToolError },

    #[error("failed to tag {source_ref} as {target_ref}")]
    Tag {
        source_ref: String,
        target_ref: String,
        source: ToolError,
    },

    #[error("failed to push {image}")]
    Push { image: String, source: ToolError },

    #[error("builder login to {registry} failed")]
    Login { registry: String, source: ToolError },
}

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("failed to read pod {pod}")]
    Get { pod: String, source: ToolError },

    #[error("failed to delete pod {pod}")]
    Delete { pod: String, source: ToolError },

    #[error("failed to run pod {pod}")]
    Run { pod: String, source: ToolError },

    #[error("failed to encode overrides for pod {pod}")]
    Overrides {
        pod: String,
        source: serde_json::Error,
    },
}
