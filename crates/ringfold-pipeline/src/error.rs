use std::path::PathBuf;

use ringfold_build::{CatalogError, DescriptorError, KustomizeError, RevisionError};
use ringfold_registry::{BuildError, ClusterError, RegistryError};

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] ringfold_core::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("invalid descriptor matching settings")]
    Descriptor { source: DescriptorError },

    #[error("failed to compute revision of '{image}'")]
    Revision { image: String, source: RevisionError },

    #[error(transparent)]
    Kustomize(#[from] KustomizeError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("image '{image}' carries an invalid version label")]
    InvalidLabel {
        image: String,
        source: ringfold_core::Error,
    },

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    // ── Settings ──
    #[error("no registry project configured; set [project].project in ringfold.toml or pass --project")]
    MissingProject,

    #[error("no deploy image: the catalog has no root image and none is configured")]
    MissingDeployImage,

    #[error("unknown check '{0}'")]
    UnknownCheck(String),

    #[error("failed to read registry credentials from {path}")]
    CredentialsRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid registry credentials in {path}")]
    CredentialsParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    // ── Checks ──
    #[error("check '{name}' failed ({status})")]
    CheckFailed {
        name: String,
        status: std::process::ExitStatus,
    },

    #[error("failed to start check '{name}'")]
    CheckSpawn {
        name: String,
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Stable category used in `error[<kind>]` reports.
    pub fn kind(&self) -> &'static str {
        use ringfold_core::Error as CoreError;

        match self {
            Self::Core(e) => match e {
                CoreError::CyclicDependency { .. } | CoreError::MultipleDeferred { .. } => "graph",
                CoreError::UnknownRing { .. } | CoreError::RingBoundary { .. } => "boundary",
                CoreError::InvalidVersion { .. } | CoreError::VersionOverflow { .. } => "registry",
                CoreError::ConfigLoad { .. } => "io",
                CoreError::ConfigParse { .. } | CoreError::ConfigInvalid { .. } => "config",
            },
            Self::Catalog(e) => match e {
                CatalogError::Graph { .. } => "graph",
                CatalogError::ReadDir { .. } => "io",
                CatalogError::DuplicateImage(_) | CatalogError::UnknownImage(_) => "config",
            },
            Self::Descriptor { .. } => "config",
            Self::Revision { source, .. } => match source {
                RevisionError::UnresolvedDependency { .. } => "registry",
                RevisionError::MissingSource { .. } | RevisionError::Read { .. } => "io",
            },
            Self::Kustomize(e) => match e {
                KustomizeError::Parse { .. } => "config",
                KustomizeError::Read { .. }
                | KustomizeError::Render { .. }
                | KustomizeError::Write { .. } => "io",
            },
            Self::Registry(_) | Self::InvalidLabel { .. } => "registry",
            Self::Build(_) => "build",
            Self::Cluster(_) => "cluster",
            Self::MissingProject
            | Self::MissingDeployImage
            | Self::UnknownCheck(_)
            | Self::CredentialsParse { .. } => "config",
            Self::CredentialsRead { .. } | Self::CheckSpawn { .. } => "io",
            Self::CheckFailed { .. } => "check",
        }
    }
}
