pub mod buildah;
pub mod client;
pub mod executor;
pub mod kubectl;
pub mod skopeo;
pub mod tool;

pub use buildah::Buildah;
pub use client::{
    BuildError, BuildRequest, ClusterControl, ClusterError, Credentials, ImageBuilder,
    RegistryClient, RegistryError, RunRequest, SymbolicTag, TagListing,
};
pub use executor::{RealExecutor, ToolExecutor};
pub use kubectl::Kubectl;
pub use skopeo::Skopeo;
pub use tool::ToolError;
