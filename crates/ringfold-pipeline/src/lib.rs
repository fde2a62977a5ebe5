//! Operations that tie the catalog, the registry and the builder together.
//!
//! ```text
//! Workspace ──► ImageCatalog ──► BuildOrchestrator ──► ImageBuilder
//!     │                              │        ▲
//!     │                              ▼        │
//!     ├──► promote / update ──► RegistryClient
//!     └──► deploy / watch ────► ClusterControl
//! ```
//!
//! Collaborators are passed in as trait implementations, so every operation
//! here runs unchanged against in-memory fakes.

pub mod checks;
pub mod deploy;
pub mod error;
pub mod login;
pub mod orchestrator;
pub mod promote;
pub mod update;
pub mod workspace;

pub use checks::{Check, collect_checks, run_checks};
pub use deploy::{DeployOptions, DeployOutcome, WatchOptions, deploy, watch, watch_until};
pub use error::{PipelineError, Result};
pub use login::{REGISTRY_SECRET_PATH, RegistryLogin, login, resolve_login};
pub use orchestrator::{BuildOptions, BuildOrchestrator, BuildReport, ImageOutcome, RebuildReason};
pub use promote::{Promotion, promote, promote_images};
pub use update::{ManifestUpdate, ManifestUpdater, TagChange};
pub use workspace::Workspace;
