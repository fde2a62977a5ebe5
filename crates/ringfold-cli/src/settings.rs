use std::path::{Path, PathBuf};

use anyhow::Context;
use ringfold_core::RingfoldConfig;
use ringfold_pipeline::{PipelineError, Workspace};
use secrecy::SecretString;

use crate::GlobalArgs;

/// Resolved per-run settings: the workspace plus run-scoped values.
pub(crate) struct Settings {
    pub workspace: Workspace,
    pub ring: String,
    pub user: Option<String>,
    pub password: Option<SecretString>,
}

impl Settings {
    pub fn resolve(root: PathBuf, args: &GlobalArgs) -> anyhow::Result<Self> {
        let mut config = RingfoldConfig::load(&root).map_err(PipelineError::from)?;
        apply_overrides(&mut config, args);

        let workspace = Workspace::new(root, config)?;
        let ring = match &args.ring {
            Some(ring) => {
                workspace
                    .ledger()
                    .position_of(ring)
                    .map_err(PipelineError::from)?;
                ring.clone()
            }
            None => workspace.ledger().rings()[0].clone(),
        };
        tracing::debug!(
            root = %workspace.root().display(),
            %ring,
            registry = workspace.registry(),
            project = workspace.project(),
            "settings resolved"
        );

        Ok(Self {
            workspace,
            ring,
            user: args.user.clone(),
            password: args.password.clone().map(SecretString::from),
        })
    }
}

fn apply_overrides(config: &mut RingfoldConfig, args: &GlobalArgs) {
    if let Some(registry) = &args.registry {
        config.project.registry = registry.clone();
    }
    if let Some(project) = &args.project {
        config.project.project = Some(project.clone());
    }
    if let Some(vendor) = &args.vendor {
        config.project.vendor = Some(vendor.clone());
    }
    if !args.rings.is_empty() {
        config.rings = args.rings.clone();
    }
}

/// The `-C` directory, or the current directory, walked up to the nearest
/// ringfold.toml.
pub(crate) fn project_root(directory: Option<&Path>) -> anyhow::Result<PathBuf> {
    let start = match directory {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().context("failed to read the current directory")?,
    };
    anyhow::ensure!(start.is_dir(), "{} is not a directory", start.display());
    Ok(RingfoldConfig::find_root(&start))
}

/// Loads `<root>/.env` into the environment when present. Variables already
/// set are kept.
pub(crate) fn load_dotenv(root: &Path) -> anyhow::Result<()> {
    let path = root.join(".env");
    if !path.is_file() {
        return Ok(());
    }
    dotenvy::from_path(&path).with_context(|| format!("failed to load {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded .env");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> GlobalArgs {
        GlobalArgs {
            directory: None,
            ring: None,
            registry: None,
            project: None,
            vendor: None,
            rings: vec![],
            user: None,
            password: None,
        }
    }

    #[test]
    fn flags_override_config() {
        let mut config = RingfoldConfig::default();
        config.project.project = Some("acme/shop".to_owned());

        apply_overrides(
            &mut config,
            &GlobalArgs {
                registry: Some("quay.io".to_owned()),
                rings: vec!["a".to_owned(), "b".to_owned()],
                ..args()
            },
        );

        assert_eq!(config.project.registry, "quay.io");
        assert_eq!(config.project.project.as_deref(), Some("acme/shop"));
        assert_eq!(config.rings, ["a", "b"]);
    }

    #[test]
    fn ring_defaults_to_first() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings = Settings::resolve(
            dir.path().to_path_buf(),
            &GlobalArgs {
                project: Some("acme/shop".to_owned()),
                ..args()
            },
        )
        .unwrap();
        assert_eq!(settings.ring, "dev");
    }

    #[test]
    fn unknown_ring_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = Settings::resolve(
            dir.path().to_path_buf(),
            &GlobalArgs {
                project: Some("acme/shop".to_owned()),
                ring: Some("qa".to_owned()),
                ..args()
            },
        )
        .err()
        .unwrap();
        assert_eq!(
            err.downcast_ref::<PipelineError>().map(PipelineError::kind),
            Some("boundary")
        );
    }
}
