use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "ringfold.toml";

/// ringfold.toml configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingfoldConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    /// Promotion rings in order, e.g. `["dev", "staging", "prod"]`
    #[serde(default = "default_rings")]
    pub rings: Vec<String>,
    /// Labels added to every built image
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Check name → shell command, merged with `# CHECK` descriptor lines
    #[serde(default)]
    pub checks: BTreeMap<String, String>,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Container registry host
    #[serde(default = "default_registry")]
    pub registry: String,
    /// Project path inside the registry, e.g. `acme/shop`
    pub project: Option<String>,
    /// Written to the `org.opencontainers.image.vendor` label
    pub vendor: Option<String>,
    /// Directory holding descriptors and kustomizations, relative to the root
    #[serde(default = "default_etc_dir")]
    pub etc_dir: PathBuf,
    /// Descriptor file extension
    #[serde(default = "default_descriptor_extension")]
    pub descriptor_extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Minutes between deploy cycles; zero or negative runs a single cycle
    #[serde(default = "default_wait_minutes")]
    pub wait_minutes: i64,
    /// Image whose version is deployed (defaults to the root image)
    pub image: Option<String>,
    /// Pod that runs the deploy image
    #[serde(default = "default_pod")]
    pub pod: String,
    /// Service account used by the deploy pod
    #[serde(default = "default_service_account")]
    pub service_account: String,
    /// Kustomization passed to the deploy pod
    pub kustomization: Option<String>,
}

impl Default for RingfoldConfig {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            rings: default_rings(),
            labels: BTreeMap::new(),
            checks: BTreeMap::new(),
            watch: WatchConfig::default(),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            registry: default_registry(),
            project: None,
            vendor: None,
            etc_dir: default_etc_dir(),
            descriptor_extension: default_descriptor_extension(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            wait_minutes: default_wait_minutes(),
            image: None,
            pod: default_pod(),
            service_account: default_service_account(),
            kustomization: None,
        }
    }
}

impl RingfoldConfig {
    /// Load from ringfold.toml in the given directory, or return defaults if not found.
    pub fn load(root: &Path) -> crate::Result<Self> {
        let config_path = root.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path,
                source: e,
            })
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Walks up from `start` to the first directory containing ringfold.toml.
    /// Falls back to `start` itself when no ancestor has one.
    pub fn find_root(start: &Path) -> PathBuf {
        start
            .ancestors()
            .find(|dir| dir.join(CONFIG_FILE_NAME).is_file())
            .unwrap_or(start)
            .to_path_buf()
    }
}

fn default_registry() -> String {
    "ghcr.io".to_owned()
}

fn default_etc_dir() -> PathBuf {
    PathBuf::from("etc")
}

fn default_descriptor_extension() -> String {
    "containerfile".to_owned()
}

fn default_rings() -> Vec<String> {
    vec!["dev".to_owned(), "staging".to_owned(), "prod".to_owned()]
}

fn default_wait_minutes() -> i64 {
    5
}

fn default_pod() -> String {
    "deploy".to_owned()
}

fn default_service_account() -> String {
    "ops".to_owned()
}
