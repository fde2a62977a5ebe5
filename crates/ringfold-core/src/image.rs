//! Image model shared by the catalog, the registry clients and the pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::Version;

pub const LABEL_VERSION: &str = "org.opencontainers.image.version";
pub const LABEL_REVISION: &str = "org.opencontainers.image.revision";
pub const LABEL_REF_NAME: &str = "org.opencontainers.image.ref.name";
pub const LABEL_VENDOR: &str = "org.opencontainers.image.vendor";
pub const DEPENDENCY_LABEL_PREFIX: &str = "dependency.";

/// An image described by one descriptor file (`etc/<name>.containerfile`).
///
/// Records are created fresh on every run from the descriptor files; nothing
/// here is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Descriptor file stem
    pub name: String,
    pub descriptor_path: PathBuf,
    /// Images this one is built `FROM`, in declaration order, without duplicates
    pub dependencies: Vec<String>,
    /// Paths, relative to the working directory, copied into the image
    pub sources: Vec<PathBuf>,
    /// Aggregates every other image's version in its dependency labels
    pub is_root_image: bool,
    /// Sorted after every other image
    pub deferred: bool,
    /// Deployment manifests must be updated before deciding on a rebuild
    pub requires_update: bool,
    /// Check name → shell command
    pub checks: BTreeMap<String, String>,
}

impl Image {
    pub fn new(name: impl Into<String>, descriptor_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            descriptor_path: descriptor_path.into(),
            dependencies: Vec::new(),
            sources: Vec::new(),
            is_root_image: false,
            deferred: false,
            requires_update: false,
            checks: BTreeMap::new(),
        }
    }

    /// Root and sort-last images are both ordered after everything else.
    pub fn sorts_last(&self) -> bool {
        self.is_root_image || self.deferred
    }

    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.iter().any(|d| d == name)
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Where an image's tags live: `registry/project/image`.
///
/// # Examples
///
/// ```
/// use ringfold_core::Repository;
///
/// let repo = Repository::new("ghcr.io", "acme/shop", "base");
/// assert_eq!(repo.as_str(), "ghcr.io/acme/shop/base");
/// assert_eq!(repo.reference("1.0.0"), "ghcr.io/acme/shop/base:1.0.0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repository(String);

impl Repository {
    pub fn new(registry: &str, project: &str, image: &str) -> Self {
        Self(format!("{registry}/{project}/{image}"))
    }

    /// Wraps a repository name taken verbatim from elsewhere, such as a
    /// kustomization `newName`.
    pub fn from_name(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `repository:tag`
    pub fn reference(&self, tag: &str) -> String {
        format!("{}:{tag}", self.0)
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// OCI labels persisted on a built artifact.
///
/// Keys are kept sorted so the label arguments handed to the builder are
/// stable between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The `org.opencontainers.image.version` label, if present.
    pub fn version(&self) -> crate::Result<Option<Version>> {
        self.get(LABEL_VERSION).map(str::parse::<Version>).transpose()
    }

    pub fn set_version(&mut self, version: &Version) {
        self.insert(LABEL_VERSION, version.to_string());
    }

    pub fn revision(&self) -> Option<&str> {
        self.get(LABEL_REVISION)
    }

    pub fn set_revision(&mut self, revision: &str) {
        self.insert(LABEL_REVISION, revision);
    }

    pub fn set_reference_name(&mut self, name: &str) {
        self.insert(LABEL_REF_NAME, name);
    }

    /// The version of `dependency` recorded when this artifact was built.
    pub fn dependency(&self, dependency: &str) -> Option<&str> {
        self.get(&format!("{DEPENDENCY_LABEL_PREFIX}{dependency}"))
    }

    pub fn set_dependency(&mut self, dependency: &str, version: &Version) {
        self.insert(
            format!("{DEPENDENCY_LABEL_PREFIX}{dependency}"),
            version.to_string(),
        );
    }
}

impl FromIterator<(String, String)> for LabelSet {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<(String, String)> for LabelSet {
    fn extend<T: IntoIterator<Item = (String, String)>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}
