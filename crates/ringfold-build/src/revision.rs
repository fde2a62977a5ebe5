use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ringfold_core::{Image, Version};
use sha2::{Digest, Sha256};

const HASH_ALGO: &str = "sha256";

/// Content digest of an image's inputs, `<algo>:<base64>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionHash(String);

impl RevisionHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares against a stored `org.opencontainers.image.revision` label.
    pub fn matches(&self, stored: Option<&str>) -> bool {
        stored == Some(self.0.as_str())
    }
}

impl fmt::Display for RevisionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes revision hashes with source paths resolved against a working
/// directory.
pub struct RevisionHasher {
    root: PathBuf,
}

impl RevisionHasher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Hashes the image's dependency versions, descriptor and sources.
    ///
    /// `resolved` must hold a version for every declared dependency.
    pub fn hash(
        &self,
        image: &Image,
        resolved: &HashMap<String, Version>,
    ) -> Result<RevisionHash, RevisionError> {
        let mut hasher = Sha256::new();

        for dependency in &image.dependencies {
            let version =
                resolved
                    .get(dependency)
                    .ok_or_else(|| RevisionError::UnresolvedDependency {
                        image: image.name.clone(),
                        dependency: dependency.clone(),
                    })?;
            hasher.update(format!("{dependency}:{version}").as_bytes());
        }

        hash_file(&mut hasher, &self.root.join(&image.descriptor_path))?;

        for source in &image.sources {
            let path = self.root.join(source);
            if !path.exists() {
                return Err(RevisionError::MissingSource {
                    image: image.name.clone(),
                    path,
                });
            }
            hash_tree(&mut hasher, &path)?;
        }

        let digest = hasher.finalize();
        let hash = RevisionHash(format!("{HASH_ALGO}:{}", STANDARD.encode(digest)));
        tracing::debug!(image = %image.name, %hash, "computed revision hash");
        Ok(hash)
    }
}

/// Depth first: the files of a directory in sorted order, then each
/// subdirectory in sorted order.
///
/// Only `path` itself is resolved through symlinks. A symlink inside the tree
/// is never followed; it contributes its target path instead.
fn hash_tree(hasher: &mut Sha256, path: &Path) -> Result<(), RevisionError> {
    let metadata = std::fs::metadata(path).map_err(|e| read_error(path, e))?;
    if !metadata.is_dir() {
        return hash_file(hasher, path);
    }

    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(path).map_err(|e| read_error(path, e))? {
        let entry = entry.map_err(|e| read_error(path, e))?;
        let entry_path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| read_error(&entry_path, e))?;
        if file_type.is_dir() {
            dirs.push(entry_path);
        } else {
            files.push((entry_path, file_type.is_symlink()));
        }
    }
    files.sort();
    dirs.sort();

    for (file, is_link) in &files {
        if *is_link {
            hash_link(hasher, file)?;
        } else {
            hash_file(hasher, file)?;
        }
    }
    for dir in &dirs {
        hash_tree(hasher, dir)?;
    }
    Ok(())
}

fn hash_link(hasher: &mut Sha256, path: &Path) -> Result<(), RevisionError> {
    let target = std::fs::read_link(path).map_err(|e| read_error(path, e))?;
    hasher.update(target.to_string_lossy().as_bytes());
    Ok(())
}

fn hash_file(hasher: &mut Sha256, path: &Path) -> Result<(), RevisionError> {
    let mut file = File::open(path).map_err(|e| read_error(path, e))?;
    std::io::copy(&mut file, hasher).map_err(|e| read_error(path, e))?;
    Ok(())
}

fn read_error(path: &Path, source: std::io::Error) -> RevisionError {
    RevisionError::Read {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RevisionError {
    #[error("image '{image}' depends on '{dependency}' which has no resolved version")]
    UnresolvedDependency { image: String, dependency: String },
    #[error("source {path} of image '{image}' does not exist")]
    MissingSource { image: String, path: PathBuf },
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}
