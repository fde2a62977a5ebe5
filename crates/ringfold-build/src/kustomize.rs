//! Rewrites image tags in kustomization files.
//!
//! Only `images[]` entries that already carry a `newTag` are managed; the
//! rest of the document is preserved as parsed.

use std::path::{Path, PathBuf};

use serde_yaml::Value;

pub const KUSTOMIZATION_FILE_NAME: &str = "kustomization.yaml";

/// An `images[]` entry with a `newTag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedImage {
    /// Position in the `images` sequence
    pub index: usize,
    /// `newName`, falling back to `name`
    pub repository: String,
    pub tag: String,
}

#[derive(Debug, Clone)]
pub struct Kustomization {
    path: PathBuf,
    document: Value,
}

impl Kustomization {
    /// `<etc_dir>/*/kustomization.yaml`, then `<etc_dir>/*/*/kustomization.yaml`.
    pub fn discover(etc_dir: &Path) -> Result<Vec<PathBuf>, KustomizeError> {
        let first_level = subdirectories(etc_dir)?;
        let mut found: Vec<PathBuf> = first_level
            .iter()
            .map(|dir| dir.join(KUSTOMIZATION_FILE_NAME))
            .filter(|path| path.is_file())
            .collect();

        for dir in &first_level {
            found.extend(
                subdirectories(dir)?
                    .into_iter()
                    .map(|sub| sub.join(KUSTOMIZATION_FILE_NAME))
                    .filter(|path| path.is_file()),
            );
        }

        Ok(found)
    }

    pub fn load(path: &Path) -> Result<Self, KustomizeError> {
        let content = std::fs::read_to_string(path).map_err(|e| KustomizeError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(path, &content)
    }

    pub fn parse(path: &Path, content: &str) -> Result<Self, KustomizeError> {
        let document = serde_yaml::from_str(content).map_err(|e| KustomizeError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            document,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries whose tag this tool manages.
    pub fn managed_images(&self) -> Vec<ManagedImage> {
        let Some(images) = self.document.get("images").and_then(Value::as_sequence) else {
            return Vec::new();
        };

        images
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let tag = scalar(entry.get("newTag")?)?;
                let repository = entry
                    .get("newName")
                    .or_else(|| entry.get("name"))
                    .and_then(Value::as_str)?;
                Some(ManagedImage {
                    index,
                    repository: repository.to_owned(),
                    tag,
                })
            })
            .collect()
    }

    /// Sets `newTag` of the entry at `index`. Returns `false` when the
    /// entry does not exist or is not a mapping.
    pub fn set_tag(&mut self, index: usize, tag: &str) -> bool {
        let entry = self
            .document
            .get_mut("images")
            .and_then(Value::as_sequence_mut)
            .and_then(|images| images.get_mut(index))
            .and_then(Value::as_mapping_mut);

        match entry {
            Some(mapping) => {
                mapping.insert(Value::from("newTag"), Value::from(tag));
                true
            }
            None => false,
        }
    }

    pub fn render(&self) -> Result<String, KustomizeError> {
        serde_yaml::to_string(&self.document).map_err(|e| KustomizeError::Render {
            path: self.path.clone(),
            source: e,
        })
    }

    pub fn save(&self) -> Result<(), KustomizeError> {
        let content = self.render()?;
        std::fs::write(&self.path, content).map_err(|e| KustomizeError::Write {
            path: self.path.clone(),
            source: e,
        })
    }
}

/// `newTag: 1.2` parses as a number; tags are compared as text.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>, KustomizeError> {
    let entries = std::fs::read_dir(dir).map_err(|e| KustomizeError::Read {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| KustomizeError::Read {
                path: dir.to_path_buf(),
                source: e,
            })?
            .path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

#[derive(Debug, thiserror::Error)]
pub enum KustomizeError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse kustomization {path}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("failed to render kustomization {path}")]
    Render {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("failed to write kustomization {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
