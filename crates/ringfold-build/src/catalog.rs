use std::collections::HashSet;
use std::path::{Path, PathBuf};

use ringfold_core::{DependencySorter, Image};

use crate::descriptor::{DescriptorError, DescriptorParser};

/// The images of a project, in build order.
///
/// Dependencies come before their dependents and the root (or sort-last)
/// image, if any, comes last. Descriptors that fail to parse are skipped and
/// kept in [`rejected`](Self::rejected) so the rest of the catalog stays usable.
#[derive(Debug, Default)]
pub struct ImageCatalog {
    images: Vec<Image>,
    rejected: Vec<DescriptorError>,
}

impl ImageCatalog {
    /// Parses every `<etc_dir>/*.<extension>` descriptor and orders the result.
    pub fn discover(
        etc_dir: &Path,
        extension: &str,
        parser: &DescriptorParser,
    ) -> Result<Self, CatalogError> {
        let mut images = Vec::new();
        let mut rejected = Vec::new();

        for path in descriptor_files(etc_dir, extension)? {
            match parser.parse(&path) {
                Ok(image) => images.push(image),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping descriptor");
                    rejected.push(e);
                }
            }
        }

        let mut catalog = Self::from_images(images)?;
        catalog.rejected = rejected;
        Ok(catalog)
    }

    /// Orders already parsed images.
    ///
    /// Dependencies on images that are not part of the set are dropped with
    /// a warning.
    pub fn from_images(images: Vec<Image>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for image in &images {
            if !seen.insert(image.name.clone()) {
                return Err(CatalogError::DuplicateImage(image.name.clone()));
            }
        }

        let mut sorter = DependencySorter::new();
        for mut image in images {
            image.dependencies.retain(|dependency| {
                let known = seen.contains(dependency);
                if !known {
                    tracing::warn!(
                        image = %image.name,
                        %dependency,
                        "dropping dependency on unknown image"
                    );
                }
                known
            });

            if image.sorts_last() {
                sorter
                    .set_deferred(image.name.clone(), image)
                    .map_err(|e| CatalogError::Graph { source: e })?;
                continue;
            }

            for dependency in &image.dependencies {
                sorter.add_dependency(image.name.clone(), dependency.clone());
            }
            sorter.add_node(image.name.clone(), image);
        }

        let images = sorter
            .sort()
            .map_err(|e| CatalogError::Graph { source: e })?
            .into_iter()
            .map(|(_, image)| image)
            .collect();

        Ok(Self {
            images,
            rejected: Vec::new(),
        })
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Image> {
        self.images.iter().find(|image| image.name == name)
    }

    /// The image that sorts last, when one is declared.
    pub fn root(&self) -> Option<&Image> {
        self.images.last().filter(|image| image.sorts_last())
    }

    /// The named images in catalog order; all images when `names` is empty.
    pub fn select(&self, names: &[String]) -> Result<Vec<&Image>, CatalogError> {
        if let Some(unknown) = names.iter().find(|name| self.get(name).is_none()) {
            return Err(CatalogError::UnknownImage(unknown.clone()));
        }
        Ok(self
            .images
            .iter()
            .filter(|image| names.is_empty() || names.contains(&image.name))
            .collect())
    }

    /// Descriptors skipped during discovery.
    pub fn rejected(&self) -> &[DescriptorError] {
        &self.rejected
    }
}

/// Descriptor files in `etc_dir`, sorted by file name.
fn descriptor_files(etc_dir: &Path, extension: &str) -> Result<Vec<PathBuf>, CatalogError> {
    let entries = std::fs::read_dir(etc_dir).map_err(|e| CatalogError::ReadDir {
        path: etc_dir.to_path_buf(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CatalogError::ReadDir {
            path: etc_dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read descriptor directory {path}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("image '{0}' is declared more than once")]
    DuplicateImage(String),
    #[error("unknown image '{0}'")]
    UnknownImage(String),
    #[error("invalid image dependency graph")]
    Graph { source: ringfold_core::Error },
}
