//! Descriptor parsing, image catalog, revision hashing and kustomization
//! updates for ringfold.
//!
//! # Catalog discovery
//!
//! ```text
//! etc/
//!   base.containerfile      FROM docker.io/library/alpine
//!   app.containerfile       FROM ghcr.io/acme/shop/base:$RING
//!                           COPY src assets /app/
//!   deploy.containerfile    # ROOT IMAGE
//!   prod/kustomization.yaml images[].newTag rewritten by `update`
//! ```
//!
//! 1. [`DescriptorParser`] turns every `etc/*.containerfile` into an [`Image`](ringfold_core::Image)
//! 2. [`ImageCatalog`] validates names and orders images dependency-first,
//!    root image last
//! 3. [`RevisionHasher`] digests dependency versions, descriptor and sources
//!    for change detection
//!
//! # Revision hash
//!
//! `sha256:<base64>` over, in order: `name:version` of each declared
//! dependency, the descriptor bytes, then every file under each `COPY`
//! source (files of a directory in sorted order before its subdirectories).

pub mod catalog;
pub mod descriptor;
pub mod kustomize;
pub mod revision;

pub use catalog::{CatalogError, ImageCatalog};
pub use descriptor::{DescriptorError, DescriptorParser};
pub use kustomize::{KustomizeError, Kustomization};
pub use revision::{RevisionError, RevisionHash, RevisionHasher};
