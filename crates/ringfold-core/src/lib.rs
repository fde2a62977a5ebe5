//! Core types and configuration for ringfold.
//!
//! This crate defines the `ringfold.toml` schema ([`RingfoldConfig`]), the
//! image model ([`Image`], [`Repository`], [`LabelSet`]), the version bump
//! policy ([`version::bump`]), the ring ledger ([`RingLedger`]), the
//! dependency sorter ([`DependencySorter`]) and shared error types.

pub mod config;
pub mod error;
pub mod graph;
pub mod image;
pub mod ring;
pub mod version;

pub use config::{ProjectConfig, RingfoldConfig, WatchConfig};
pub use error::{Error, Result};
pub use graph::DependencySorter;
pub use image::{Image, LabelSet, Repository};
pub use ring::{RingLedger, Shift};
pub use version::Version;
