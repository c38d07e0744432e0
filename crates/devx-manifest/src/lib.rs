//! # devx-manifest
//!
//! The `devx.yaml` manifest: typed model, loading, and validation.
//!
//! Handles:
//! - **Model**: serde types for the manifest document (profiles, services,
//!   managed deps, lifecycle hooks).
//! - **Catalog**: the injectable table of supported dep kinds and their
//!   default images.
//! - **Validate**: structural and semantic checks with accumulated,
//!   deterministically ordered diagnostics.

pub mod catalog;
pub mod model;
pub mod validate;

pub use catalog::DepCatalog;
pub use model::{Build, Dep, Health, Hook, Hooks, Manifest, Profile, Service};
pub use validate::{ValidationError, validate, validate_profile};
