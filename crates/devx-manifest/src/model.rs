//! Typed model of the `devx.yaml` manifest.
//!
//! All maps are `BTreeMap` so that every consumer iterates in
//! lexicographic key order — rendered artifacts are diffed and hashed
//! downstream, which makes iteration order part of the contract.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or resolving a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("cannot read manifest at {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The manifest is not valid YAML for the expected schema.
    #[error("failed to parse manifest: {source}")]
    Parse {
        /// Underlying YAML error.
        #[from]
        source: serde_yaml::Error,
    },

    /// A profile name did not resolve.
    #[error("profile '{name}' not found")]
    UnknownProfile {
        /// The requested profile name.
        name: String,
    },
}

/// Root manifest document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Schema version; the only supported value is 1.
    #[serde(default)]
    pub version: u32,
    /// Project identity.
    #[serde(default)]
    pub project: Project,
    /// Registry rewrite configuration.
    #[serde(default)]
    pub registry: Registry,
    /// Named profiles, keyed uniquely by name.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

/// Project identity block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project name, used as the compose project name.
    #[serde(default)]
    pub name: String,
    /// Profile used when no `--profile` flag is given.
    #[serde(default)]
    pub default_profile: String,
}

/// Registry rewrite configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    /// Registry prefix every image reference is rewritten under.
    #[serde(default)]
    pub prefix: String,
}

/// A named, self-contained deployment configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    /// User services, keyed by name.
    #[serde(default)]
    pub services: BTreeMap<String, Service>,
    /// Managed dependencies, keyed by name.
    #[serde(default)]
    pub deps: BTreeMap<String, Dep>,
    /// Runtime target; empty means the local compose runtime.
    #[serde(default)]
    pub runtime: String,
    /// Lifecycle hooks.
    #[serde(default)]
    pub hooks: Hooks,
}

/// Lifecycle hooks around bring-up and tear-down.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hooks {
    /// Hooks run after a successful bring-up.
    #[serde(default)]
    pub after_up: Vec<Hook>,
    /// Hooks run before tear-down.
    #[serde(default)]
    pub before_down: Vec<Hook>,
}

/// A single lifecycle step. Exactly one of `exec` or `run` must be set.
///
/// - `exec` runs a command inside an already-running container; `service`
///   is required.
/// - `run` runs a host-side shell command; `service` must not be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hook {
    /// Command to run inside `service` (e.g. "migrate up").
    #[serde(default)]
    pub exec: String,
    /// Target service for an `exec` hook.
    #[serde(default)]
    pub service: String,
    /// Host-side shell command (e.g. "./scripts/seed.sh").
    #[serde(default)]
    pub run: String,
}

/// A user-defined service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Image reference; mutually resolvable with `build`.
    #[serde(default)]
    pub image: String,
    /// Build context; takes precedence over `image` when set.
    #[serde(default)]
    pub build: Option<Build>,
    /// Port mappings in compose `host:container` form.
    #[serde(default)]
    pub ports: Vec<String>,
    /// Environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Command override.
    #[serde(default)]
    pub command: Vec<String>,
    /// Working directory inside the container.
    #[serde(default)]
    pub workdir: String,
    /// Mount specifications.
    #[serde(default)]
    pub mount: Vec<String>,
    /// Names of services or deps in the same profile to start first.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Optional HTTP health probe.
    #[serde(default)]
    pub health: Option<Health>,
}

/// Build context for a service built from source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Build {
    /// Build context directory.
    #[serde(default)]
    pub context: String,
    /// Dockerfile path relative to the context.
    #[serde(default)]
    pub dockerfile: String,
}

/// HTTP health probe declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    /// URL polled for convergence and baked into the compose healthcheck.
    #[serde(default)]
    pub http_get: String,
    /// Probe interval (compose duration string).
    #[serde(default)]
    pub interval: String,
    /// Retry budget before the runtime marks the service unhealthy.
    #[serde(default)]
    pub retries: u32,
}

/// A managed dependency rendered from a kind + version template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dep {
    /// Dependency kind; must be in the [`crate::DepCatalog`].
    #[serde(default)]
    pub kind: String,
    /// Version tag appended to the catalog's default image.
    #[serde(default)]
    pub version: String,
    /// Environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Port mappings.
    #[serde(default)]
    pub ports: Vec<String>,
    /// Single volume spec in `name:container-path` form.
    #[serde(default)]
    pub volume: String,
}

impl Manifest {
    /// Loads and parses a manifest from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let data = std::fs::read(path).map_err(|e| ManifestError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&data)
    }

    /// Parses a manifest from raw YAML bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid manifest document.
    pub fn parse(data: &[u8]) -> Result<Self, ManifestError> {
        let manifest: Self = serde_yaml::from_slice(data)?;
        tracing::debug!(
            project = %manifest.project.name,
            profiles = manifest.profiles.len(),
            "parsed manifest"
        );
        Ok(manifest)
    }

    /// Looks up a profile by name.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::UnknownProfile`] when the name does not
    /// resolve.
    pub fn profile(&self, name: &str) -> Result<&Profile, ManifestError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ManifestError::UnknownProfile { name: name.into() })
    }
}

impl Profile {
    /// Returns true when `name` is declared as a service or a dep in this
    /// profile.
    #[must_use]
    pub fn declares(&self, name: &str) -> bool {
        self.services.contains_key(name) || self.deps.contains_key(name)
    }

    /// Runtime target with the default applied.
    #[must_use]
    pub fn runtime_or_default(&self) -> &str {
        if self.runtime.is_empty() {
            "compose"
        } else {
            &self.runtime
        }
    }
}
