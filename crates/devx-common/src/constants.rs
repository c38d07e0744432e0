//! Workspace-wide constants: file names, directory layout, and the
//! fixed names stamped into rendered documents.

use std::path::{Path, PathBuf};

/// Manifest file name looked up in the project root.
pub const MANIFEST_FILE: &str = "devx.yaml";

/// Per-project working directory holding generated artifacts.
pub const DEVX_DIR: &str = ".devx";

/// Rendered compose document inside [`DEVX_DIR`].
pub const COMPOSE_FILE: &str = "compose.yaml";

/// Persisted runtime-state record inside [`DEVX_DIR`].
pub const STATE_FILE: &str = "state.json";

/// Image lockfile in the project root.
pub const LOCK_FILE: &str = "devx.lock";

/// The single network every rendered service joins.
pub const NETWORK_NAME: &str = "devx_default";

/// Label key carrying the project name.
pub const LABEL_PROJECT: &str = "devx.project";

/// Label key carrying the profile name.
pub const LABEL_PROFILE: &str = "devx.profile";

/// Label key carrying the service name.
pub const LABEL_SERVICE: &str = "devx.service";

/// Name prefix shared by all injected telemetry services.
pub const TELEMETRY_NAME: &str = "devx-telemetry";

/// The only manifest schema version this build understands.
pub const MANIFEST_VERSION: u32 = 1;

/// Returns the path of the rendered compose document for a project root.
#[must_use]
pub fn compose_path(project_root: &Path) -> PathBuf {
    project_root.join(DEVX_DIR).join(COMPOSE_FILE)
}

/// Returns the path of the runtime-state record for a project root.
#[must_use]
pub fn state_path(project_root: &Path) -> PathBuf {
    project_root.join(DEVX_DIR).join(STATE_FILE)
}

/// Returns the path of the image lockfile for a project root.
#[must_use]
pub fn lock_path(project_root: &Path) -> PathBuf {
    project_root.join(LOCK_FILE)
}

/// Returns the path of the manifest for a project root.
#[must_use]
pub fn manifest_path(project_root: &Path) -> PathBuf {
    project_root.join(MANIFEST_FILE)
}
