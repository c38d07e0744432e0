//! Project context shared by every command.
//!
//! Loads the manifest from the working directory, resolves the active
//! profile, and renders the compose document plus telemetry assets into
//! `.devx/`.

use std::path::{Path, PathBuf};

use anyhow::Context;

use devx_common::constants;
use devx_common::state::RunState;
use devx_compose::{Graph, RenderInput, RewriteOptions, render, telemetry_assets};
use devx_lock::Lockfile;
use devx_manifest::{DepCatalog, Manifest, Profile, validate, validate_profile};

/// A loaded and validated project rooted at the working directory.
#[derive(Debug)]
pub struct Project {
    /// Project root (the directory holding `devx.yaml`).
    pub root: PathBuf,
    /// The validated manifest.
    pub manifest: Manifest,
    /// Dep kind table.
    pub catalog: DepCatalog,
}

impl Project {
    /// Loads the project from the current working directory.
    ///
    /// # Errors
    ///
    /// Fails when the manifest is missing, unparsable, or structurally
    /// invalid.
    pub fn load() -> anyhow::Result<Self> {
        let root = std::env::current_dir().context("cannot determine working directory")?;
        Self::load_from(root)
    }

    /// Loads the project from an explicit root. Split out for tests.
    ///
    /// # Errors
    ///
    /// Fails when the manifest is missing, unparsable, or structurally
    /// invalid.
    pub fn load_from(root: PathBuf) -> anyhow::Result<Self> {
        let path = constants::manifest_path(&root);
        if !path.exists() {
            anyhow::bail!(
                "no {} found in {} (run 'devx init' to create one)",
                constants::MANIFEST_FILE,
                root.display()
            );
        }
        let manifest = Manifest::load(&path)?;
        validate(&manifest)?;
        Ok(Self {
            root,
            manifest,
            catalog: DepCatalog::default(),
        })
    }

    /// Resolves the active profile: the `--profile` flag when given,
    /// otherwise the manifest's default. The profile is validated before
    /// being returned.
    ///
    /// # Errors
    ///
    /// Fails when the name does not resolve or the profile is invalid.
    pub fn resolve_profile(&self, flag: Option<&str>) -> anyhow::Result<(String, &Profile)> {
        let name = flag.unwrap_or(&self.manifest.project.default_profile);
        validate_profile(&self.manifest, name, &self.catalog)?;
        let profile = self.manifest.profile(name)?;
        Ok((name.to_owned(), profile))
    }

    /// Rewrite options for this project: the manifest's registry prefix
    /// plus the lockfile when one exists. The lockfile is read-only here;
    /// only `devx lock update` writes it.
    ///
    /// # Errors
    ///
    /// Fails when a lockfile exists but cannot be read.
    pub fn rewrite_options(&self) -> anyhow::Result<RewriteOptions> {
        let lock_path = constants::lock_path(&self.root);
        let lockfile = if lock_path.exists() {
            Some(Lockfile::load(&lock_path)?)
        } else {
            None
        };
        Ok(RewriteOptions {
            registry_prefix: self.manifest.registry.prefix.clone(),
            lockfile,
        })
    }

    /// Path of the rendered compose document.
    #[must_use]
    pub fn compose_path(&self) -> PathBuf {
        constants::compose_path(&self.root)
    }

    /// Renders the profile and writes the compose document plus, when
    /// telemetry is enabled, the asset bundle. The dependency graph is
    /// checked first so structural manifest errors abort before anything
    /// touches the filesystem or an external process.
    ///
    /// # Errors
    ///
    /// Fails on graph errors, synthesis errors, or I/O errors.
    pub fn write_compose(
        &self,
        profile_name: &str,
        profile: &Profile,
        telemetry: bool,
    ) -> anyhow::Result<PathBuf> {
        let graph = Graph::build(profile)?;
        let order = graph.topo_sort()?;
        tracing::debug!(profile = profile_name, order = ?order, "dependency order");

        let rewrite = self.rewrite_options()?;
        let document = render(&RenderInput {
            manifest: &self.manifest,
            profile_name,
            profile,
            rewrite: &rewrite,
            catalog: &self.catalog,
            telemetry,
        })?;

        let path = self.compose_path();
        let devx_dir = self.root.join(constants::DEVX_DIR);
        std::fs::create_dir_all(&devx_dir)
            .with_context(|| format!("cannot create {}", devx_dir.display()))?;
        std::fs::write(&path, &document)
            .with_context(|| format!("cannot write {}", path.display()))?;

        for asset in telemetry_assets(telemetry) {
            let asset_path = devx_dir.join(asset.path);
            if let Some(parent) = asset_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("cannot create {}", parent.display()))?;
            }
            std::fs::write(&asset_path, &asset.content)
                .with_context(|| format!("cannot write {}", asset_path.display()))?;
        }

        Ok(path)
    }

    /// Reads the last-run record, if any.
    #[must_use]
    pub fn state(&self) -> Option<RunState> {
        RunState::load(&constants::state_path(&self.root))
            .ok()
            .flatten()
    }

    /// Whether the last successful bring-up had telemetry enabled.
    #[must_use]
    pub fn telemetry_from_state(&self) -> bool {
        self.state().is_some_and(|s| s.telemetry)
    }

    /// Persists the last-run record.
    ///
    /// # Errors
    ///
    /// Fails when the record cannot be written.
    pub fn save_state(&self, state: &RunState) -> anyhow::Result<()> {
        RunState::save(state, &constants::state_path(&self.root))?;
        Ok(())
    }
}

/// Rejects profiles that target the cluster runtime; lifecycle commands
/// only drive the local compose runtime.
///
/// # Errors
///
/// Fails with a pointer at the cluster renderer when the profile targets
/// `k8s`.
pub fn require_local_runtime(profile_name: &str, profile: &Profile) -> anyhow::Result<()> {
    if profile.runtime_or_default() == "k8s" {
        anyhow::bail!(
            "profile '{profile_name}' targets the k8s runtime, which this command does not drive; \
             use the cluster renderer instead"
        );
    }
    Ok(())
}

/// Appends an ignore rule for the artifact directory to `.gitignore`.
/// Best-effort: failures degrade to a no-op without aborting the parent
/// command.
pub fn ensure_gitignore(root: &Path) {
    let path = root.join(".gitignore");
    let rule = format!("{}/", constants::DEVX_DIR);
    let existing = std::fs::read_to_string(&path).unwrap_or_default();
    if existing.lines().any(|line| line.trim() == rule) {
        return;
    }
    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(&rule);
    content.push('\n');
    let _ = std::fs::write(&path, content);
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r"
version: 1
project:
  name: my-app
  defaultProfile: local
profiles:
  local:
    runtime: compose
    services:
      api:
        image: nginx:alpine
  cluster:
    runtime: k8s
    services:
      api:
        image: nginx:alpine
";

    fn project_in(dir: &Path) -> Project {
        std::fs::write(dir.join(constants::MANIFEST_FILE), MANIFEST).expect("write manifest");
        Project::load_from(dir.to_path_buf()).expect("load")
    }

    #[test]
    fn default_profile_resolves_without_flag() {
        let dir = tempfile::tempdir().expect("tempdir");
        let project = project_in(dir.path());
        let (name, _) = project.resolve_profile(None).expect("resolve");
        assert_eq!(name, "local");
    }

    #[test]
    fn explicit_profile_flag_wins() {
        let dir = tempfile::tempdir().expect("tempdir");
        let project = project_in(dir.path());
        let (name, _) = project.resolve_profile(Some("cluster")).expect("resolve");
        assert_eq!(name, "cluster");
    }

    #[test]
    fn unknown_profile_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let project = project_in(dir.path());
        assert!(project.resolve_profile(Some("missing")).is_err());
    }

    #[test]
    fn missing_manifest_mentions_init() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Project::load_from(dir.path().to_path_buf()).expect_err("should fail");
        assert!(format!("{err:#}").contains("devx init"));
    }

    #[test]
    fn write_compose_renders_into_devx_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let project = project_in(dir.path());
        let (name, profile) = project.resolve_profile(None).expect("resolve");
        let path = project
            .write_compose(&name, profile, false)
            .expect("write compose");
        assert!(path.ends_with(".devx/compose.yaml"));
        let document = std::fs::read_to_string(&path).expect("read");
        assert!(document.contains("nginx:alpine"));
    }

    #[test]
    fn telemetry_assets_written_when_enabled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let project = project_in(dir.path());
        let (name, profile) = project.resolve_profile(None).expect("resolve");
        let _ = project
            .write_compose(&name, profile, true)
            .expect("write compose");
        assert!(
            dir.path()
                .join(".devx/telemetry/prometheus.yml")
                .exists()
        );
        for dashboard in ["logs", "resources", "log-analytics", "health"] {
            assert!(
                dir.path()
                    .join(format!(
                        ".devx/telemetry/grafana/dashboards/{dashboard}.json"
                    ))
                    .exists(),
                "missing {dashboard} dashboard"
            );
        }
    }

    #[test]
    fn k8s_profile_is_rejected_for_local_lifecycle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let project = project_in(dir.path());
        let (name, profile) = project.resolve_profile(Some("cluster")).expect("resolve");
        assert!(require_local_runtime(&name, profile).is_err());
    }

    #[test]
    fn gitignore_rule_appended_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        ensure_gitignore(dir.path());
        ensure_gitignore(dir.path());
        let content = std::fs::read_to_string(dir.path().join(".gitignore")).expect("read");
        assert_eq!(content.matches(".devx/").count(), 1);
    }

    #[test]
    fn state_roundtrips_through_project() {
        let dir = tempfile::tempdir().expect("tempdir");
        let project = project_in(dir.path());
        assert!(project.state().is_none());
        assert!(!project.telemetry_from_state());

        let state = RunState {
            profile: "local".into(),
            runtime: "docker".into(),
            telemetry: true,
        };
        project.save_state(&state).expect("save");
        assert_eq!(project.state(), Some(state));
        assert!(project.telemetry_from_state());
    }
}
