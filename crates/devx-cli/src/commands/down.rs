//! `devx down` — run teardown hooks and stop the environment.

use clap::Args;

use crate::hooks::run_hooks;
use crate::project::{Project, require_local_runtime};
use devx_runtime::{default_candidates, select_runtime};

/// Arguments for `devx down`.
#[derive(Args, Debug)]
pub struct DownArgs {
    /// Profile to tear down; defaults to the last profile brought up,
    /// then to the manifest's default profile.
    #[arg(long)]
    pub profile: Option<String>,

    /// Also remove named volumes.
    #[arg(long)]
    pub volumes: bool,
}

/// Tears a profile down.
///
/// Re-renders the compose document when `.devx/compose.yaml` is absent
/// (e.g. after a clean checkout) so teardown always has a document that
/// matches the manifest. Telemetry inclusion follows the last-run
/// record, not a flag, so `down` removes exactly what `up` started.
///
/// # Errors
///
/// Fails on validation, rendering, hook, or runtime errors.
pub fn execute(args: &DownArgs) -> anyhow::Result<()> {
    let project = Project::load()?;
    let state = project.state();
    let profile_flag = args
        .profile
        .clone()
        .or_else(|| state.as_ref().map(|s| s.profile.clone()));
    let (profile_name, profile) = project.resolve_profile(profile_flag.as_deref())?;
    require_local_runtime(&profile_name, profile)?;

    let telemetry = state.as_ref().is_some_and(|s| s.telemetry);
    let compose_path = project.compose_path();
    if !compose_path.exists() {
        project.write_compose(&profile_name, profile, telemetry)?;
    }

    let runtime = select_runtime(default_candidates())?;

    if !profile.hooks.before_down.is_empty() {
        println!("Running beforeDown hooks...");
        run_hooks(
            runtime.as_ref(),
            &compose_path,
            &project.manifest.project.name,
            &profile.hooks.before_down,
        )?;
    }

    runtime.down(&compose_path, &project.manifest.project.name, args.volumes)?;
    println!("Profile '{profile_name}' is down");
    Ok(())
}
