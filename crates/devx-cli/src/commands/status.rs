//! `devx status` — per-service status table.

use clap::Args;

use devx_runtime::{default_candidates, select_runtime};

use crate::output::print_table;
use crate::project::{Project, require_local_runtime};

/// Arguments for `devx status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Profile to inspect; defaults to the last profile brought up,
    /// then to the manifest's default profile.
    #[arg(long)]
    pub profile: Option<String>,
}

/// Prints one row per service, sorted by name.
///
/// # Errors
///
/// Fails on validation, rendering, or runtime errors.
pub fn execute(args: &StatusArgs) -> anyhow::Result<()> {
    let project = Project::load()?;
    let state = project.state();
    let profile_flag = args
        .profile
        .clone()
        .or_else(|| state.as_ref().map(|s| s.profile.clone()));
    let (profile_name, profile) = project.resolve_profile(profile_flag.as_deref())?;
    require_local_runtime(&profile_name, profile)?;

    let telemetry = state.as_ref().is_some_and(|s| s.telemetry);
    let compose_path = project.write_compose(&profile_name, profile, telemetry)?;

    let runtime = select_runtime(default_candidates())?;
    let mut statuses = runtime.status(&compose_path, &project.manifest.project.name)?;
    statuses.sort_by(|a, b| a.name.cmp(&b.name));

    let rows: Vec<Vec<String>> = statuses
        .into_iter()
        .map(|st| vec![st.name, st.state, st.health, st.ports])
        .collect();
    print_table(
        &mut std::io::stdout(),
        &["Service", "State", "Health", "Ports"],
        &rows,
    )?;
    Ok(())
}
