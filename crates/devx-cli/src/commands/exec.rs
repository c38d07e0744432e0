//! `devx exec` — run a command inside a running service.

use clap::Args;

use devx_runtime::{default_candidates, select_runtime};

use crate::project::{Project, require_local_runtime};

/// Arguments for `devx exec`.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Service to run the command in.
    pub service: String,

    /// Command and arguments, after `--`.
    #[arg(last = true, required = true)]
    pub command: Vec<String>,

    /// Profile the service belongs to; defaults to the last profile
    /// brought up, then to the manifest's default profile.
    #[arg(long)]
    pub profile: Option<String>,
}

/// Executes the command and mirrors its exit code.
///
/// A non-zero exit from the command inside the container is data, not a
/// driver failure: it is propagated as this process's own exit code with
/// no error message of ours attached.
///
/// # Errors
///
/// Fails on validation, rendering, or driver invocation errors.
pub fn execute(args: &ExecArgs) -> anyhow::Result<()> {
    let project = Project::load()?;
    let state = project.state();
    let profile_flag = args
        .profile
        .clone()
        .or_else(|| state.as_ref().map(|s| s.profile.clone()));
    let (profile_name, profile) = project.resolve_profile(profile_flag.as_deref())?;
    require_local_runtime(&profile_name, profile)?;

    if !profile.declares(&args.service) {
        anyhow::bail!(
            "service '{}' is not declared in profile '{profile_name}'",
            args.service
        );
    }

    let telemetry = state.as_ref().is_some_and(|s| s.telemetry);
    let compose_path = project.write_compose(&profile_name, profile, telemetry)?;

    let runtime = select_runtime(default_candidates())?;
    let code = runtime.exec(
        &compose_path,
        &project.manifest.project.name,
        &args.service,
        &args.command,
    )?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
