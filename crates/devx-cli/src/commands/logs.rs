//! `devx logs` — stream or snapshot service logs.

use std::io::{Read, Write};

use clap::Args;

use devx_runtime::{LogsOptions, default_candidates, select_runtime};

use crate::project::{Project, require_local_runtime};

/// Arguments for `devx logs`.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Restrict to one service; omit for all services.
    pub service: Option<String>,

    /// Profile to read logs for; defaults to the last profile brought
    /// up, then to the manifest's default profile.
    #[arg(long)]
    pub profile: Option<String>,

    /// Follow the log stream instead of snapshotting.
    #[arg(long, short = 'f')]
    pub follow: bool,

    /// Only logs since this duration or timestamp (runtime syntax,
    /// e.g. "10m").
    #[arg(long, default_value = "")]
    pub since: String,
}

/// Copies the runtime's log stream to stdout until it ends or the
/// process is interrupted. Dropping the stream on exit kills the
/// underlying runtime subprocess.
///
/// # Errors
///
/// Fails on validation, rendering, or runtime errors.
pub fn execute(args: &LogsArgs) -> anyhow::Result<()> {
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
    let mut stream = runtime.logs(
        &compose_path,
        &project.manifest.project.name,
        &LogsOptions {
            service: args.service.clone().unwrap_or_default(),
            follow: args.follow,
            since: args.since.clone(),
        },
    )?;

    let mut stdout = std::io::stdout().lock();
    let mut buf = [0u8; 8192];
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        stdout.write_all(&buf[..n])?;
    }
    Ok(())
}
