//! `devx up` — render, bring up, run hooks, wait for health.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Args;

use devx_common::state::RunState;
use devx_runtime::{UpOptions, WaitOptions, default_candidates, probes_from_profile, select_runtime, wait_healthy};

use crate::hooks::run_hooks;
use crate::project::{Project, require_local_runtime};

/// Arguments for `devx up`.
#[derive(Args, Debug)]
pub struct UpArgs {
    /// Profile to bring up; defaults to the manifest's default profile.
    #[arg(long)]
    pub profile: Option<String>,

    /// Rebuild images before starting.
    #[arg(long)]
    pub build: bool,

    /// Always pull images before starting.
    #[arg(long)]
    pub pull: bool,

    /// Bring the profile up without the telemetry stack.
    #[arg(long)]
    pub no_telemetry: bool,
}

/// Brings a profile up end to end.
///
/// The pipeline front-loads everything that can fail without side
/// effects: manifest validation, profile resolution, and the dependency
/// graph check all run before any artifact is written or any external
/// process started.
///
/// # Errors
///
/// Fails on validation, rendering, runtime, hook, or convergence errors.
pub fn execute(args: &UpArgs) -> anyhow::Result<()> {
    let project = Project::load()?;
    let (profile_name, profile) = project.resolve_profile(args.profile.as_deref())?;
    require_local_runtime(&profile_name, profile)?;

    let telemetry = !args.no_telemetry;
    let compose_path = project.write_compose(&profile_name, profile, telemetry)?;

    let runtime = select_runtime(default_candidates())?;
    tracing::info!(
        runtime = runtime.name(),
        profile = %profile_name,
        "bringing profile up"
    );

    runtime.up(
        &compose_path,
        &project.manifest.project.name,
        &UpOptions {
            build: args.build,
            pull: args.pull,
        },
    )?;

    if !profile.hooks.after_up.is_empty() {
        println!("Running afterUp hooks...");
        run_hooks(
            runtime.as_ref(),
            &compose_path,
            &project.manifest.project.name,
            &profile.hooks.after_up,
        )?;
    }

    let probes = probes_from_profile(profile);
    if !probes.is_empty() {
        println!("Waiting for {} health probe(s)...", probes.len());
        let cancel = Arc::new(AtomicBool::new(false));
        let handler_flag = Arc::clone(&cancel);
        ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst))?;
        wait_healthy(&probes, &WaitOptions::default(), &cancel)?;
    }

    project.save_state(&RunState {
        profile: profile_name.clone(),
        runtime: runtime.name().to_owned(),
        telemetry,
    })?;

    println!("Profile '{profile_name}' is up");
    if telemetry {
        println!("Telemetry: Grafana at http://localhost:3000");
    }
    Ok(())
}
