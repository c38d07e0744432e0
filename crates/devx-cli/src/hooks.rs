//! Lifecycle hook execution.
//!
//! `exec` hooks run inside an already-running service through the
//! container runtime; `run` hooks run on the host through `sh -c`. Hooks
//! execute in declaration order and the first failure aborts the
//! sequence, naming the hook that failed.

use std::path::Path;

use anyhow::Context;

use devx_manifest::Hook;
use devx_runtime::Runtime;

/// Runs a hook list in order.
///
/// # Errors
///
/// Fails when a hook cannot be started or exits non-zero.
pub fn run_hooks(
    runtime: &dyn Runtime,
    compose_path: &Path,
    project: &str,
    hooks: &[Hook],
) -> anyhow::Result<()> {
    for hook in hooks {
        if !hook.exec.is_empty() {
            run_exec_hook(runtime, compose_path, project, hook)?;
        } else if !hook.run.is_empty() {
            run_host_hook(hook)?;
        }
    }
    Ok(())
}

fn run_exec_hook(
    runtime: &dyn Runtime,
    compose_path: &Path,
    project: &str,
    hook: &Hook,
) -> anyhow::Result<()> {
    tracing::info!(service = %hook.service, command = %hook.exec, "running exec hook");
    let cmd: Vec<String> = hook.exec.split_whitespace().map(str::to_owned).collect();
    let code = runtime
        .exec(compose_path, project, &hook.service, &cmd)
        .with_context(|| format!("hook '{}' in service '{}'", hook.exec, hook.service))?;
    if code != 0 {
        anyhow::bail!(
            "hook '{}' in service '{}' exited with code {code}",
            hook.exec,
            hook.service
        );
    }
    Ok(())
}

fn run_host_hook(hook: &Hook) -> anyhow::Result<()> {
    tracing::info!(command = %hook.run, "running host hook");
    let status = std::process::Command::new("sh")
        .arg("-c")
        .arg(&hook.run)
        .status()
        .with_context(|| format!("hook '{}'", hook.run))?;
    if !status.success() {
        anyhow::bail!(
            "hook '{}' exited with code {}",
            hook.run,
            status.code().unwrap_or(1)
        );
    }
    Ok(())
}
