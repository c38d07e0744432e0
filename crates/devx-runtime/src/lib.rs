//! # devx-runtime
//!
//! The runtime capability boundary. The core pipeline never starts or
//! stops containers itself — it talks to an external container runtime
//! through the [`Runtime`] trait and receives typed results back.
//!
//! Handles:
//! - **Docker**: the compose CLI driver (docker or podman binaries).
//! - **Select**: probing-based driver selection over an injectable,
//!   ordered candidate list.
//! - **Health**: the post-bring-up HTTP convergence loop.

pub mod docker;
pub mod health;
pub mod select;

use std::io::Read;
use std::process::Child;

use thiserror::Error;

pub use docker::ComposeCli;
pub use health::{Probe, WaitOptions, probes_from_profile, wait_healthy};
pub use select::{default_candidates, select_resolver, select_runtime};

/// Errors crossing the runtime boundary.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A runtime subprocess could not be spawned.
    #[error("failed to invoke '{command}': {source}")]
    Spawn {
        /// The command line that failed to start.
        command: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A runtime subprocess ran but exited non-zero. Driver output goes
    /// to the inherited stdio, so the message is deliberately terse.
    #[error("'{command}' failed{}", code.map(|c| format!(" with exit code {c}")).unwrap_or_default())]
    CommandFailed {
        /// The command line that failed.
        command: String,
        /// Exit code, when the process was not killed by a signal.
        code: Option<i32>,
    },

    /// No candidate runtime driver answered its availability probe.
    #[error("no container runtime detected (tried: {tried})")]
    NoRuntime {
        /// Comma-separated candidate names, in probe order.
        tried: String,
    },

    /// Status output matched neither the array nor the line-delimited
    /// format.
    #[error("cannot decode runtime status output: {detail}")]
    StatusDecode {
        /// What the decoder saw.
        detail: String,
    },

    /// The runtime reported no repo digest for an image.
    #[error("no digest found for {image}")]
    NoDigest {
        /// The image that failed to resolve.
        image: String,
    },

    /// A long-running wait was cancelled from outside.
    #[error("interrupted")]
    Cancelled,

    /// Health probes did not all converge before the deadline.
    #[error("services not healthy after {deadline_secs}s: {}", pending.iter().map(|p| format!("{} ({})", p.service, p.url)).collect::<Vec<_>>().join(", "))]
    ConvergenceTimeout {
        /// Deadline that elapsed, in seconds.
        deadline_secs: u64,
        /// Every probe still pending, by service name and URL.
        pending: Vec<health::Probe>,
    },
}

/// Convenience alias for fallible runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Options for bring-up.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpOptions {
    /// Rebuild images before starting.
    pub build: bool,
    /// Always pull images before starting.
    pub pull: bool,
}

/// Options for log retrieval.
#[derive(Debug, Clone, Default)]
pub struct LogsOptions {
    /// Restrict to one service; empty means all.
    pub service: String,
    /// Follow instead of snapshotting.
    pub follow: bool,
    /// Only logs since this duration/timestamp (runtime syntax).
    pub since: String,
}

/// One row of runtime status output.
#[derive(Debug, Clone, Default)]
pub struct ServiceStatus {
    /// Service name.
    pub name: String,
    /// Lifecycle state (e.g. "running").
    pub state: String,
    /// Health state, when a healthcheck is declared.
    pub health: String,
    /// Human-readable port summary.
    pub ports: String,
    /// Actual host-port bindings as reported by the runtime.
    pub publishers: Vec<Publisher>,
}

/// An actual host-port binding reported by the container runtime.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Publisher {
    /// Bind address.
    #[serde(rename = "URL")]
    pub url: String,
    /// Container-side port.
    pub target_port: u16,
    /// Host-side port; 0 when unpublished.
    pub published_port: u16,
    /// Protocol ("tcp"/"udp").
    pub protocol: String,
}

/// A cancellable log stream backed by a runtime subprocess.
///
/// Reading yields the subprocess output; dropping the stream kills the
/// subprocess so no orphan is left behind.
#[derive(Debug)]
pub struct LogStream {
    child: Child,
    stdout: std::process::ChildStdout,
}

impl LogStream {
    pub(crate) fn new(child: Child, stdout: std::process::ChildStdout) -> Self {
        Self { child, stdout }
    }
}

impl Read for LogStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.stdout.read(buf)
    }
}

impl Drop for LogStream {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Capability set every runtime driver implements.
///
/// The core depends only on this interface; which driver backs it is
/// external policy (see [`select_runtime`]).
pub trait Runtime: std::fmt::Debug {
    /// Stable driver name, recorded in the run state.
    fn name(&self) -> &str;

    /// Availability probe; must not error, only answer.
    fn detect(&self) -> bool;

    /// Brings the environment up, detached.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver invocation fails or exits non-zero.
    fn up(&self, compose_path: &std::path::Path, project: &str, opts: &UpOptions) -> Result<()>;

    /// Tears the environment down.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver invocation fails or exits non-zero.
    fn down(&self, compose_path: &std::path::Path, project: &str, remove_volumes: bool)
    -> Result<()>;

    /// Opens a log stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver subprocess cannot be spawned.
    fn logs(
        &self,
        compose_path: &std::path::Path,
        project: &str,
        opts: &LogsOptions,
    ) -> Result<LogStream>;

    /// Runs a command inside a running service and returns its exit code.
    ///
    /// A non-zero exit code is a successful invocation — it is reported
    /// as data, never conflated with a driver failure.
    ///
    /// # Errors
    ///
    /// Returns an error only when the driver itself cannot run.
    fn exec(
        &self,
        compose_path: &std::path::Path,
        project: &str,
        service: &str,
        cmd: &[String],
    ) -> Result<i32>;

    /// Lists per-service status rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails or its output cannot be
    /// decoded.
    fn status(&self, compose_path: &std::path::Path, project: &str) -> Result<Vec<ServiceStatus>>;
}

/// Optional extended capability: image digest resolution, used only by
/// lock updates.
pub trait DigestResolver {
    /// Resolves an image reference to its `sha256:…` repo digest.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be inspected or carries no
    /// digest.
    fn resolve_image_digest(&self, image: &str) -> Result<String>;
}
