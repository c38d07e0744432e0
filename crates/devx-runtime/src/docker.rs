//! Compose CLI driver.
//!
//! Drives `docker compose` (or the podman equivalent) as a subprocess.
//! The same driver serves both binaries since podman ships a
//! docker-compatible CLI; only the binary name differs.

use std::path::Path;
use std::process::{Command, Stdio};

use crate::{
    DigestResolver, LogStream, LogsOptions, Publisher, Result, Runtime, RuntimeError,
    ServiceStatus, UpOptions,
};

/// Driver shelling out to a docker-compatible compose CLI.
#[derive(Debug, Clone)]
pub struct ComposeCli {
    name: &'static str,
    binary: &'static str,
}

impl ComposeCli {
    /// The docker driver.
    #[must_use]
    pub const fn docker() -> Self {
        Self {
            name: "docker",
            binary: "docker",
        }
    }

    /// The podman driver.
    #[must_use]
    pub const fn podman() -> Self {
        Self {
            name: "podman",
            binary: "podman",
        }
    }

    fn compose_args(compose_path: &Path, project: &str) -> Vec<String> {
        vec![
            "compose".to_owned(),
            "-f".to_owned(),
            compose_path.display().to_string(),
            "-p".to_owned(),
            project.to_owned(),
        ]
    }

    /// Runs the binary with inherited stdio, mapping a non-zero exit to
    /// [`RuntimeError::CommandFailed`].
    fn run(&self, args: &[String]) -> Result<()> {
        let command = format!("{} {}", self.binary, args.join(" "));
        tracing::debug!(%command, "invoking runtime");
        let status = Command::new(self.binary)
            .args(args)
            .status()
            .map_err(|e| RuntimeError::Spawn {
                command: command.clone(),
                source: e,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(RuntimeError::CommandFailed {
                command,
                code: status.code(),
            })
        }
    }

    /// Runs the binary capturing stdout; stderr is suppressed.
    fn capture(&self, args: &[&str]) -> Result<Vec<u8>> {
        let command = format!("{} {}", self.binary, args.join(" "));
        let output = Command::new(self.binary)
            .args(args)
            .stderr(Stdio::null())
            .output()
            .map_err(|e| RuntimeError::Spawn {
                command: command.clone(),
                source: e,
            })?;
        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(RuntimeError::CommandFailed {
                command,
                code: output.status.code(),
            })
        }
    }

    fn inspect_repo_digest(&self, image: &str) -> Result<String> {
        let out = self.capture(&[
            "image",
            "inspect",
            "--format",
            "{{join .RepoDigests \"\\n\"}}",
            image,
        ])?;
        for line in String::from_utf8_lossy(&out).lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some((_, digest)) = line.split_once('@') {
                return Ok(digest.to_owned());
            }
        }
        Err(RuntimeError::NoDigest {
            image: image.to_owned(),
        })
    }
}

impl Runtime for ComposeCli {
    fn name(&self) -> &str {
        self.name
    }

    fn detect(&self) -> bool {
        if which::which(self.binary).is_err() {
            return false;
        }
        self.capture(&["version", "--format", "{{.Server.Version}}"])
            .map(|out| !String::from_utf8_lossy(&out).trim().is_empty())
            .unwrap_or(false)
    }

    fn up(&self, compose_path: &Path, project: &str, opts: &UpOptions) -> Result<()> {
        let mut args = Self::compose_args(compose_path, project);
        args.extend(["up".to_owned(), "-d".to_owned()]);
        if opts.build {
            args.push("--build".to_owned());
        }
        if opts.pull {
            args.extend(["--pull".to_owned(), "always".to_owned()]);
        }
        self.run(&args)
    }

    fn down(&self, compose_path: &Path, project: &str, remove_volumes: bool) -> Result<()> {
        let mut args = Self::compose_args(compose_path, project);
        args.push("down".to_owned());
        if remove_volumes {
            args.push("--volumes".to_owned());
        }
        self.run(&args)
    }

    fn logs(&self, compose_path: &Path, project: &str, opts: &LogsOptions) -> Result<LogStream> {
        let mut args = Self::compose_args(compose_path, project);
        args.extend(["logs".to_owned(), "--timestamps".to_owned()]);
        if opts.follow {
            args.push("--follow".to_owned());
        }
        if !opts.since.is_empty() {
            args.extend(["--since".to_owned(), opts.since.clone()]);
        }
        if !opts.service.is_empty() {
            args.push(opts.service.clone());
        }

        let command = format!("{} {}", self.binary, args.join(" "));
        let mut child = Command::new(self.binary)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| RuntimeError::Spawn {
                command: command.clone(),
                source: e,
            })?;
        let stdout = child.stdout.take().ok_or_else(|| RuntimeError::Spawn {
            command,
            source: std::io::Error::other("no stdout pipe"),
        })?;
        Ok(LogStream::new(child, stdout))
    }

    fn exec(
        &self,
        compose_path: &Path,
        project: &str,
        service: &str,
        cmd: &[String],
    ) -> Result<i32> {
        let mut args = Self::compose_args(compose_path, project);
        args.extend(["exec".to_owned(), "-T".to_owned(), service.to_owned()]);
        args.extend(cmd.iter().cloned());

        let command = format!("{} {}", self.binary, args.join(" "));
        let status = Command::new(self.binary)
            .args(&args)
            .status()
            .map_err(|e| RuntimeError::Spawn { command, source: e })?;
        Ok(status.code().unwrap_or(1))
    }

    fn status(&self, compose_path: &Path, project: &str) -> Result<Vec<ServiceStatus>> {
        let mut args = Self::compose_args(compose_path, project);
        args.extend(["ps".to_owned(), "--format".to_owned(), "json".to_owned()]);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = self.capture(&arg_refs)?;
        decode_status(&out)
    }
}

impl DigestResolver for ComposeCli {
    /// Resolves via `image inspect`, pulling the image first when it is
    /// not present locally.
    fn resolve_image_digest(&self, image: &str) -> Result<String> {
        if let Ok(digest) = self.inspect_repo_digest(image) {
            return Ok(digest);
        }
        self.run(&["pull".to_owned(), image.to_owned()])?;
        self.inspect_repo_digest(image)
    }
}

/// Decodes `ps --format json` output.
///
/// Newer compose releases emit NDJSON (one object per line); older ones
/// emit a JSON array. Try the array form first, fall back to lines, and
/// fail explicitly when neither parses.
fn decode_status(out: &[u8]) -> Result<Vec<ServiceStatus>> {
    let entries = parse_entries(out)?;
    Ok(entries.iter().map(status_from_entry).collect())
}

fn parse_entries(out: &[u8]) -> Result<Vec<serde_json::Map<String, serde_json::Value>>> {
    if let Ok(entries) = serde_json::from_slice(out) {
        return Ok(entries);
    }

    let text = String::from_utf8_lossy(out);
    let mut entries = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry = serde_json::from_str(line).map_err(|e| RuntimeError::StatusDecode {
            detail: format!("neither a JSON array nor JSON lines: {e}"),
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

fn status_from_entry(entry: &serde_json::Map<String, serde_json::Value>) -> ServiceStatus {
    let text = |key: &str| {
        entry
            .get(key)
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_owned()
    };

    let publishers: Vec<Publisher> = entry
        .get("Publishers")
        .cloned()
        .and_then(|raw| serde_json::from_value(raw).ok())
        .unwrap_or_default();

    let ports = publishers
        .iter()
        .filter(|p| p.published_port != 0)
        .map(|p| format!("{}->{}/{}", p.published_port, p.target_port, p.protocol))
        .collect::<Vec<_>>()
        .join(", ");

    ServiceStatus {
        name: text("Service"),
        state: text("State"),
        health: text("Health"),
        ports,
        publishers,
    }
}
