//! CLI command definitions and dispatch.

pub mod down;
pub mod exec;
pub mod init;
pub mod lock;
pub mod logs;
pub mod render;
pub mod status;
pub mod up;

use clap::{Parser, Subcommand};

/// devx — declarative local development environments.
#[derive(Parser, Debug)]
#[command(name = "devx", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a starter devx.yaml and prepare the project directory.
    Init(init::InitArgs),
    /// Render and bring up a profile, then wait for health convergence.
    Up(up::UpArgs),
    /// Tear a profile down.
    Down(down::DownArgs),
    /// Show per-service status.
    Status(status::StatusArgs),
    /// Stream service logs.
    Logs(logs::LogsArgs),
    /// Execute a command inside a running service.
    Exec(exec::ExecArgs),
    /// Render orchestration artifacts without touching the runtime.
    Render(render::RenderArgs),
    /// Manage the image lockfile.
    Lock(lock::LockArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Init(args) => init::execute(&args),
        Command::Up(args) => up::execute(&args),
        Command::Down(args) => down::execute(&args),
        Command::Status(args) => status::execute(&args),
        Command::Logs(args) => logs::execute(&args),
        Command::Exec(args) => exec::execute(&args),
        Command::Render(args) => render::execute(&args),
        Command::Lock(args) => lock::execute(&args),
    }
}
