//! # devx — declarative local development environments
//!
//! Compiles a `devx.yaml` manifest into a compose document and drives an
//! external container runtime through a uniform lifecycle.

mod commands;
mod hooks;
mod output;
mod project;

use clap::Parser;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    commands::execute(cli)
}
