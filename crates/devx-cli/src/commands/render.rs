//! `devx render` — produce orchestration artifacts without touching the
//! runtime.

use clap::{Args, Subcommand};

use devx_compose::{Graph, RenderInput, render};

use crate::project::Project;

/// Arguments for `devx render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Artifact to render.
    #[command(subcommand)]
    pub target: RenderTarget,
}

/// Renderable artifact kinds.
#[derive(Subcommand, Debug)]
pub enum RenderTarget {
    /// Render the compose document.
    Compose(ComposeRenderArgs),
    /// Render cluster manifests.
    K8s(K8sRenderArgs),
}

/// Arguments for `devx render compose`.
#[derive(Args, Debug)]
pub struct ComposeRenderArgs {
    /// Profile to render; defaults to the manifest's default profile.
    #[arg(long)]
    pub profile: Option<String>,

    /// Write into .devx/ instead of printing to stdout.
    #[arg(long)]
    pub write: bool,

    /// Leave the telemetry stack out of the rendered document.
    #[arg(long)]
    pub no_telemetry: bool,
}

/// Arguments for `devx render k8s`.
#[derive(Args, Debug)]
pub struct K8sRenderArgs {
    /// Profile to render; defaults to the manifest's default profile.
    #[arg(long)]
    pub profile: Option<String>,
}

/// Dispatches to the selected renderer.
///
/// # Errors
///
/// Fails on manifest, graph, or synthesis errors.
pub fn execute(args: &RenderArgs) -> anyhow::Result<()> {
    match &args.target {
        RenderTarget::Compose(compose) => render_compose(compose),
        RenderTarget::K8s(_) => {
            anyhow::bail!("k8s rendering is not supported by this build")
        }
    }
}

fn render_compose(args: &ComposeRenderArgs) -> anyhow::Result<()> {
    let project = Project::load()?;
    let (profile_name, profile) = project.resolve_profile(args.profile.as_deref())?;
    let telemetry = !args.no_telemetry;

    if args.write {
        let path = project.write_compose(&profile_name, profile, telemetry)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    // Stdout path: same pipeline, no filesystem writes.
    let graph = Graph::build(profile)?;
    graph.topo_sort()?;
    let rewrite = project.rewrite_options()?;
    let document = render(&RenderInput {
        manifest: &project.manifest,
        profile_name: &profile_name,
        profile,
        rewrite: &rewrite,
        catalog: &project.catalog,
        telemetry,
    })?;
    print!("{document}");
    Ok(())
}
