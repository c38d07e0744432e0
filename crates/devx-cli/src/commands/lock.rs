//! `devx lock` — image lockfile management.

use clap::{Args, Subcommand};

use devx_common::constants;
use devx_compose::{Graph, RenderInput, RewriteOptions, collect_images, render};
use devx_lock::Lockfile;
use devx_runtime::{DigestResolver, select_resolver};

use crate::project::Project;

/// Arguments for `devx lock`.
#[derive(Args, Debug)]
pub struct LockArgs {
    /// Lockfile operation.
    #[command(subcommand)]
    pub command: LockCommand,
}

/// Lockfile operations.
#[derive(Subcommand, Debug)]
pub enum LockCommand {
    /// Resolve every rendered image to its digest and rewrite devx.lock.
    Update(LockUpdateArgs),
}

/// Arguments for `devx lock update`.
#[derive(Args, Debug)]
pub struct LockUpdateArgs {
    /// Profile to lock; defaults to the manifest's default profile.
    #[arg(long)]
    pub profile: Option<String>,
}

/// Dispatches to the selected lock operation.
///
/// # Errors
///
/// Fails on manifest, rendering, or digest-resolution errors.
pub fn execute(args: &LockArgs) -> anyhow::Result<()> {
    match &args.command {
        LockCommand::Update(update) => execute_update(update),
    }
}

/// Rebuilds the lockfile from scratch.
///
/// The profile is rendered with the registry prefix applied but with no
/// existing lockfile, so the collected references are exactly the
/// unpinned names the runtime would pull; telemetry is rendered in so
/// its images get pinned too. The first image that fails to resolve
/// aborts the update and the old lockfile is left untouched.
///
/// # Errors
///
/// Fails on manifest, rendering, runtime-selection, or digest errors.
fn execute_update(args: &LockUpdateArgs) -> anyhow::Result<()> {
    let project = Project::load()?;
    let (profile_name, profile) = project.resolve_profile(args.profile.as_deref())?;

    let graph = Graph::build(profile)?;
    graph.topo_sort()?;

    let rewrite = RewriteOptions {
        registry_prefix: project.manifest.registry.prefix.clone(),
        lockfile: None,
    };
    let document = render(&RenderInput {
        manifest: &project.manifest,
        profile_name: &profile_name,
        profile,
        rewrite: &rewrite,
        catalog: &project.catalog,
        telemetry: true,
    })?;
    let images = collect_images(&document)?;

    let resolver = select_resolver()?;
    let mut lockfile = Lockfile::new();
    for image in images {
        println!("Resolving {image}...");
        let digest = resolver.resolve_image_digest(&image)?;
        let _ = lockfile.images.insert(image, digest);
    }

    let path = constants::lock_path(&project.root);
    lockfile.save(&path)?;
    println!(
        "Wrote {} with {} pinned image(s)",
        constants::LOCK_FILE,
        lockfile.images.len()
    );
    Ok(())
}
