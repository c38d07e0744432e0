//! `devx init` — scaffold a starter manifest.

use clap::Args;

use anyhow::Context;
use devx_common::constants;

use crate::project::ensure_gitignore;

/// Arguments for `devx init`.
#[derive(Args, Debug)]
pub struct InitArgs {}

const STARTER_MANIFEST: &str = r#"version: 1
project:
  name: my-app
  defaultProfile: local
registry:
  prefix: ""
profiles:
  local:
    runtime: compose
    services:
      api:
        image: nginx:alpine
        ports: ["8080:80"]
        dependsOn: [db]
        health:
          httpGet: http://localhost:8080/
    deps:
      db:
        kind: postgres
        version: "16"
        env:
          POSTGRES_PASSWORD: devx
        ports: ["5432:5432"]
        volume: db-data:/var/lib/postgresql/data
"#;

/// Writes a starter manifest, creates the artifact directory, and adds a
/// `.gitignore` rule for it. Refuses to overwrite an existing manifest.
///
/// # Errors
///
/// Fails when a manifest already exists or the files cannot be written.
pub fn execute(_args: &InitArgs) -> anyhow::Result<()> {
    let root = std::env::current_dir().context("cannot determine working directory")?;
    let manifest_path = constants::manifest_path(&root);
    if manifest_path.exists() {
        anyhow::bail!(
            "{} already exists, refusing to overwrite",
            constants::MANIFEST_FILE
        );
    }

    std::fs::write(&manifest_path, STARTER_MANIFEST)
        .with_context(|| format!("cannot write {}", manifest_path.display()))?;

    let devx_dir = root.join(constants::DEVX_DIR);
    std::fs::create_dir_all(&devx_dir)
        .with_context(|| format!("cannot create {}", devx_dir.display()))?;
    ensure_gitignore(&root);

    println!("Created {}", constants::MANIFEST_FILE);
    println!("Edit it, then run 'devx up' to start the local profile");
    Ok(())
}
