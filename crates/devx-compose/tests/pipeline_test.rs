//! End-to-end tests for the compilation pipeline.
//!
//! These tests drive the full path a profile takes on its way to the
//! container runtime:
//! 1. Parse `devx.yaml`
//! 2. Validate the manifest and the profile
//! 3. Build and order the dependency graph
//! 4. Rewrite image references (registry prefix, lock pinning)
//! 5. Render the compose document and re-parse it

#![allow(clippy::expect_used, clippy::unwrap_used)]

use devx_compose::{ComposeFile, Graph, RenderInput, RewriteOptions, collect_images, render};
use devx_lock::Lockfile;
use devx_manifest::{DepCatalog, Manifest, validate, validate_profile};

const MANIFEST: &str = r"
version: 1
project:
  name: shop
  defaultProfile: local
registry:
  prefix: registry.local
profiles:
  local:
    runtime: compose
    services:
      api:
        image: shop/api:1.4.0
        ports: ['8080:8080']
        dependsOn: [db, cache]
        health:
          httpGet: http://localhost:8080/healthz
      worker:
        build:
          context: ./worker
        dependsOn: [db]
    deps:
      db:
        kind: postgres
        version: '16'
        volume: db-data:/var/lib/postgresql/data
      cache:
        kind: redis
        version: '7'
";

fn load() -> Manifest {
    let manifest = Manifest::parse(MANIFEST.as_bytes()).expect("parse");
    validate(&manifest).expect("validate");
    validate_profile(&manifest, "local", &DepCatalog::default()).expect("validate profile");
    manifest
}

fn render_with(manifest: &Manifest, rewrite: &RewriteOptions, telemetry: bool) -> String {
    render(&RenderInput {
        manifest,
        profile_name: "local",
        profile: manifest.profile("local").expect("profile"),
        rewrite,
        catalog: &DepCatalog::default(),
        telemetry,
    })
    .expect("render")
}

// ── Graph ────────────────────────────────────────────────────────────

#[test]
fn pipeline_orders_deps_before_services() {
    let manifest = load();
    let graph = Graph::build(manifest.profile("local").expect("profile")).expect("build");
    let order = graph.topo_sort().expect("sort");
    assert_eq!(order, vec!["cache", "db", "api", "worker"]);
}

// ── Rendering ────────────────────────────────────────────────────────

#[test]
fn pipeline_renders_a_reparsable_document() {
    let manifest = load();
    let rewrite = RewriteOptions {
        registry_prefix: manifest.registry.prefix.clone(),
        lockfile: None,
    };
    let document = render_with(&manifest, &rewrite, false);
    let file: ComposeFile = serde_yaml::from_str(&document).expect("reparse");

    assert_eq!(file.services.len(), 4);
    assert_eq!(file.services["api"].image, "registry.local/shop/api:1.4.0");
    assert_eq!(file.services["db"].image, "registry.local/postgres:16");
    assert_eq!(file.services["cache"].image, "registry.local/redis:7");
    assert!(file.services["worker"].image.is_empty());
    assert!(file.services["worker"].build.is_some());
    assert!(file.networks.contains_key("devx_default"));
    assert!(file.volumes.contains_key("db-data"));
}

#[test]
fn pipeline_render_is_deterministic_with_telemetry() {
    let manifest = load();
    let rewrite = RewriteOptions {
        registry_prefix: manifest.registry.prefix.clone(),
        lockfile: None,
    };
    let first = render_with(&manifest, &rewrite, true);
    let second = render_with(&manifest, &rewrite, true);
    assert_eq!(first, second);
}

// ── Lock pinning ─────────────────────────────────────────────────────

#[test]
fn pipeline_lock_digests_pin_rendered_references() {
    let manifest = load();

    // First pass, unpinned: the references a lock update would collect.
    let unpinned = RewriteOptions {
        registry_prefix: manifest.registry.prefix.clone(),
        lockfile: None,
    };
    let document = render_with(&manifest, &unpinned, false);
    let images = collect_images(&document).expect("collect");
    assert!(images.contains(&"registry.local/postgres:16".to_owned()));

    // Second pass with a lockfile built from those references.
    let mut lockfile = Lockfile::new();
    for (i, image) in images.iter().enumerate() {
        let _ = lockfile
            .images
            .insert(image.clone(), format!("sha256:{i:04x}"));
    }
    let pinned = RewriteOptions {
        registry_prefix: manifest.registry.prefix.clone(),
        lockfile: Some(lockfile),
    };
    let document = render_with(&manifest, &pinned, false);
    let file: ComposeFile = serde_yaml::from_str(&document).expect("reparse");
    assert!(file.services["db"].image.starts_with("registry.local/postgres@sha256:"));
    assert!(file.services["api"].image.starts_with("registry.local/shop/api@sha256:"));
    // Built services stay imageless regardless of the lockfile.
    assert!(file.services["worker"].image.is_empty());
}

// ── Structural failures ──────────────────────────────────────────────

#[test]
fn pipeline_rejects_a_cycle_before_rendering() {
    let manifest = Manifest::parse(
        br"
version: 1
project:
  name: shop
  defaultProfile: local
profiles:
  local:
    services:
      api:
        image: img
        dependsOn: [web]
      web:
        image: img
        dependsOn: [api]
",
    )
    .expect("parse");
    let graph = Graph::build(manifest.profile("local").expect("profile")).expect("build");
    let err = graph.topo_sort().expect_err("should fail");
    assert!(err.to_string().contains("api, web"), "got: {err}");
}
