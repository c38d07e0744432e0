//! # devx-compose
//!
//! The compilation half of devx: profile → compose document.
//!
//! Handles:
//! - **Graph**: dependency graph construction and deterministic
//!   topological ordering.
//! - **Rewrite**: registry prefixing and lock-digest pinning of image
//!   references.
//! - **Render**: synthesis of the compose document, including optional
//!   telemetry-stack injection.
//! - **Telemetry**: the fixed observability topology and its embedded
//!   configuration assets.
//!
//! Everything in this crate is pure and synchronous; rendering the same
//! validated input twice produces byte-identical output.

pub mod graph;
pub mod render;
pub mod rewrite;
pub mod telemetry;

pub use graph::{Graph, GraphError, Node, NodeKind};
pub use render::{
    ComposeError, ComposeFile, ComposeService, Healthcheck, RenderInput, collect_images, render,
};
pub use rewrite::{RewriteOptions, rewrite_image};
pub use telemetry::{Asset, telemetry_assets};
