//! Image-reference rewriting: registry prefixing then digest pinning.
//!
//! A pure two-step pipeline with a fixed order:
//!
//! 1. If a registry prefix is configured and the reference is not already
//!    under it, the reference is moved under the prefix — replacing an
//!    explicit registry host, or prepending when there is none.
//! 2. If a lockfile is available and the rewritten reference carries no
//!    digest pin, the rewritten reference is looked up and pinned.

use devx_lock::Lockfile;

/// Options steering the rewrite pipeline for one render.
#[derive(Debug, Clone, Default)]
pub struct RewriteOptions {
    /// Registry prefix to move images under; empty disables step 1.
    pub registry_prefix: String,
    /// Lockfile consulted for digest pins; `None` disables step 2.
    pub lockfile: Option<Lockfile>,
}

/// Rewrites one image reference through the pipeline.
#[must_use]
pub fn rewrite_image(image: &str, opts: &RewriteOptions) -> String {
    if image.is_empty() {
        return String::new();
    }

    let mut rewritten = if opts.registry_prefix.is_empty() {
        image.to_owned()
    } else {
        prefix_registry(image, &opts.registry_prefix)
    };
    if let Some(lockfile) = &opts.lockfile {
        rewritten = lockfile.apply(&rewritten);
    }
    rewritten
}

/// Moves `image` under `prefix` unless it is already there.
fn prefix_registry(image: &str, prefix: &str) -> String {
    if image.starts_with(&format!("{prefix}/")) {
        return image.to_owned();
    }
    match split_registry(image) {
        Some((_host, remainder)) => format!("{prefix}/{remainder}"),
        None => format!("{prefix}/{image}"),
    }
}

/// Splits off an explicit registry host, if the first path segment names
/// one: it contains a dot, a colon before the first slash, or is exactly
/// "localhost".
fn split_registry(image: &str) -> Option<(&str, &str)> {
    let (first, rest) = image.split_once('/')?;
    if first.contains('.') || first.contains(':') || first == "localhost" {
        Some((first, rest))
    } else {
        None
    }
}
