//! # devx-lock
//!
//! The image lockfile: a persisted mapping from image references to
//! content digests, created only by an explicit `lock update` and
//! read-only during rendering. Pinning an image by digest makes pulls
//! reproducible regardless of tag drift.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lockfile schema version.
pub const LOCK_VERSION: u32 = 1;

/// Errors raised while reading or writing a lockfile.
#[derive(Debug, Error)]
pub enum LockError {
    /// The lockfile could not be read or written.
    #[error("lockfile I/O error at {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The lockfile is not valid JSON for the expected schema.
    #[error("invalid lockfile at {path}: {source}")]
    Json {
        /// Path of the offending document.
        path: String,
        /// Underlying serde error.
        source: serde_json::Error,
    },
}

/// Persisted image-reference → digest mapping.
///
/// Keys are kept in a `BTreeMap` so the saved file is diff-stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    /// Schema version.
    pub version: u32,
    /// Mapping from image reference to `sha256:…` digest.
    #[serde(default)]
    pub images: BTreeMap<String, String>,
}

impl Lockfile {
    /// Creates an empty lockfile at the current schema version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: LOCK_VERSION,
            images: BTreeMap::new(),
        }
    }

    /// Loads a lockfile from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn load(path: &Path) -> Result<Self, LockError> {
        let data = std::fs::read(path).map_err(|e| LockError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_slice(&data).map_err(|e| LockError::Json {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Writes the lockfile to `path` as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be encoded or written.
    pub fn save(&self, path: &Path) -> Result<(), LockError> {
        let data = serde_json::to_vec_pretty(self).map_err(|e| LockError::Json {
            path: path.display().to_string(),
            source: e,
        })?;
        std::fs::write(path, data).map_err(|e| LockError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Applies a digest pin to `image` if one is recorded.
    ///
    /// Already-pinned references (containing `@sha256:`) and unknown
    /// references pass through unchanged. On a hit, the tag is stripped
    /// and `@<digest>` appended.
    #[must_use]
    pub fn apply(&self, image: &str) -> String {
        if image.is_empty() || image.contains("@sha256:") {
            return image.to_owned();
        }
        match self.images.get(image) {
            Some(digest) if !digest.is_empty() => {
                format!("{}@{digest}", strip_tag(image))
            }
            _ => image.to_owned(),
        }
    }
}

/// Removes the tag portion of an image reference.
///
/// The base is everything before `@` when a digest section is present;
/// otherwise everything before the last `:` that occurs after the last
/// `/`, so a `host:port` colon is never mistaken for a tag separator.
#[must_use]
pub fn strip_tag(image: &str) -> &str {
    if let Some(at) = image.find('@') {
        return &image[..at];
    }
    let last_slash = image.rfind('/').map_or(0, |i| i + 1);
    match image[last_slash..].rfind(':') {
        Some(colon) => &image[..last_slash + colon],
        None => image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lockfile(entries: &[(&str, &str)]) -> Lockfile {
        let mut lf = Lockfile::new();
        for (image, digest) in entries {
            let _ = lf
                .images
                .insert((*image).to_owned(), (*digest).to_owned());
        }
        lf
    }

    #[test]
    fn apply_pins_and_drops_tag() {
        let lf = lockfile(&[("registry.local/nginx:alpine", "sha256:deadbeef")]);
        assert_eq!(
            lf.apply("registry.local/nginx:alpine"),
            "registry.local/nginx@sha256:deadbeef"
        );
    }

    #[test]
    fn apply_leaves_unknown_images_alone() {
        let lf = Lockfile::new();
        assert_eq!(lf.apply("nginx:alpine"), "nginx:alpine");
    }

    #[test]
    fn apply_skips_already_pinned_images() {
        let lf = lockfile(&[("nginx@sha256:aaaa", "sha256:bbbb")]);
        assert_eq!(lf.apply("nginx@sha256:aaaa"), "nginx@sha256:aaaa");
    }

    #[test]
    fn strip_tag_ignores_registry_port_colon() {
        assert_eq!(strip_tag("localhost:5000/app"), "localhost:5000/app");
        assert_eq!(strip_tag("localhost:5000/app:v1"), "localhost:5000/app");
        assert_eq!(strip_tag("nginx:alpine"), "nginx");
        assert_eq!(strip_tag("nginx"), "nginx");
        assert_eq!(strip_tag("repo/app@sha256:abc"), "repo/app");
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("devx.lock");
        let lf = lockfile(&[
            ("b-image:1", "sha256:bbbb"),
            ("a-image:1", "sha256:aaaa"),
        ]);
        lf.save(&path).expect("save");

        let loaded = Lockfile::load(&path).expect("load");
        assert_eq!(loaded, lf);
        // BTreeMap keys serialize sorted, keeping the file diff-stable.
        let raw = std::fs::read_to_string(&path).expect("read");
        assert!(raw.find("a-image").expect("a") < raw.find("b-image").expect("b"));
    }

    #[test]
    fn load_rejects_garbage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("devx.lock");
        std::fs::write(&path, b"{not json").expect("write");
        assert!(matches!(
            Lockfile::load(&path),
            Err(LockError::Json { .. })
        ));
    }
}
