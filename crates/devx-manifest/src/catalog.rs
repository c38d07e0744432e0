//! Injectable catalog of supported dependency kinds.
//!
//! The validator and the compose synthesis engine both consult this
//! table. It is a plain value handed in by the caller rather than shared
//! global state, so tests can substitute their own catalog without
//! cross-test interference.

use std::collections::BTreeMap;

/// Immutable table mapping a dep kind to its default image repository.
#[derive(Debug, Clone)]
pub struct DepCatalog {
    images: BTreeMap<String, String>,
}

impl DepCatalog {
    /// Builds a catalog from explicit kind → default-image pairs.
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            images: entries.into_iter().collect(),
        }
    }

    /// Returns true when `kind` is a supported dependency kind.
    #[must_use]
    pub fn supports(&self, kind: &str) -> bool {
        self.images.contains_key(kind)
    }

    /// Returns the default image repository for `kind`, if supported.
    #[must_use]
    pub fn default_image(&self, kind: &str) -> Option<&str> {
        self.images.get(kind).map(String::as_str)
    }

    /// Supported kinds in lexicographic order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }
}

impl Default for DepCatalog {
    /// The stock catalog: postgres and redis.
    fn default() -> Self {
        Self::new([
            ("postgres".to_owned(), "postgres".to_owned()),
            ("redis".to_owned(), "redis".to_owned()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_catalog_supports_postgres_and_redis() {
        let catalog = DepCatalog::default();
        assert!(catalog.supports("postgres"));
        assert!(catalog.supports("redis"));
        assert!(!catalog.supports("memcached"));
        assert_eq!(catalog.default_image("postgres"), Some("postgres"));
    }

    #[test]
    fn custom_catalog_overrides_stock() {
        let catalog = DepCatalog::new([("nats".to_owned(), "nats".to_owned())]);
        assert!(catalog.supports("nats"));
        assert!(!catalog.supports("postgres"));
    }

    #[test]
    fn kinds_iterate_sorted() {
        let catalog = DepCatalog::default();
        let kinds: Vec<_> = catalog.kinds().collect();
        assert_eq!(kinds, vec!["postgres", "redis"]);
    }
}
