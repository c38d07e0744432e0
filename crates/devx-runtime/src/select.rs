//! Probing-based runtime driver selection.
//!
//! The candidate list is ordered and injectable: callers (and tests) pass
//! their own, the CLI passes [`default_candidates`]. The first driver
//! whose availability probe succeeds wins.

use crate::{ComposeCli, Result, Runtime, RuntimeError};

/// The stock candidate list, in priority order: docker, then podman.
#[must_use]
pub fn default_candidates() -> Vec<Box<dyn Runtime>> {
    vec![
        Box::new(ComposeCli::docker()),
        Box::new(ComposeCli::podman()),
    ]
}

/// Returns the first stock driver that is available, as the concrete
/// type. Lock updates need this: digest resolution is an extended
/// capability not present on the base trait object.
///
/// # Errors
///
/// Returns [`RuntimeError::NoRuntime`] when neither docker nor podman is
/// available.
pub fn select_resolver() -> Result<ComposeCli> {
    let mut tried = Vec::new();
    for candidate in [ComposeCli::docker(), ComposeCli::podman()] {
        if candidate.detect() {
            return Ok(candidate);
        }
        tried.push(candidate.name().to_owned());
    }
    Err(RuntimeError::NoRuntime {
        tried: tried.join(", "),
    })
}

/// Returns the first candidate whose probe succeeds.
///
/// # Errors
///
/// Returns [`RuntimeError::NoRuntime`] naming every probed candidate when
/// none is available.
pub fn select_runtime(candidates: Vec<Box<dyn Runtime>>) -> Result<Box<dyn Runtime>> {
    let mut tried = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if candidate.detect() {
            tracing::debug!(runtime = candidate.name(), "selected container runtime");
            return Ok(candidate);
        }
        tried.push(candidate.name().to_owned());
    }
    Err(RuntimeError::NoRuntime {
        tried: tried.join(", "),
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use crate::{LogStream, LogsOptions, ServiceStatus, UpOptions};

    use super::*;

    #[derive(Debug)]
    struct FakeRuntime {
        name: &'static str,
        available: bool,
    }

    impl Runtime for FakeRuntime {
        fn name(&self) -> &str {
            self.name
        }

        fn detect(&self) -> bool {
            self.available
        }

        fn up(&self, _: &Path, _: &str, _: &UpOptions) -> Result<()> {
            Ok(())
        }

        fn down(&self, _: &Path, _: &str, _: bool) -> Result<()> {
            Ok(())
        }

        fn logs(&self, _: &Path, _: &str, _: &LogsOptions) -> Result<LogStream> {
            unimplemented!("not exercised by selection tests")
        }

        fn exec(&self, _: &Path, _: &str, _: &str, _: &[String]) -> Result<i32> {
            Ok(0)
        }

        fn status(&self, _: &Path, _: &str) -> Result<Vec<ServiceStatus>> {
            Ok(Vec::new())
        }
    }

    fn fake(name: &'static str, available: bool) -> Box<dyn Runtime> {
        Box::new(FakeRuntime { name, available })
    }

    #[test]
    fn first_available_candidate_wins() {
        let selected = select_runtime(vec![
            fake("first", false),
            fake("second", true),
            fake("third", true),
        ])
        .expect("select");
        assert_eq!(selected.name(), "second");
    }

    #[test]
    fn probe_order_follows_the_candidate_list() {
        let selected =
            select_runtime(vec![fake("podman", true), fake("docker", true)]).expect("select");
        assert_eq!(selected.name(), "podman");
    }

    #[test]
    fn no_available_candidate_names_everything_tried() {
        let err = select_runtime(vec![fake("docker", false), fake("podman", false)])
            .expect_err("should fail");
        assert!(err.to_string().contains("docker, podman"), "got: {err}");
    }

    #[test]
    fn empty_candidate_list_fails() {
        assert!(select_runtime(Vec::new()).is_err());
    }
}
