//! Manifest and profile validation.
//!
//! Checks accumulate every issue before failing — a user fixing a
//! manifest should see the full list at once — and the issue list is
//! sorted so diagnostics are deterministic across runs.

use thiserror::Error;

use devx_common::constants::MANIFEST_VERSION;

use crate::catalog::DepCatalog;
use crate::model::Manifest;

/// Accumulated validation failure. Never partial: either the manifest is
/// valid or every detected issue is listed here.
#[derive(Debug, Error)]
#[error("manifest validation failed:\n- {}", issues.join("\n- "))]
pub struct ValidationError {
    /// All detected issues, sorted lexicographically.
    pub issues: Vec<String>,
}

impl ValidationError {
    fn new(mut issues: Vec<String>) -> Self {
        issues.sort();
        Self { issues }
    }
}

/// Validates the manifest's top-level structure.
///
/// Checks the schema version, project identity, and profile table.
/// Default-profile existence is only checked once those pass, since it is
/// meaningless against an empty profile table.
///
/// # Errors
///
/// Returns a [`ValidationError`] listing every detected issue.
pub fn validate(manifest: &Manifest) -> Result<(), ValidationError> {
    let mut issues = Vec::new();

    if manifest.version != MANIFEST_VERSION {
        issues.push(format!("version must be {MANIFEST_VERSION}"));
    }
    if manifest.project.name.is_empty() {
        issues.push("project.name is required".to_owned());
    }
    if manifest.project.default_profile.is_empty() {
        issues.push("project.defaultProfile is required".to_owned());
    }
    if manifest.profiles.is_empty() {
        issues.push("profiles are required".to_owned());
    }
    if !issues.is_empty() {
        return Err(ValidationError::new(issues));
    }

    if !manifest
        .profiles
        .contains_key(&manifest.project.default_profile)
    {
        return Err(ValidationError::new(vec![
            "project.defaultProfile does not exist".to_owned(),
        ]));
    }
    Ok(())
}

/// Validates a single profile against the manifest and the dep catalog.
///
/// Checks the runtime target, service image/build presence, `dependsOn`
/// resolution, dep kinds, and hook shape.
///
/// # Errors
///
/// Returns a [`ValidationError`] listing every detected issue.
pub fn validate_profile(
    manifest: &Manifest,
    profile_name: &str,
    catalog: &DepCatalog,
) -> Result<(), ValidationError> {
    let Some(profile) = manifest.profiles.get(profile_name) else {
        return Err(ValidationError::new(vec![
            "profile does not exist".to_owned(),
        ]));
    };

    let mut issues = Vec::new();

    let runtime = &profile.runtime;
    if !runtime.is_empty() && runtime != "compose" && runtime != "k8s" {
        issues.push(format!(
            "profile '{profile_name}' runtime must be compose or k8s"
        ));
    }

    for (name, svc) in &profile.services {
        if svc.image.is_empty() && svc.build.is_none() {
            issues.push(format!("service '{name}' must define image or build"));
        }
        for dep in &svc.depends_on {
            if !profile.declares(dep) {
                issues.push(format!(
                    "service '{name}' dependsOn '{dep}' which does not exist"
                ));
            }
        }
    }

    for (name, dep) in &profile.deps {
        if dep.kind.is_empty() {
            issues.push(format!("dep '{name}' must define kind"));
        } else if !catalog.supports(&dep.kind) {
            issues.push(format!("dep '{name}' kind '{}' is not supported", dep.kind));
        }
    }

    let all_hooks = profile
        .hooks
        .after_up
        .iter()
        .chain(profile.hooks.before_down.iter());
    for (i, hook) in all_hooks.enumerate() {
        let has_exec = !hook.exec.is_empty();
        let has_run = !hook.run.is_empty();
        if !has_exec && !has_run {
            issues.push(format!("hook[{i}] must set either exec or run"));
        }
        if has_exec && has_run {
            issues.push(format!("hook[{i}] cannot set both exec and run"));
        }
        if has_exec && hook.service.is_empty() {
            issues.push(format!("hook[{i}] exec requires service to be set"));
        }
        if has_run && !hook.service.is_empty() {
            issues.push(format!("hook[{i}] run does not use service"));
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(issues))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Manifest {
        Manifest::parse(yaml.as_bytes()).expect("parse")
    }

    #[test]
    fn valid_manifest_passes() {
        let m = parse(
            r"
version: 1
project:
  name: my-app
  defaultProfile: local
profiles:
  local:
    runtime: compose
    services:
      api:
        image: nginx:alpine
",
        );
        validate(&m).expect("manifest");
        validate_profile(&m, "local", &DepCatalog::default()).expect("profile");
    }

    #[test]
    fn all_top_level_issues_accumulate_sorted() {
        let m = parse(
            r#"
version: 1
project:
  name: ""
  defaultProfile: ""
profiles: {}
"#,
        );
        let err = validate(&m).expect_err("should fail");
        assert_eq!(
            err.issues,
            vec![
                "profiles are required",
                "project.defaultProfile is required",
                "project.name is required",
            ]
        );
    }

    #[test]
    fn unsupported_version_rejected() {
        let m = parse(
            r"
version: 2
project:
  name: my-app
  defaultProfile: local
profiles:
  local:
    services:
      api:
        image: nginx
",
        );
        let err = validate(&m).expect_err("should fail");
        assert_eq!(err.issues, vec!["version must be 1"]);
    }

    #[test]
    fn dangling_default_profile_fails() {
        let m = parse(
            r"
version: 1
project:
  name: my-app
  defaultProfile: staging
profiles:
  local:
    services:
      api:
        image: nginx
",
        );
        let err = validate(&m).expect_err("should fail");
        assert_eq!(err.issues, vec!["project.defaultProfile does not exist"]);
    }

    #[test]
    fn unknown_runtime_rejected() {
        let m = parse(
            r"
version: 1
project:
  name: my-app
  defaultProfile: local
profiles:
  local:
    runtime: bad
    services:
      api:
        image: nginx
",
        );
        let err = validate_profile(&m, "local", &DepCatalog::default()).expect_err("should fail");
        assert!(
            err.issues[0].contains("runtime must be compose or k8s"),
            "got: {:?}",
            err.issues
        );
    }

    #[test]
    fn service_without_image_or_build_rejected() {
        let m = parse(
            r"
version: 1
project:
  name: my-app
  defaultProfile: local
profiles:
  local:
    services:
      api: {}
",
        );
        let err = validate_profile(&m, "local", &DepCatalog::default()).expect_err("should fail");
        assert_eq!(err.issues, vec!["service 'api' must define image or build"]);
    }

    #[test]
    fn dangling_depends_on_rejected() {
        let m = parse(
            r"
version: 1
project:
  name: my-app
  defaultProfile: local
profiles:
  local:
    services:
      api:
        image: nginx
        dependsOn: [db]
",
        );
        let err = validate_profile(&m, "local", &DepCatalog::default()).expect_err("should fail");
        assert_eq!(
            err.issues,
            vec!["service 'api' dependsOn 'db' which does not exist"]
        );
    }

    #[test]
    fn unsupported_dep_kind_rejected() {
        let m = parse(
            r"
version: 1
project:
  name: my-app
  defaultProfile: local
profiles:
  local:
    services:
      api:
        image: nginx
    deps:
      cache:
        kind: memcached
",
        );
        let err = validate_profile(&m, "local", &DepCatalog::default()).expect_err("should fail");
        assert_eq!(
            err.issues,
            vec!["dep 'cache' kind 'memcached' is not supported"]
        );
    }

    #[test]
    fn catalog_injection_extends_supported_kinds() {
        let m = parse(
            r"
version: 1
project:
  name: my-app
  defaultProfile: local
profiles:
  local:
    services:
      api:
        image: nginx
    deps:
      bus:
        kind: nats
",
        );
        let catalog = DepCatalog::new([("nats".to_owned(), "nats".to_owned())]);
        validate_profile(&m, "local", &catalog).expect("should pass with custom catalog");
    }

    #[test]
    fn hook_shape_rules_enforced() {
        let m = parse(
            r"
version: 1
project:
  name: my-app
  defaultProfile: local
profiles:
  local:
    services:
      api:
        image: nginx
    hooks:
      afterUp:
        - exec: migrate up
          run: ./seed.sh
        - exec: migrate up
        - run: ./seed.sh
          service: api
      beforeDown:
        - {}
",
        );
        let err = validate_profile(&m, "local", &DepCatalog::default()).expect_err("should fail");
        assert_eq!(
            err.issues,
            vec![
                "hook[0] cannot set both exec and run",
                "hook[0] exec requires service to be set",
                "hook[1] exec requires service to be set",
                "hook[2] run does not use service",
                "hook[3] must set either exec or run",
            ]
        );
    }

    #[test]
    fn missing_profile_is_its_own_error() {
        let m = parse(
            r"
version: 1
project:
  name: my-app
  defaultProfile: local
profiles:
  local:
    services:
      api:
        image: nginx
",
        );
        let err = validate_profile(&m, "ci", &DepCatalog::default()).expect_err("should fail");
        assert_eq!(err.issues, vec!["profile does not exist"]);
    }
}
