//! Compose document synthesis.
//!
//! Consumes a validated profile and emits the compose document text.
//! Output is canonical: all maps are `BTreeMap`, struct fields serialize
//! in a fixed order, and empty fields are omitted — rendering identical
//! input twice yields byte-identical output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use devx_common::constants::{LABEL_PROFILE, LABEL_PROJECT, LABEL_SERVICE, NETWORK_NAME};
use devx_manifest::{DepCatalog, Manifest, Profile};

use crate::rewrite::{RewriteOptions, rewrite_image};
use crate::telemetry;

/// Errors raised during synthesis. All fatal; nothing partial is emitted.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// A telemetry service name collides with a user-declared name.
    #[error("telemetry service name collision: {name}")]
    TelemetryCollision {
        /// The colliding service name.
        name: String,
    },

    /// A dep references a kind the catalog does not know.
    #[error("dep '{dep}' kind '{kind}' has no default image")]
    UnknownDepKind {
        /// The dep name.
        dep: String,
        /// The unsupported kind.
        kind: String,
    },

    /// The document failed to (de)serialize.
    #[error("compose document serialization failed: {source}")]
    Serialize {
        /// Underlying YAML error.
        #[from]
        source: serde_yaml::Error,
    },
}

/// Top-level compose document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComposeFile {
    /// Services keyed by name.
    pub services: BTreeMap<String, ComposeService>,
    /// Networks; devx always emits exactly one.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, Network>,
    /// Named volumes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, Volume>,
}

/// A network entry (no devx-configurable fields).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Network {}

/// A named-volume entry (no devx-configurable fields).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Volume {}

/// One service entry in the compose document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComposeService {
    /// Image reference, post-rewrite. Cleared when `build` is set.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    /// Build context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<ComposeBuild>,
    /// Port mappings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    /// Environment variables.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    /// Command override.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    /// Working directory.
    #[serde(default, rename = "working_dir", skip_serializing_if = "String::is_empty")]
    pub working_dir: String,
    /// Volume mounts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    /// Start-order dependencies.
    #[serde(default, rename = "depends_on", skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Deterministic label set (project, profile, service).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// HTTP health probe translated to a runtime-native check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<Healthcheck>,
    /// Networks this service joins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
    /// Privileged mode (telemetry cAdvisor only).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub privileged: bool,
}

/// Build section of a service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComposeBuild {
    /// Build context directory.
    pub context: String,
    /// Dockerfile path.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dockerfile: String,
}

/// Healthcheck section of a service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Healthcheck {
    /// Check command in compose exec-form.
    pub test: Vec<String>,
    /// Probe interval; omitted when the manifest leaves it unset.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub interval: String,
    /// Retry budget; omitted when the manifest leaves it unset.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub retries: u32,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(n: &u32) -> bool {
    *n == 0
}

/// Everything one render consumes.
#[derive(Debug)]
pub struct RenderInput<'a> {
    /// The validated manifest.
    pub manifest: &'a Manifest,
    /// Name of the profile being rendered.
    pub profile_name: &'a str,
    /// The profile itself.
    pub profile: &'a Profile,
    /// Image rewrite configuration.
    pub rewrite: &'a RewriteOptions,
    /// Dep kind table.
    pub catalog: &'a DepCatalog,
    /// Whether to inject the telemetry stack.
    pub telemetry: bool,
}

/// Renders the compose document for one profile.
///
/// # Errors
///
/// Returns [`ComposeError::UnknownDepKind`] for a dep whose kind has no
/// catalog entry, [`ComposeError::TelemetryCollision`] when a telemetry
/// service name is already taken, or a serialization error.
pub fn render(input: &RenderInput<'_>) -> Result<String, ComposeError> {
    let mut file = ComposeFile {
        services: BTreeMap::new(),
        networks: BTreeMap::from([(NETWORK_NAME.to_owned(), Network {})]),
        volumes: BTreeMap::new(),
    };

    for (name, dep) in &input.profile.deps {
        let base = input.catalog.default_image(&dep.kind).ok_or_else(|| {
            ComposeError::UnknownDepKind {
                dep: name.clone(),
                kind: dep.kind.clone(),
            }
        })?;
        let image = if dep.version.is_empty() {
            base.to_owned()
        } else {
            format!("{base}:{}", dep.version)
        };

        let mut svc = ComposeService {
            image: rewrite_image(&image, input.rewrite),
            environment: dep.env.clone(),
            ports: dep.ports.clone(),
            labels: labels(input.manifest, input.profile_name, name),
            networks: vec![NETWORK_NAME.to_owned()],
            ..ComposeService::default()
        };
        if !dep.volume.is_empty() {
            svc.volumes = vec![dep.volume.clone()];
            let volume_name = dep.volume.split(':').next().unwrap_or_default();
            if !volume_name.is_empty() {
                let _ = file.volumes.insert(volume_name.to_owned(), Volume {});
            }
        }
        let _ = file.services.insert(name.clone(), svc);
    }

    for (name, svc) in &input.profile.services {
        let mut service = ComposeService {
            image: rewrite_image(&svc.image, input.rewrite),
            ports: svc.ports.clone(),
            environment: svc.env.clone(),
            command: svc.command.clone(),
            working_dir: svc.workdir.clone(),
            volumes: svc.mount.clone(),
            depends_on: svc.depends_on.clone(),
            labels: labels(input.manifest, input.profile_name, name),
            networks: vec![NETWORK_NAME.to_owned()],
            ..ComposeService::default()
        };

        if let Some(build) = &svc.build {
            service.build = Some(ComposeBuild {
                context: build.context.clone(),
                dockerfile: build.dockerfile.clone(),
            });
            service.image = String::new();
        }

        if let Some(health) = &svc.health {
            if !health.http_get.is_empty() {
                service.healthcheck = Some(Healthcheck {
                    test: vec![
                        "CMD-SHELL".to_owned(),
                        format!("wget -qO- {} >/dev/null 2>&1 || exit 1", health.http_get),
                    ],
                    interval: health.interval.clone(),
                    retries: health.retries,
                });
            }
        }

        let _ = file.services.insert(name.clone(), service);
    }

    if input.telemetry {
        let (services, volumes) =
            telemetry::telemetry_services(input.manifest, input.profile_name, input.rewrite);
        for (name, svc) in services {
            if file.services.contains_key(&name) {
                return Err(ComposeError::TelemetryCollision { name });
            }
            let _ = file.services.insert(name, svc);
        }
        for name in volumes {
            let _ = file.volumes.insert(name, Volume {});
        }
    }

    tracing::debug!(
        profile = input.profile_name,
        services = file.services.len(),
        telemetry = input.telemetry,
        "rendered compose document"
    );
    Ok(serde_yaml::to_string(&file)?)
}

fn labels(manifest: &Manifest, profile_name: &str, service: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_PROJECT.to_owned(), manifest.project.name.clone()),
        (LABEL_PROFILE.to_owned(), profile_name.to_owned()),
        (LABEL_SERVICE.to_owned(), service.to_owned()),
    ])
}

/// Extracts every resolved image reference from a rendered document.
///
/// Services built from source have no image and are skipped. The result
/// follows service-name order, so callers see a deterministic sequence.
///
/// # Errors
///
/// Returns an error if `document` does not parse as a compose file.
pub fn collect_images(document: &str) -> Result<Vec<String>, ComposeError> {
    let file: ComposeFile = serde_yaml::from_str(document)?;
    Ok(file
        .services
        .into_values()
        .filter(|svc| !svc.image.is_empty())
        .map(|svc| svc.image)
        .collect())
}

#[cfg(test)]
mod tests {
    use devx_manifest::{Build, Dep, Health, Service};

    use super::*;

    fn manifest() -> Manifest {
        Manifest::parse(
            br"
version: 1
project:
  name: my-app
  defaultProfile: local
registry:
  prefix: registry.local
profiles:
  local:
    runtime: compose
    services:
      api:
        image: nginx:alpine
        ports: ['8080:80']
        dependsOn: [db]
    deps:
      db:
        kind: postgres
        version: '16'
        env:
          POSTGRES_PASSWORD: postgres
        ports: ['5432:5432']
        volume: db-data:/var/lib/postgresql/data
",
        )
        .expect("parse")
    }

    fn render_local(m: &Manifest, telemetry: bool) -> Result<String, ComposeError> {
        let rewrite = RewriteOptions {
            registry_prefix: m.registry.prefix.clone(),
            lockfile: None,
        };
        render(&RenderInput {
            manifest: m,
            profile_name: "local",
            profile: m.profile("local").expect("profile"),
            rewrite: &rewrite,
            catalog: &DepCatalog::default(),
            telemetry,
        })
    }

    #[test]
    fn renders_services_deps_network_and_volume() {
        let m = manifest();
        let out = render_local(&m, false).expect("render");
        let file: ComposeFile = serde_yaml::from_str(&out).expect("reparse");

        let api = &file.services["api"];
        assert_eq!(api.image, "registry.local/nginx:alpine");
        assert_eq!(api.ports, vec!["8080:80"]);
        assert_eq!(api.depends_on, vec!["db"]);
        assert_eq!(api.labels["devx.project"], "my-app");
        assert_eq!(api.labels["devx.profile"], "local");
        assert_eq!(api.labels["devx.service"], "api");
        assert_eq!(api.networks, vec![NETWORK_NAME]);

        let db = &file.services["db"];
        assert_eq!(db.image, "registry.local/postgres:16");
        assert_eq!(db.environment["POSTGRES_PASSWORD"], "postgres");
        assert_eq!(db.volumes, vec!["db-data:/var/lib/postgresql/data"]);

        assert!(file.networks.contains_key(NETWORK_NAME));
        assert!(file.volumes.contains_key("db-data"));
    }

    #[test]
    fn render_is_byte_deterministic() {
        let m = manifest();
        let first = render_local(&m, true).expect("render");
        let second = render_local(&m, true).expect("render");
        assert_eq!(first, second);
    }

    #[test]
    fn build_context_clears_image() {
        let mut m = manifest();
        let prof = m.profiles.get_mut("local").expect("profile");
        let _ = prof.services.insert(
            "web".into(),
            Service {
                image: "ignored".into(),
                build: Some(Build {
                    context: "./web".into(),
                    dockerfile: "Dockerfile.dev".into(),
                }),
                ..Service::default()
            },
        );
        let out = render_local(&m, false).expect("render");
        let file: ComposeFile = serde_yaml::from_str(&out).expect("reparse");
        let web = &file.services["web"];
        assert!(web.image.is_empty());
        let build = web.build.as_ref().expect("build");
        assert_eq!(build.context, "./web");
        assert_eq!(build.dockerfile, "Dockerfile.dev");
    }

    #[test]
    fn health_probe_becomes_wget_healthcheck() {
        let mut m = manifest();
        let prof = m.profiles.get_mut("local").expect("profile");
        prof.services.get_mut("api").expect("api").health = Some(Health {
            http_get: "http://localhost:8080/healthz".into(),
            interval: "5s".into(),
            retries: 3,
        });
        let out = render_local(&m, false).expect("render");
        let file: ComposeFile = serde_yaml::from_str(&out).expect("reparse");
        let check = file.services["api"].healthcheck.as_ref().expect("check");
        assert_eq!(check.test[0], "CMD-SHELL");
        assert!(check.test[1].contains("http://localhost:8080/healthz"));
        assert_eq!(check.interval, "5s");
        assert_eq!(check.retries, 3);
    }

    #[test]
    fn telemetry_injects_fixed_stack() {
        let m = manifest();
        let out = render_local(&m, true).expect("render");
        let file: ComposeFile = serde_yaml::from_str(&out).expect("reparse");
        for name in [
            "devx-telemetry-grafana",
            "devx-telemetry-loki",
            "devx-telemetry-prometheus",
            "devx-telemetry-alloy",
            "devx-telemetry-cadvisor",
            "devx-telemetry-docker-meta",
        ] {
            assert!(file.services.contains_key(name), "missing {name}");
        }
        let grafana = &file.services["devx-telemetry-grafana"];
        assert!(
            grafana
                .depends_on
                .iter()
                .any(|d| d == "devx-telemetry-loki")
        );
        assert!(file.volumes.contains_key("devx-telemetry-grafana-data"));
    }

    #[test]
    fn telemetry_collision_is_a_hard_error() {
        let mut m = manifest();
        let prof = m.profiles.get_mut("local").expect("profile");
        let _ = prof.services.insert(
            "devx-telemetry-grafana".into(),
            Service {
                image: "impostor".into(),
                ..Service::default()
            },
        );
        let err = render_local(&m, true).expect_err("should fail");
        assert!(
            matches!(err, ComposeError::TelemetryCollision { ref name } if name == "devx-telemetry-grafana"),
            "got: {err}"
        );
    }

    #[test]
    fn unsupported_dep_kind_fails_synthesis() {
        let mut m = manifest();
        let prof = m.profiles.get_mut("local").expect("profile");
        let _ = prof.deps.insert(
            "bus".into(),
            Dep {
                kind: "nats".into(),
                ..Dep::default()
            },
        );
        let err = render_local(&m, false).expect_err("should fail");
        assert!(matches!(err, ComposeError::UnknownDepKind { .. }));
    }

    #[test]
    fn collect_images_skips_built_services() {
        let mut m = manifest();
        let prof = m.profiles.get_mut("local").expect("profile");
        let _ = prof.services.insert(
            "web".into(),
            Service {
                build: Some(Build {
                    context: "./web".into(),
                    ..Build::default()
                }),
                ..Service::default()
            },
        );
        let out = render_local(&m, false).expect("render");
        let images = collect_images(&out).expect("collect");
        assert_eq!(
            images,
            vec!["registry.local/nginx:alpine", "registry.local/postgres:16"]
        );
    }
}
