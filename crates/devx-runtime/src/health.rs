//! Post-bring-up health convergence.
//!
//! Collects every service with an HTTP probe and polls until all succeed
//! or a deadline elapses. Each round issues its probes concurrently —
//! they are independent and side-effect-free — then sleeps before the
//! next round. The wait honors an external cancellation flag so an
//! interactive parent can abort early.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use devx_manifest::Profile;

use crate::{Result, RuntimeError};

/// One declared HTTP health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    /// Owning service name.
    pub service: String,
    /// URL polled for a 2xx answer.
    pub url: String,
}

/// Timing knobs for the convergence loop. Injectable so tests do not
/// spend two minutes waiting.
#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    /// Pause between rounds.
    pub poll_interval: Duration,
    /// Total budget before the wait fails.
    pub deadline: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            deadline: Duration::from_secs(120),
            request_timeout: Duration::from_secs(2),
        }
    }
}

/// Collects the probes a profile declares, in service-name order.
#[must_use]
pub fn probes_from_profile(profile: &Profile) -> Vec<Probe> {
    profile
        .services
        .iter()
        .filter_map(|(name, svc)| {
            svc.health.as_ref().and_then(|h| {
                if h.http_get.is_empty() {
                    None
                } else {
                    Some(Probe {
                        service: name.clone(),
                        url: h.http_get.clone(),
                    })
                }
            })
        })
        .collect()
}

/// Polls every probe until all converge, the deadline elapses, or the
/// cancellation flag is raised.
///
/// A probe converges on any 2xx response within the request timeout;
/// connection errors, timeouts, and non-2xx statuses all count as
/// pending. Every probe is polled every round, so a service that
/// answered earlier but has since regressed counts as pending again —
/// the wait only succeeds on a round where the whole set is healthy at
/// once.
///
/// # Errors
///
/// Returns [`RuntimeError::ConvergenceTimeout`] listing the pending
/// probes, or [`RuntimeError::Cancelled`] when the flag was raised.
pub fn wait_healthy(probes: &[Probe], opts: &WaitOptions, cancel: &AtomicBool) -> Result<()> {
    if probes.is_empty() {
        return Ok(());
    }

    let client = reqwest::blocking::Client::builder()
        .timeout(opts.request_timeout)
        .build()
        .map_err(|e| RuntimeError::Spawn {
            command: "http client".to_owned(),
            source: std::io::Error::other(e),
        })?;

    let started = Instant::now();

    loop {
        if cancel.load(Ordering::SeqCst) {
            return Err(RuntimeError::Cancelled);
        }

        let pending = poll_round(&client, probes);
        if pending.is_empty() {
            tracing::info!(probes = probes.len(), "all health probes converged");
            return Ok(());
        }
        tracing::debug!(pending = pending.len(), "health probes still pending");

        let elapsed = started.elapsed();
        if elapsed >= opts.deadline {
            return Err(RuntimeError::ConvergenceTimeout {
                deadline_secs: opts.deadline.as_secs(),
                pending,
            });
        }

        let remaining = opts.deadline - elapsed;
        std::thread::sleep(opts.poll_interval.min(remaining));
    }
}

/// Issues one concurrent round, returning the probes still pending in
/// input order. A worker that panics counts its probe as pending.
fn poll_round(client: &reqwest::blocking::Client, probes: &[Probe]) -> Vec<Probe> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = probes
            .iter()
            .map(|probe| scope.spawn(move || probe_succeeds(client, &probe.url)))
            .collect();
        probes
            .iter()
            .zip(handles)
            .filter_map(|(probe, handle)| match handle.join() {
                Ok(true) => None,
                Ok(false) | Err(_) => Some(probe.clone()),
            })
            .collect()
    })
}

fn probe_succeeds(client: &reqwest::blocking::Client, url: &str) -> bool {
    match client.get(url).send() {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use devx_manifest::{Health, Manifest};

    use super::*;

    fn quick_opts() -> WaitOptions {
        WaitOptions {
            poll_interval: Duration::from_millis(50),
            deadline: Duration::from_millis(400),
            request_timeout: Duration::from_millis(200),
        }
    }

    /// Serves 200 on every request until dropped.
    fn ok_server() -> (tiny_http::Server, String) {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind");
        let url = format!("http://{}/healthz", server.server_addr());
        (server, url)
    }

    fn serve_ok(server: Arc<tiny_http::Server>) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            while let Ok(Some(request)) = server.recv_timeout(Duration::from_secs(2)) {
                let _ = request.respond(tiny_http::Response::from_string("ok"));
            }
        })
    }

    #[test]
    fn no_probes_succeeds_immediately() {
        let cancel = AtomicBool::new(false);
        wait_healthy(&[], &quick_opts(), &cancel).expect("empty probe set");
    }

    #[test]
    fn converges_when_all_probes_answer() {
        let (server, url) = ok_server();
        let server = Arc::new(server);
        let handle = serve_ok(server.clone());

        let probes = vec![Probe {
            service: "api".into(),
            url,
        }];
        let cancel = AtomicBool::new(false);
        wait_healthy(&probes, &quick_opts(), &cancel).expect("should converge");

        server.unblock();
        handle.join().expect("join");
    }

    #[test]
    fn timeout_names_only_the_non_converged_probe() {
        let (server, ok_url) = ok_server();
        let server = Arc::new(server);
        let handle = serve_ok(server.clone());

        let probes = vec![
            Probe {
                service: "api".into(),
                url: ok_url,
            },
            Probe {
                service: "worker".into(),
                // Reserved address; connections fail fast.
                url: "http://127.0.0.1:1/healthz".into(),
            },
        ];
        let cancel = AtomicBool::new(false);
        let err = wait_healthy(&probes, &quick_opts(), &cancel).expect_err("should time out");
        match err {
            RuntimeError::ConvergenceTimeout { pending, .. } => {
                assert_eq!(pending.len(), 1);
                assert_eq!(pending[0].service, "worker");
            }
            other => panic!("expected timeout, got {other}"),
        }

        server.unblock();
        handle.join().expect("join");
    }

    /// Serves 200 on the first request, 500 on every later one.
    fn serve_ok_once_then_error(server: Arc<tiny_http::Server>) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            let mut healthy = true;
            while let Ok(Some(request)) = server.recv_timeout(Duration::from_secs(2)) {
                let response = if healthy {
                    tiny_http::Response::from_string("ok")
                } else {
                    tiny_http::Response::from_string("boom")
                        .with_status_code(tiny_http::StatusCode(500))
                };
                healthy = false;
                let _ = request.respond(response);
            }
        })
    }

    #[test]
    fn regressed_service_counts_as_pending_again() {
        let (server, api_url) = ok_server();
        let server = Arc::new(server);
        let handle = serve_ok_once_then_error(server.clone());

        // The worker never answers, so the wait keeps polling past the
        // round where api first converged.
        let probes = vec![
            Probe {
                service: "api".into(),
                url: api_url,
            },
            Probe {
                service: "worker".into(),
                url: "http://127.0.0.1:1/healthz".into(),
            },
        ];
        let cancel = AtomicBool::new(false);
        let err = wait_healthy(&probes, &quick_opts(), &cancel).expect_err("should time out");
        match err {
            RuntimeError::ConvergenceTimeout { pending, .. } => {
                assert!(
                    pending.iter().any(|p| p.service == "api"),
                    "api regressed after its first answer and must be reported, got {pending:?}"
                );
            }
            other => panic!("expected timeout, got {other}"),
        }

        server.unblock();
        handle.join().expect("join");
    }

    #[test]
    fn cancellation_aborts_the_wait() {
        let probes = vec![Probe {
            service: "api".into(),
            url: "http://127.0.0.1:1/healthz".into(),
        }];
        let cancel = AtomicBool::new(true);
        let err = wait_healthy(&probes, &quick_opts(), &cancel).expect_err("should cancel");
        assert!(matches!(err, RuntimeError::Cancelled));
    }

    #[test]
    fn probes_collected_from_profile_in_name_order() {
        let manifest = Manifest::parse(
            br"
version: 1
project:
  name: app
  defaultProfile: local
profiles:
  local:
    services:
      zeta:
        image: img
        health:
          httpGet: http://localhost:9000/healthz
      api:
        image: img
        health:
          httpGet: http://localhost:8080/healthz
      silent:
        image: img
",
        )
        .expect("parse");
        let probes = probes_from_profile(manifest.profile("local").expect("profile"));
        assert_eq!(probes.len(), 2);
        assert_eq!(probes[0].service, "api");
        assert_eq!(probes[1].service, "zeta");
    }

    #[test]
    fn empty_http_get_is_not_a_probe() {
        let mut profile = Profile::default();
        let _ = profile.services.insert(
            "api".into(),
            devx_manifest::Service {
                image: "img".into(),
                health: Some(Health::default()),
                ..devx_manifest::Service::default()
            },
        );
        assert!(probes_from_profile(&profile).is_empty());
    }
}
