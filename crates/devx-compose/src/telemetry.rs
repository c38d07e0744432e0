//! The optional observability stack.
//!
//! A fixed topology injected into the rendered document when telemetry is
//! enabled: Prometheus (metrics), Loki (logs), Grafana (dashboards),
//! Alloy (log shipping), cAdvisor (per-container resource metrics), and a
//! small docker-meta exporter that lets cAdvisor metrics be joined with
//! container names. The stack is static per toggle — not user-configured
//! beyond the deployment name prefix.

use std::collections::BTreeMap;

use devx_common::constants::{
    LABEL_PROFILE, LABEL_PROJECT, LABEL_SERVICE, NETWORK_NAME, TELEMETRY_NAME,
};
use devx_manifest::Manifest;

use crate::render::ComposeService;
use crate::rewrite::{RewriteOptions, rewrite_image};

const GRAFANA_IMAGE: &str = "grafana/grafana:10.4.3";
const LOKI_IMAGE: &str = "grafana/loki:2.9.2";
const PROMETHEUS_IMAGE: &str = "prom/prometheus:v2.50.1";
const ALLOY_IMAGE: &str = "grafana/alloy:v1.1.1";
const CADVISOR_IMAGE: &str = "gcr.io/cadvisor/cadvisor:v0.49.1";
const DOCKER_META_IMAGE: &str = "python:3.12-alpine";

/// A configuration payload written alongside the compose document.
#[derive(Debug, Clone)]
pub struct Asset {
    /// Path relative to the artifact directory.
    pub path: &'static str,
    /// File content.
    pub content: String,
}

/// Returns the telemetry service set and the named volumes it requires.
///
/// Service names are `devx-telemetry-*`; collisions with user services
/// are the caller's responsibility to reject.
pub(crate) fn telemetry_services(
    manifest: &Manifest,
    profile_name: &str,
    rewrite: &RewriteOptions,
) -> (BTreeMap<String, ComposeService>, Vec<String>) {
    let mut services = BTreeMap::new();

    let grafana = format!("{TELEMETRY_NAME}-grafana");
    let loki = format!("{TELEMETRY_NAME}-loki");
    let prometheus = format!("{TELEMETRY_NAME}-prometheus");
    let alloy = format!("{TELEMETRY_NAME}-alloy");
    let cadvisor = format!("{TELEMETRY_NAME}-cadvisor");
    let docker_meta = format!("{TELEMETRY_NAME}-docker-meta");

    let _ = services.insert(
        grafana.clone(),
        ComposeService {
            image: rewrite_image(GRAFANA_IMAGE, rewrite),
            ports: vec!["3000".to_owned()],
            depends_on: vec![loki.clone(), prometheus.clone()],
            labels: labels(manifest, profile_name, &grafana),
            networks: vec![NETWORK_NAME.to_owned()],
            environment: BTreeMap::from([
                ("GF_ANALYTICS_REPORTING_ENABLED".to_owned(), "false".to_owned()),
                ("GF_AUTH_ANONYMOUS_ENABLED".to_owned(), "true".to_owned()),
                ("GF_AUTH_ANONYMOUS_ORG_ROLE".to_owned(), "Admin".to_owned()),
                ("GF_USERS_DEFAULT_THEME".to_owned(), "light".to_owned()),
            ]),
            volumes: vec![
                format!("{TELEMETRY_NAME}-grafana-data:/var/lib/grafana"),
                "./telemetry/grafana/provisioning/datasources/devx.yaml:/etc/grafana/provisioning/datasources/devx.yaml:ro".to_owned(),
                "./telemetry/grafana/provisioning/dashboards/devx.yaml:/etc/grafana/provisioning/dashboards/devx.yaml:ro".to_owned(),
                "./telemetry/grafana/dashboards:/var/lib/grafana/dashboards:ro".to_owned(),
            ],
            ..ComposeService::default()
        },
    );

    let _ = services.insert(
        loki.clone(),
        ComposeService {
            image: rewrite_image(LOKI_IMAGE, rewrite),
            labels: labels(manifest, profile_name, &loki),
            networks: vec![NETWORK_NAME.to_owned()],
            command: vec!["-config.file=/etc/loki/local-config.yaml".to_owned()],
            volumes: vec![
                format!("{TELEMETRY_NAME}-loki-data:/loki"),
                "./telemetry/loki-config.yaml:/etc/loki/local-config.yaml:ro".to_owned(),
            ],
            ..ComposeService::default()
        },
    );

    let _ = services.insert(
        prometheus.clone(),
        ComposeService {
            image: rewrite_image(PROMETHEUS_IMAGE, rewrite),
            labels: labels(manifest, profile_name, &prometheus),
            networks: vec![NETWORK_NAME.to_owned()],
            volumes: vec![
                format!("{TELEMETRY_NAME}-prometheus-data:/prometheus"),
                "./telemetry/prometheus.yml:/etc/prometheus/prometheus.yml:ro".to_owned(),
            ],
            ..ComposeService::default()
        },
    );

    let _ = services.insert(
        alloy.clone(),
        ComposeService {
            image: rewrite_image(ALLOY_IMAGE, rewrite),
            labels: labels(manifest, profile_name, &alloy),
            networks: vec![NETWORK_NAME.to_owned()],
            command: vec![
                "run".to_owned(),
                "--server.http.listen-addr=0.0.0.0:12345".to_owned(),
                "/etc/alloy/config.alloy".to_owned(),
            ],
            volumes: vec![
                "./telemetry/alloy-config.alloy:/etc/alloy/config.alloy:ro".to_owned(),
                "/var/run/docker.sock:/var/run/docker.sock:ro".to_owned(),
            ],
            ..ComposeService::default()
        },
    );

    // /var/run must be rw so cAdvisor can reach the Docker socket and
    // resolve container names.
    let _ = services.insert(
        cadvisor.clone(),
        ComposeService {
            image: rewrite_image(CADVISOR_IMAGE, rewrite),
            labels: labels(manifest, profile_name, &cadvisor),
            networks: vec![NETWORK_NAME.to_owned()],
            privileged: true,
            volumes: vec![
                "/:/rootfs:ro".to_owned(),
                "/var/run:/var/run:rw".to_owned(),
                "/sys:/sys:ro".to_owned(),
                "/var/lib/docker/:/var/lib/docker:ro".to_owned(),
                "/dev/disk/:/dev/disk:ro".to_owned(),
            ],
            ..ComposeService::default()
        },
    );

    // Exposes container ID to name/label mappings as docker_container_info
    // (the join target for cAdvisor series, which carry raw IDs only)
    // plus per-container network byte counters from the stats API.
    let _ = services.insert(
        docker_meta.clone(),
        ComposeService {
            image: rewrite_image(DOCKER_META_IMAGE, rewrite),
            labels: labels(manifest, profile_name, &docker_meta),
            networks: vec![NETWORK_NAME.to_owned()],
            command: vec!["python".to_owned(), "/app/exporter.py".to_owned()],
            volumes: vec![
                "./telemetry/docker-meta-exporter.py:/app/exporter.py:ro".to_owned(),
                "/var/run/docker.sock:/var/run/docker.sock:ro".to_owned(),
            ],
            ..ComposeService::default()
        },
    );

    let volumes = vec![
        format!("{TELEMETRY_NAME}-grafana-data"),
        format!("{TELEMETRY_NAME}-loki-data"),
        format!("{TELEMETRY_NAME}-prometheus-data"),
    ];

    (services, volumes)
}

fn labels(
    manifest: &Manifest,
    profile_name: &str,
    service: &str,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_PROJECT.to_owned(), manifest.project.name.clone()),
        (LABEL_PROFILE.to_owned(), profile_name.to_owned()),
        (LABEL_SERVICE.to_owned(), service.to_owned()),
    ])
}

/// Returns the fixed configuration bundle written next to the compose
/// document when the stack is enabled; empty when disabled.
#[must_use]
pub fn telemetry_assets(enable: bool) -> Vec<Asset> {
    if !enable {
        return Vec::new();
    }

    vec![
        Asset {
            path: "telemetry/loki-config.yaml",
            content: loki_config(),
        },
        Asset {
            path: "telemetry/prometheus.yml",
            content: prometheus_config(TELEMETRY_NAME),
        },
        Asset {
            path: "telemetry/alloy-config.alloy",
            content: alloy_config(TELEMETRY_NAME),
        },
        Asset {
            path: "telemetry/grafana/provisioning/datasources/devx.yaml",
            content: grafana_datasources(TELEMETRY_NAME),
        },
        Asset {
            path: "telemetry/grafana/provisioning/dashboards/devx.yaml",
            content: grafana_dashboard_provisioning(),
        },
        Asset {
            path: "telemetry/grafana/dashboards/logs.json",
            content: grafana_logs_dashboard(),
        },
        Asset {
            path: "telemetry/grafana/dashboards/resources.json",
            content: grafana_resources_dashboard(),
        },
        Asset {
            path: "telemetry/grafana/dashboards/log-analytics.json",
            content: grafana_log_analytics_dashboard(),
        },
        Asset {
            path: "telemetry/grafana/dashboards/health.json",
            content: grafana_service_health_dashboard(),
        },
        Asset {
            path: "telemetry/docker-meta-exporter.py",
            content: docker_meta_exporter_script(),
        },
    ]
}

fn loki_config() -> String {
    r"auth_enabled: false

server:
  http_listen_port: 3100

common:
  instance_addr: 127.0.0.1
  path_prefix: /loki
  storage:
    filesystem:
      chunks_directory: /loki/chunks
      rules_directory: /loki/rules
  replication_factor: 1
  ring:
    kvstore:
      store: inmemory

schema_config:
  configs:
    - from: 2024-01-01
      store: tsdb
      object_store: filesystem
      schema: v13
      index:
        prefix: index_
        period: 24h

ruler:
  alertmanager_url: http://localhost:9093
"
    .to_owned()
}

fn prometheus_config(stack: &str) -> String {
    format!(
        r#"global:
  scrape_interval: 15s

scrape_configs:
  - job_name: "prometheus"
    static_configs:
      - targets: ["{stack}-prometheus:9090"]
  - job_name: "loki"
    static_configs:
      - targets: ["{stack}-loki:3100"]
  - job_name: "cadvisor"
    static_configs:
      - targets: ["{stack}-cadvisor:8080"]
  - job_name: "docker-meta"
    static_configs:
      - targets: ["{stack}-docker-meta:9101"]
"#
    )
}

fn alloy_config(stack: &str) -> String {
    format!(
        r#"discovery.docker "containers" {{
  host             = "unix:///var/run/docker.sock"
  refresh_interval = "5s"
}}

discovery.relabel "containers" {{
  targets = discovery.docker.containers.targets

  rule {{
    source_labels = ["__meta_docker_container_name"]
    regex         = "/?(.+)"
    target_label  = "container"
  }}
  rule {{
    source_labels = ["__meta_docker_container_label_com_docker_compose_project"]
    target_label  = "compose_project"
  }}
  rule {{
    source_labels = ["__meta_docker_container_label_com_docker_compose_service"]
    target_label  = "compose_service"
  }}
  rule {{
    source_labels = ["__meta_docker_container_label_com_docker_compose_project"]
    regex         = ".+"
    action        = "keep"
  }}
}}

loki.source.docker "containers" {{
  host             = "unix:///var/run/docker.sock"
  targets          = discovery.relabel.containers.output
  forward_to       = [loki.write.local.receiver]
  refresh_interval = "5s"
}}

loki.write "local" {{
  endpoint {{
    url = "http://{stack}-loki:3100/loki/api/v1/push"
  }}
}}
"#
    )
}

fn grafana_datasources(stack: &str) -> String {
    format!(
        r"apiVersion: 1

datasources:
  - name: Prometheus
    type: prometheus
    access: proxy
    url: http://{stack}-prometheus:9090
    isDefault: true
  - name: Loki
    type: loki
    access: proxy
    url: http://{stack}-loki:3100
"
    )
}

fn grafana_dashboard_provisioning() -> String {
    r"apiVersion: 1

providers:
  - name: devx
    type: file
    disableDeletion: false
    updateIntervalSeconds: 10
    allowUiUpdates: true
    options:
      path: /var/lib/grafana/dashboards
      foldersFromFilesStructure: false
"
    .to_owned()
}

fn grafana_logs_dashboard() -> String {
    r#"{
  "annotations": { "list": [] },
  "editable": true,
  "graphTooltip": 1,
  "panels": [
    {
      "datasource": { "type": "loki", "uid": "${DS_LOKI}" },
      "gridPos": { "h": 7, "w": 24, "x": 0, "y": 0 },
      "id": 1,
      "targets": [
        {
          "expr": "sum by (compose_service) (count_over_time({compose_service=~\"$service\"}[$__interval]))",
          "legendFormat": "{{compose_service}}",
          "queryType": "range",
          "refId": "A"
        }
      ],
      "title": "Log Rate by Service",
      "type": "timeseries"
    },
    {
      "datasource": { "type": "loki", "uid": "${DS_LOKI}" },
      "gridPos": { "h": 20, "w": 24, "x": 0, "y": 7 },
      "id": 2,
      "options": { "showLabels": true, "showTime": true, "sortOrder": "Descending", "wrapLogMessage": false },
      "targets": [
        { "expr": "{compose_service=~\"$service\"} |~ \"(?i)$search\"", "queryType": "range", "refId": "A" }
      ],
      "title": "Log Stream",
      "type": "logs"
    }
  ],
  "refresh": "5s",
  "schemaVersion": 38,
  "tags": ["devx", "logs"],
  "templating": {
    "list": [
      {
        "current": {},
        "hide": 2,
        "name": "DS_LOKI",
        "options": [],
        "query": "loki",
        "refresh": 1,
        "type": "datasource"
      },
      {
        "current": { "selected": true, "text": ["All"], "value": ["$__all"] },
        "datasource": { "type": "loki", "uid": "${DS_LOKI}" },
        "definition": "label_values(compose_service)",
        "includeAll": true,
        "label": "Service",
        "multi": true,
        "name": "service",
        "options": [],
        "query": "label_values(compose_service)",
        "refresh": 2,
        "sort": 1,
        "type": "query"
      },
      {
        "current": { "selected": false, "text": "", "value": "" },
        "label": "Log filter (regex)",
        "name": "search",
        "options": [{ "selected": false, "text": "", "value": "" }],
        "type": "textbox"
      }
    ]
  },
  "time": { "from": "now-1h", "to": "now" },
  "title": "Container Logs",
  "uid": "devx-logs"
}
"#
    .to_owned()
}

// cAdvisor series carry only raw container IDs, so every CPU and memory
// query joins on(id) against docker_container_info to pick up the
// compose_service label. Network series come from the docker-meta
// exporter directly and are already labelled.
fn grafana_resources_dashboard() -> String {
    r#"{
  "annotations": { "list": [] },
  "editable": true,
  "graphTooltip": 1,
  "panels": [
    {
      "collapsed": false,
      "gridPos": { "h": 1, "w": 24, "x": 0, "y": 0 },
      "id": 30,
      "title": "Log Activity",
      "type": "row"
    },
    {
      "datasource": { "type": "loki", "uid": "${DS_LOKI}" },
      "gridPos": { "h": 8, "w": 12, "x": 0, "y": 1 },
      "id": 10,
      "targets": [
        {
          "expr": "sum by (container) (count_over_time({compose_service=~\"$service\"}[$__interval]))",
          "legendFormat": "{{container}}",
          "queryType": "range",
          "refId": "A"
        }
      ],
      "title": "Log Rate",
      "type": "timeseries"
    },
    {
      "datasource": { "type": "loki", "uid": "${DS_LOKI}" },
      "gridPos": { "h": 8, "w": 12, "x": 12, "y": 1 },
      "id": 11,
      "targets": [
        {
          "expr": "sum by (compose_service) (count_over_time({compose_service=~\"$service\"} |~ \"(?i)(error|exception|fatal|panic)\" [$__interval]))",
          "legendFormat": "{{compose_service}} errors",
          "queryType": "range",
          "refId": "A"
        }
      ],
      "title": "Error Rate",
      "type": "timeseries"
    },
    {
      "collapsed": false,
      "gridPos": { "h": 1, "w": 24, "x": 0, "y": 9 },
      "id": 20,
      "title": "CPU (requires cAdvisor + docker-meta)",
      "type": "row"
    },
    {
      "datasource": { "type": "prometheus", "uid": "${DS_PROMETHEUS}" },
      "fieldConfig": { "defaults": { "unit": "percent" }, "overrides": [] },
      "gridPos": { "h": 8, "w": 24, "x": 0, "y": 10 },
      "id": 1,
      "targets": [
        {
          "expr": "sum by (compose_service) (rate(container_cpu_usage_seconds_total{id=~\"/docker/.+\"}[$__rate_interval]) * on(id) group_left(compose_service) docker_container_info{compose_service=~\"$service\"}) * 100",
          "legendFormat": "{{compose_service}}",
          "refId": "A"
        }
      ],
      "title": "CPU Usage %",
      "type": "timeseries"
    },
    {
      "collapsed": false,
      "gridPos": { "h": 1, "w": 24, "x": 0, "y": 18 },
      "id": 21,
      "title": "Memory (requires cAdvisor)",
      "type": "row"
    },
    {
      "datasource": { "type": "prometheus", "uid": "${DS_PROMETHEUS}" },
      "fieldConfig": { "defaults": { "unit": "bytes" }, "overrides": [] },
      "gridPos": { "h": 8, "w": 12, "x": 0, "y": 19 },
      "id": 2,
      "targets": [
        {
          "expr": "sum by (compose_service) (container_memory_usage_bytes{id=~\"/docker/.+\"} * on(id) group_left(compose_service) docker_container_info{compose_service=~\"$service\"})",
          "legendFormat": "{{compose_service}}",
          "refId": "A"
        }
      ],
      "title": "Memory Usage",
      "type": "timeseries"
    },
    {
      "datasource": { "type": "prometheus", "uid": "${DS_PROMETHEUS}" },
      "fieldConfig": { "defaults": { "unit": "bytes" }, "overrides": [] },
      "gridPos": { "h": 8, "w": 12, "x": 12, "y": 19 },
      "id": 3,
      "targets": [
        {
          "expr": "sum by (compose_service) (container_memory_cache{id=~\"/docker/.+\"} * on(id) group_left(compose_service) docker_container_info{compose_service=~\"$service\"})",
          "legendFormat": "{{compose_service}} (cache)",
          "refId": "A"
        }
      ],
      "title": "Memory Cache",
      "type": "timeseries"
    },
    {
      "collapsed": false,
      "gridPos": { "h": 1, "w": 24, "x": 0, "y": 27 },
      "id": 22,
      "title": "Network (requires cAdvisor)",
      "type": "row"
    },
    {
      "datasource": { "type": "prometheus", "uid": "${DS_PROMETHEUS}" },
      "fieldConfig": { "defaults": { "unit": "Bps" }, "overrides": [] },
      "gridPos": { "h": 8, "w": 12, "x": 0, "y": 28 },
      "id": 4,
      "targets": [
        {
          "expr": "sum by (compose_service) (rate(docker_container_network_rx_bytes_total{compose_service=~\"$service\", compose_service!=\"\"}[$__rate_interval]))",
          "legendFormat": "{{compose_service}}",
          "refId": "A"
        }
      ],
      "title": "Network Rx (per container)",
      "type": "timeseries"
    },
    {
      "datasource": { "type": "prometheus", "uid": "${DS_PROMETHEUS}" },
      "fieldConfig": { "defaults": { "unit": "Bps" }, "overrides": [] },
      "gridPos": { "h": 8, "w": 12, "x": 12, "y": 28 },
      "id": 5,
      "targets": [
        {
          "expr": "sum by (compose_service) (rate(docker_container_network_tx_bytes_total{compose_service=~\"$service\", compose_service!=\"\"}[$__rate_interval]))",
          "legendFormat": "{{compose_service}}",
          "refId": "A"
        }
      ],
      "title": "Network Tx (per container)",
      "type": "timeseries"
    }
  ],
  "refresh": "10s",
  "schemaVersion": 38,
  "tags": ["devx", "metrics", "resources"],
  "templating": {
    "list": [
      {
        "current": {},
        "hide": 2,
        "name": "DS_PROMETHEUS",
        "options": [],
        "query": "prometheus",
        "refresh": 1,
        "type": "datasource"
      },
      {
        "current": {},
        "hide": 2,
        "name": "DS_LOKI",
        "options": [],
        "query": "loki",
        "refresh": 1,
        "type": "datasource"
      },
      {
        "current": { "selected": true, "text": ["All"], "value": ["$__all"] },
        "datasource": { "type": "loki", "uid": "${DS_LOKI}" },
        "definition": "label_values(compose_service)",
        "includeAll": true,
        "label": "Service",
        "multi": true,
        "name": "service",
        "options": [],
        "query": "label_values(compose_service)",
        "refresh": 2,
        "sort": 1,
        "type": "query"
      }
    ]
  },
  "time": { "from": "now-30m", "to": "now" },
  "title": "Container Resources",
  "uid": "devx-resources"
}
"#
    .to_owned()
}

fn grafana_log_analytics_dashboard() -> String {
    r#"{
  "annotations": { "list": [] },
  "editable": true,
  "graphTooltip": 1,
  "panels": [
    {
      "datasource": { "type": "loki", "uid": "${DS_LOKI}" },
      "fieldConfig": {
        "defaults": {
          "thresholds": { "mode": "absolute", "steps": [
            { "color": "green", "value": null },
            { "color": "red", "value": 1 }
          ]},
          "unit": "short"
        },
        "overrides": []
      },
      "gridPos": { "h": 4, "w": 4, "x": 0, "y": 0 },
      "id": 1,
      "options": { "colorMode": "background", "graphMode": "none", "reduceOptions": { "calcs": ["sum"] } },
      "targets": [
        {
          "expr": "sum(count_over_time({compose_project=~\".+\"} |~ \"(?i)(error|exception|fatal|panic)\" [$__range]))",
          "queryType": "instant",
          "refId": "A"
        }
      ],
      "title": "Errors",
      "type": "stat"
    },
    {
      "datasource": { "type": "loki", "uid": "${DS_LOKI}" },
      "fieldConfig": {
        "defaults": {
          "thresholds": { "mode": "absolute", "steps": [
            { "color": "green", "value": null },
            { "color": "yellow", "value": 1 }
          ]},
          "unit": "short"
        },
        "overrides": []
      },
      "gridPos": { "h": 4, "w": 4, "x": 4, "y": 0 },
      "id": 2,
      "options": { "colorMode": "background", "graphMode": "none", "reduceOptions": { "calcs": ["sum"] } },
      "targets": [
        {
          "expr": "sum(count_over_time({compose_project=~\".+\"} |~ \"(?i)warn\" [$__range]))",
          "queryType": "instant",
          "refId": "A"
        }
      ],
      "title": "Warnings",
      "type": "stat"
    },
    {
      "datasource": { "type": "loki", "uid": "${DS_LOKI}" },
      "fieldConfig": {
        "defaults": {
          "thresholds": { "mode": "absolute", "steps": [{ "color": "blue", "value": null }]},
          "unit": "short"
        },
        "overrides": []
      },
      "gridPos": { "h": 4, "w": 4, "x": 8, "y": 0 },
      "id": 3,
      "options": { "colorMode": "value", "graphMode": "area", "reduceOptions": { "calcs": ["sum"] } },
      "targets": [
        {
          "expr": "sum(count_over_time({compose_project=~\".+\"}[$__range]))",
          "queryType": "instant",
          "refId": "A"
        }
      ],
      "title": "Total Log Lines",
      "type": "stat"
    },
    {
      "collapsed": false,
      "gridPos": { "h": 1, "w": 24, "x": 0, "y": 4 },
      "id": 20,
      "title": "Log Volume",
      "type": "row"
    },
    {
      "datasource": { "type": "loki", "uid": "${DS_LOKI}" },
      "fieldConfig": {
        "defaults": { "custom": { "fillOpacity": 30, "stacking": { "group": "A", "mode": "normal" } } },
        "overrides": []
      },
      "gridPos": { "h": 8, "w": 24, "x": 0, "y": 5 },
      "id": 4,
      "targets": [
        {
          "expr": "sum by (compose_service) (count_over_time({compose_project=~\".+\"}[$__interval]))",
          "legendFormat": "{{compose_service}}",
          "queryType": "range",
          "refId": "A"
        }
      ],
      "title": "Log Volume by Service (stacked)",
      "type": "timeseries"
    },
    {
      "collapsed": false,
      "gridPos": { "h": 1, "w": 24, "x": 0, "y": 13 },
      "id": 21,
      "title": "Error Analysis",
      "type": "row"
    },
    {
      "datasource": { "type": "loki", "uid": "${DS_LOKI}" },
      "gridPos": { "h": 8, "w": 24, "x": 0, "y": 14 },
      "id": 5,
      "targets": [
        {
          "expr": "sum by (compose_service) (count_over_time({compose_project=~\".+\"} |~ \"(?i)(error|exception|fatal|panic)\" [$__interval]))",
          "legendFormat": "{{compose_service}} errors",
          "queryType": "range",
          "refId": "A"
        }
      ],
      "title": "Error Rate by Service",
      "type": "timeseries"
    },
    {
      "datasource": { "type": "loki", "uid": "${DS_LOKI}" },
      "gridPos": { "h": 14, "w": 24, "x": 0, "y": 22 },
      "id": 6,
      "options": { "showLabels": true, "showTime": true, "sortOrder": "Descending", "wrapLogMessage": false },
      "targets": [
        {
          "expr": "{compose_project=~\".+\"} |~ \"(?i)(error|exception|fatal|panic)\"",
          "queryType": "range",
          "refId": "A"
        }
      ],
      "title": "Error / Exception Log Stream",
      "type": "logs"
    }
  ],
  "refresh": "30s",
  "schemaVersion": 38,
  "tags": ["devx", "logs", "analytics"],
  "templating": {
    "list": [
      {
        "current": {},
        "hide": 2,
        "name": "DS_LOKI",
        "options": [],
        "query": "loki",
        "refresh": 1,
        "type": "datasource"
      }
    ]
  },
  "time": { "from": "now-1h", "to": "now" },
  "title": "Log Analytics",
  "uid": "devx-log-analytics"
}
"#
    .to_owned()
}

fn grafana_service_health_dashboard() -> String {
    r#"{
  "annotations": { "list": [] },
  "editable": true,
  "graphTooltip": 1,
  "panels": [
    {
      "datasource": { "type": "loki", "uid": "${DS_LOKI}" },
      "fieldConfig": {
        "defaults": {
          "thresholds": { "mode": "absolute", "steps": [
            { "color": "red", "value": null },
            { "color": "green", "value": 1 }
          ]},
          "unit": "short"
        },
        "overrides": []
      },
      "gridPos": { "h": 4, "w": 6, "x": 0, "y": 0 },
      "id": 1,
      "options": { "colorMode": "background", "graphMode": "none", "reduceOptions": { "calcs": ["lastNotNull"] } },
      "targets": [
        {
          "expr": "count(sum by (compose_service) (count_over_time({compose_project=~\".+\"}[5m])))",
          "queryType": "instant",
          "refId": "A"
        }
      ],
      "title": "Active Services",
      "type": "stat"
    },
    {
      "datasource": { "type": "loki", "uid": "${DS_LOKI}" },
      "fieldConfig": {
        "defaults": {
          "thresholds": { "mode": "absolute", "steps": [
            { "color": "green", "value": null },
            { "color": "red", "value": 1 }
          ]},
          "unit": "short"
        },
        "overrides": []
      },
      "gridPos": { "h": 4, "w": 6, "x": 6, "y": 0 },
      "id": 2,
      "options": { "colorMode": "background", "graphMode": "none", "reduceOptions": { "calcs": ["sum"] } },
      "targets": [
        {
          "expr": "sum(count_over_time({compose_project=~\".+\"} |~ \"(?i)(error|exception|fatal|panic)\" [$__range]))",
          "queryType": "instant",
          "refId": "A"
        }
      ],
      "title": "Errors",
      "type": "stat"
    },
    {
      "datasource": { "type": "loki", "uid": "${DS_LOKI}" },
      "fieldConfig": {
        "defaults": {
          "thresholds": { "mode": "absolute", "steps": [
            { "color": "green", "value": null },
            { "color": "yellow", "value": 1 }
          ]},
          "unit": "short"
        },
        "overrides": []
      },
      "gridPos": { "h": 4, "w": 6, "x": 12, "y": 0 },
      "id": 3,
      "options": { "colorMode": "background", "graphMode": "none", "reduceOptions": { "calcs": ["sum"] } },
      "targets": [
        {
          "expr": "sum(count_over_time({compose_project=~\".+\"} |~ \"(?i)warn\" [$__range]))",
          "queryType": "instant",
          "refId": "A"
        }
      ],
      "title": "Warnings",
      "type": "stat"
    },
    {
      "datasource": { "type": "loki", "uid": "${DS_LOKI}" },
      "fieldConfig": {
        "defaults": {
          "thresholds": { "mode": "absolute", "steps": [{ "color": "blue", "value": null }]},
          "unit": "short"
        },
        "overrides": []
      },
      "gridPos": { "h": 4, "w": 6, "x": 18, "y": 0 },
      "id": 4,
      "options": { "colorMode": "value", "graphMode": "area", "reduceOptions": { "calcs": ["sum"] } },
      "targets": [
        {
          "expr": "sum(count_over_time({compose_project=~\".+\"}[$__range]))",
          "queryType": "instant",
          "refId": "A"
        }
      ],
      "title": "Log Lines",
      "type": "stat"
    },
    {
      "collapsed": false,
      "gridPos": { "h": 1, "w": 24, "x": 0, "y": 4 },
      "id": 20,
      "title": "Top Services",
      "type": "row"
    },
    {
      "datasource": { "type": "loki", "uid": "${DS_LOKI}" },
      "fieldConfig": {
        "defaults": { "color": { "mode": "continuous-BlPu" }, "unit": "short" },
        "overrides": []
      },
      "gridPos": { "h": 10, "w": 12, "x": 0, "y": 5 },
      "id": 5,
      "options": { "displayMode": "gradient", "orientation": "horizontal", "reduceOptions": { "calcs": ["sum"] }, "showUnfilled": true },
      "targets": [
        {
          "expr": "topk(8, sum by (compose_service) (count_over_time({compose_project=~\".+\"}[$__range])))",
          "legendFormat": "{{compose_service}}",
          "queryType": "instant",
          "refId": "A"
        }
      ],
      "title": "Top by Log Volume",
      "type": "bargauge"
    },
    {
      "datasource": { "type": "loki", "uid": "${DS_LOKI}" },
      "fieldConfig": {
        "defaults": { "color": { "mode": "continuous-RdYlGr" }, "unit": "short" },
        "overrides": []
      },
      "gridPos": { "h": 10, "w": 12, "x": 12, "y": 5 },
      "id": 6,
      "options": { "displayMode": "gradient", "orientation": "horizontal", "reduceOptions": { "calcs": ["sum"] }, "showUnfilled": true },
      "targets": [
        {
          "expr": "topk(8, sum by (compose_service) (count_over_time({compose_project=~\".+\"} |~ \"(?i)(error|exception|fatal|panic)\" [$__range])))",
          "legendFormat": "{{compose_service}}",
          "queryType": "instant",
          "refId": "A"
        }
      ],
      "title": "Top by Error Count",
      "type": "bargauge"
    },
    {
      "collapsed": true,
      "gridPos": { "h": 1, "w": 24, "x": 0, "y": 15 },
      "id": 25,
      "panels": [
        {
          "datasource": { "type": "prometheus", "uid": "${DS_PROMETHEUS}" },
          "fieldConfig": {
            "defaults": { "color": { "mode": "continuous-GrYlRd" }, "unit": "percent" },
            "overrides": []
          },
          "gridPos": { "h": 10, "w": 12, "x": 0, "y": 16 },
          "id": 26,
          "options": { "displayMode": "gradient", "orientation": "horizontal", "reduceOptions": { "calcs": ["lastNotNull"] }, "showUnfilled": true },
          "targets": [
            {
              "expr": "topk(8, sum by (compose_service) (rate(container_cpu_usage_seconds_total{id=~\"/docker/.+\"}[1m]) * on(id) group_left(compose_service) docker_container_info) * 100)",
              "legendFormat": "{{compose_service}}",
              "refId": "A"
            }
          ],
          "title": "Top CPU Consumers",
          "type": "bargauge"
        },
        {
          "datasource": { "type": "prometheus", "uid": "${DS_PROMETHEUS}" },
          "fieldConfig": {
            "defaults": { "color": { "mode": "continuous-BlYlRd" }, "unit": "bytes" },
            "overrides": []
          },
          "gridPos": { "h": 10, "w": 12, "x": 12, "y": 16 },
          "id": 27,
          "options": { "displayMode": "gradient", "orientation": "horizontal", "reduceOptions": { "calcs": ["lastNotNull"] }, "showUnfilled": true },
          "targets": [
            {
              "expr": "topk(8, sum by (compose_service) (container_memory_usage_bytes{id=~\"/docker/.+\"} * on(id) group_left(compose_service) docker_container_info))",
              "legendFormat": "{{compose_service}}",
              "refId": "A"
            }
          ],
          "title": "Top Memory Consumers",
          "type": "bargauge"
        }
      ],
      "title": "Container Metrics (requires cAdvisor)",
      "type": "row"
    },
    {
      "collapsed": false,
      "gridPos": { "h": 1, "w": 24, "x": 0, "y": 16 },
      "id": 22,
      "title": "Recent Errors",
      "type": "row"
    },
    {
      "datasource": { "type": "loki", "uid": "${DS_LOKI}" },
      "gridPos": { "h": 10, "w": 24, "x": 0, "y": 17 },
      "id": 7,
      "options": { "showLabels": true, "showTime": true, "sortOrder": "Descending", "wrapLogMessage": false },
      "targets": [
        {
          "expr": "{compose_project=~\".+\"} |~ \"(?i)(error|exception|fatal|panic)\"",
          "queryType": "range",
          "refId": "A"
        }
      ],
      "title": "Recent Errors (all services)",
      "type": "logs"
    }
  ],
  "refresh": "15s",
  "schemaVersion": 38,
  "tags": ["devx", "health"],
  "templating": {
    "list": [
      {
        "current": {},
        "hide": 2,
        "name": "DS_PROMETHEUS",
        "options": [],
        "query": "prometheus",
        "refresh": 1,
        "type": "datasource"
      },
      {
        "current": {},
        "hide": 2,
        "name": "DS_LOKI",
        "options": [],
        "query": "loki",
        "refresh": 1,
        "type": "datasource"
      }
    ]
  },
  "time": { "from": "now-15m", "to": "now" },
  "title": "Service Health",
  "uid": "devx-health"
}
"#
    .to_owned()
}

// The exporter serves docker_container_info (the join target for
// cAdvisor series) plus per-container network counters taken from the
// Docker stats API. Stats are fetched in parallel and cached on a
// 15-second refresh thread so /metrics never blocks a scrape.
fn docker_meta_exporter_script() -> String {
    r#"import json, socket, threading, time
from http.server import HTTPServer, BaseHTTPRequestHandler


def docker_get(path):
    s = socket.socket(socket.AF_UNIX, socket.SOCK_STREAM)
    s.settimeout(10)
    s.connect('/var/run/docker.sock')
    s.sendall(('GET ' + path + ' HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n').encode())
    data = b''
    while True:
        chunk = s.recv(65536)
        if not chunk:
            break
        data += chunk
    s.close()
    header, _, body = data.partition(b'\r\n\r\n')
    if b'chunked' in header.lower():
        decoded = b''
        while body:
            size_line, _, rest = body.partition(b'\r\n')
            if not size_line:
                break
            size = int(size_line, 16)
            if size == 0:
                break
            decoded += rest[:size]
            body = rest[size + 2:]
        body = decoded
    return json.loads(body)


def esc(v):
    return str(v).replace('\\', '\\\\').replace('"', '\\"').replace('\n', '\\n')


def fetch_stats(cid, out, idx):
    try:
        # one-shot=true skips the 1-second CPU measurement wait
        out[idx] = docker_get('/containers/' + cid + '/stats?stream=false&one-shot=true')
    except Exception:
        try:
            out[idx] = docker_get('/containers/' + cid + '/stats?stream=false')
        except Exception:
            out[idx] = None


_cache = {'body': b'', 'lock': threading.Lock()}


def build():
    try:
        containers = docker_get('/containers/json')
    except Exception as e:
        return ('# error: ' + str(e) + '\n').encode()

    stats_out = [None] * len(containers)
    threads = [threading.Thread(target=fetch_stats, args=(c['Id'], stats_out, i), daemon=True)
               for i, c in enumerate(containers)]
    for t in threads:
        t.start()
    for t in threads:
        t.join(timeout=12)

    lines = [
        '# HELP docker_container_info Container metadata for group_left joins',
        '# TYPE docker_container_info gauge',
        '# HELP docker_container_network_rx_bytes_total Cumulative bytes received per container interface',
        '# TYPE docker_container_network_rx_bytes_total counter',
        '# HELP docker_container_network_tx_bytes_total Cumulative bytes transmitted per container interface',
        '# TYPE docker_container_network_tx_bytes_total counter',
    ]
    for i, c in enumerate(containers):
        full_id = '/docker/' + c['Id']
        name = c['Names'][0].lstrip('/') if c.get('Names') else ''
        lbl = c.get('Labels') or {}
        svc = lbl.get('com.docker.compose.service', '')
        proj = lbl.get('com.docker.compose.project', '')
        base = ('id="' + esc(full_id) + '",name="' + esc(name) +
                '",compose_service="' + esc(svc) + '",compose_project="' + esc(proj) + '"')
        lines.append('docker_container_info{' + base + '} 1')
        st = stats_out[i]
        if st:
            for iface, net in (st.get('networks') or {}).items():
                ilbl = base + ',interface="' + esc(iface) + '"'
                lines.append('docker_container_network_rx_bytes_total{' + ilbl + '} ' + str(net.get('rx_bytes', 0)))
                lines.append('docker_container_network_tx_bytes_total{' + ilbl + '} ' + str(net.get('tx_bytes', 0)))
    return ('\n'.join(lines) + '\n').encode()


def refresh_loop():
    while True:
        body = build()
        with _cache['lock']:
            _cache['body'] = body
        time.sleep(15)


class Handler(BaseHTTPRequestHandler):
    def do_GET(self):
        if self.path != '/metrics':
            self.send_response(404)
            self.end_headers()
            return
        with _cache['lock']:
            body = _cache['body']
        self.send_response(200)
        self.send_header('Content-Type', 'text/plain; version=0.0.4')
        self.send_header('Content-Length', str(len(body)))
        self.end_headers()
        self.wfile.write(body)

    def log_message(self, *args):
        pass


_cache['body'] = build()
threading.Thread(target=refresh_loop, daemon=True).start()
HTTPServer(('', 9101), Handler).serve_forever()
"#
    .to_owned()
}
