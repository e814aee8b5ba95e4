//! Prometheus Operator `ServiceMonitor` generation.
//!
//! The ServiceMonitor kind is not part of k8s-openapi, so the object is built
//! as JSON and applied through the `ApiResource` found by discovery. When the CRD is
//! not installed the controller skips it.

use kube::ResourceExt;
use kube::core::GroupVersionKind;
use serde_json::{Map, Value, json};

use crate::crd::{METRICS_PORT_NAME, Memcached};
use crate::resources::common::{owner_reference, standard_labels};

pub const SERVICE_MONITOR_GROUP: &str = "monitoring.coreos.com";
pub const SERVICE_MONITOR_VERSION: &str = "v1";
pub const SERVICE_MONITOR_KIND: &str = "ServiceMonitor";

pub fn service_monitor_gvk() -> GroupVersionKind {
    GroupVersionKind::gvk(
        SERVICE_MONITOR_GROUP,
        SERVICE_MONITOR_VERSION,
        SERVICE_MONITOR_KIND,
    )
}

/// Build the ServiceMonitor scraping the exporter sidecar.
///
/// Labels are the canonical set plus any `additionalLabels`; canonical keys
/// win on collision.
pub fn build_service_monitor(resource: &Memcached) -> Value {
    let name = resource.name_any();
    let namespace = resource.namespace().unwrap_or_default();
    let config = resource
        .spec
        .enabled_monitoring()
        .and_then(|m| m.service_monitor.as_ref());

    let mut labels = config
        .map(|c| c.additional_labels.clone())
        .unwrap_or_default();
    labels.extend(standard_labels(&name));

    let mut endpoint = Map::new();
    endpoint.insert("port".to_string(), json!(METRICS_PORT_NAME));
    endpoint.insert("path".to_string(), json!("/metrics"));
    if let Some(interval) = config.and_then(|c| c.interval.as_deref()) {
        endpoint.insert("interval".to_string(), json!(interval));
    }
    if let Some(timeout) = config.and_then(|c| c.scrape_timeout.as_deref()) {
        endpoint.insert("scrapeTimeout".to_string(), json!(timeout));
    }

    json!({
        "apiVersion": format!("{SERVICE_MONITOR_GROUP}/{SERVICE_MONITOR_VERSION}"),
        "kind": SERVICE_MONITOR_KIND,
        "metadata": {
            "name": name,
            "namespace": namespace,
            "labels": labels,
            "ownerReferences": [owner_reference(resource)],
        },
        "spec": {
            "selector": {
                "matchLabels": standard_labels(&name),
            },
            "namespaceSelector": {
                "matchNames": [namespace],
            },
            "endpoints": [Value::Object(endpoint)],
        }
    })
}
