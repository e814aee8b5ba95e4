//! Common resource generation utilities.
//!
//! Label policy, owner references and the port layout shared by the Service
//! and the NetworkPolicy.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

use crate::crd::{
    MEMCACHED_PORT, MEMCACHED_PORT_NAME, MEMCACHED_TLS_PORT, MEMCACHED_TLS_PORT_NAME, METRICS_PORT,
    METRICS_PORT_NAME, Memcached, MemcachedSpec,
};

pub const LABEL_NAME: &str = "app.kubernetes.io/name";
pub const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

pub const APP_NAME: &str = "memcached";
pub const MANAGED_BY: &str = "memcached-operator";

/// Canonical labels for an instance, used as metadata and as selector.
pub fn standard_labels(instance: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_NAME.to_string(), APP_NAME.to_string()),
        (LABEL_INSTANCE.to_string(), instance.to_string()),
        (LABEL_MANAGED_BY.to_string(), MANAGED_BY.to_string()),
    ])
}

/// Label selector matching exactly the canonical labels.
pub fn standard_selector(instance: &str) -> LabelSelector {
    LabelSelector {
        match_labels: Some(standard_labels(instance)),
        match_expressions: None,
    }
}

/// Create the controlling owner reference for a Memcached
pub fn owner_reference(resource: &Memcached) -> OwnerReference {
    OwnerReference {
        api_version: Memcached::api_version(&()).into_owned(),
        kind: Memcached::kind(&()).into_owned(),
        name: resource.name_any(),
        uid: resource.uid().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Stamp canonical labels and the single owner reference onto `meta`.
pub fn apply_owned_metadata(meta: &mut ObjectMeta, resource: &Memcached) {
    meta.labels = Some(standard_labels(&resource.name_any()));
    meta.owner_references = Some(vec![owner_reference(resource)]);
}

/// The controller reference on `meta`, if any.
pub fn controller_of(meta: &ObjectMeta) -> Option<&OwnerReference> {
    meta.owner_references
        .as_deref()
        .unwrap_or_default()
        .iter()
        .find(|r| r.controller == Some(true))
}

/// Whether `resource` is the controller of the object described by `meta`.
pub fn is_controlled_by(meta: &ObjectMeta, resource: &Memcached) -> bool {
    match (controller_of(meta), resource.uid()) {
        (Some(owner), Some(uid)) => owner.uid == uid,
        _ => false,
    }
}

/// The controller of `meta` when it is not `resource`. Unowned objects
/// have no foreign controller and may be adopted.
pub fn foreign_controller<'a>(
    meta: &'a ObjectMeta,
    resource: &Memcached,
) -> Option<&'a OwnerReference> {
    controller_of(meta).filter(|_| !is_controlled_by(meta, resource))
}

/// Ports exposed by an instance, in the order Services and NetworkPolicies
/// list them: client, TLS, metrics.
pub fn exposed_ports(spec: &MemcachedSpec) -> Vec<(&'static str, i32)> {
    let mut ports = vec![(MEMCACHED_PORT_NAME, MEMCACHED_PORT)];
    if spec.enabled_tls().is_some() {
        ports.push((MEMCACHED_TLS_PORT_NAME, MEMCACHED_TLS_PORT));
    }
    if spec.enabled_monitoring().is_some() {
        ports.push((METRICS_PORT_NAME, METRICS_PORT));
    }
    ports
}
