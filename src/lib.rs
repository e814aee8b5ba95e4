//! memcached-operator library crate
//!
//! This module exports the controller, CRD definitions, and resource generators.

pub mod controller;
pub mod crd;
pub mod health;
pub mod resources;
pub mod webhooks;

pub use health::HealthState;
pub use webhooks::{
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookError, run_webhook_server,
};

use std::sync::Arc;

use futures::{Stream, StreamExt};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use kube::core::PartialObjectMeta;
use kube::discovery::ApiResource;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::{Controller, WatchStreamExt, metadata_watcher, predicates, reflector, watcher};
use kube::{Api, Client, Discovery, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use controller::{
    context::Context, reconciler::reconcile, secret_mapper::secret_reconcile_targets,
};
use crd::Memcached;
use resources::service_monitor::{SERVICE_MONITOR_GROUP, service_monitor_gvk};

/// Environment variable restricting the operator to one namespace
pub const WATCH_NAMESPACE_ENV: &str = "WATCH_NAMESPACE";

/// Create namespaced or cluster-wide API based on scope
pub fn scoped_api<T>(client: Client, namespace: Option<&str>) -> Api<T>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <T as Resource>::DynamicType: Default,
    T: Clone + DeserializeOwned + std::fmt::Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Namespace named by `WATCH_NAMESPACE`, `None` (cluster-wide) when unset or empty.
pub fn watch_namespace_from_env() -> Option<String> {
    std::env::var(WATCH_NAMESPACE_ENV)
        .ok()
        .filter(|ns| !ns.trim().is_empty())
}

/// Create the default watcher configuration for all controllers.
///
/// - `any_semantic()`: More reliable resource discovery in test environments
fn default_watcher_config() -> WatcherConfig {
    WatcherConfig::default().any_semantic()
}

/// Create a filtered stream for a resource type with standard optimizations.
///
/// This creates a reflector-backed stream that:
/// - Maintains an in-memory cache via reflector
/// - Uses automatic retry with exponential backoff on errors
/// - Converts watch events to objects (Added/Modified only)
/// - Filters out status-only updates via generation predicate
///
/// Returns the reflector store (for cache lookups) and the filtered stream.
fn create_filtered_stream<K>(
    api: Api<K>,
    watcher_config: WatcherConfig,
) -> (
    reflector::Store<K>,
    impl Stream<Item = Result<K, watcher::Error>>,
)
where
    K: Resource + Clone + DeserializeOwned + std::fmt::Debug + Send + 'static,
    K::DynamicType: Default + Eq + std::hash::Hash + Clone,
{
    let (reader, writer) = reflector::store();
    let stream = reflector(writer, watcher(api, watcher_config))
        .default_backoff()
        .applied_objects()
        .predicate_filter(predicates::generation);
    (reader, stream)
}

/// Look up the ServiceMonitor API. `None` when the Prometheus Operator CRD
/// is not installed or discovery fails.
pub async fn discover_service_monitor(client: Client) -> Option<ApiResource> {
    let discovery = match Discovery::new(client)
        .filter(&[SERVICE_MONITOR_GROUP])
        .run()
        .await
    {
        Ok(discovery) => discovery,
        Err(e) => {
            warn!(error = %e, "API discovery failed, ServiceMonitors disabled");
            return None;
        }
    };
    let found = discovery
        .resolve_gvk(&service_monitor_gvk())
        .map(|(ar, _caps)| ar);
    if found.is_none() {
        info!("ServiceMonitor CRD not installed, ServiceMonitors disabled");
    }
    found
}

/// Run the operator controller, scoped by `WATCH_NAMESPACE` when set.
///
/// If health_state is provided, metrics will be recorded for reconciliations.
pub async fn run_controller(client: Client, health_state: Option<Arc<HealthState>>) {
    let namespace = watch_namespace_from_env();
    run_controller_scoped(client, health_state, namespace.as_deref()).await
}

/// Run the operator controller with optional namespace scoping.
///
/// When `namespace` is `Some(ns)`, only watches resources in that namespace.
/// When `namespace` is `None`, watches resources cluster-wide.
pub async fn run_controller_scoped(
    client: Client,
    health_state: Option<Arc<HealthState>>,
    namespace: Option<&str>,
) {
    let scope_msg = namespace.unwrap_or("cluster-wide");
    info!(scope = %scope_msg, "Starting controller for Memcached resources");

    let service_monitor = discover_service_monitor(client.clone()).await;

    // Mark as ready once we start the controller
    if let Some(ref state) = health_state {
        state.set_ready(true).await;
    }

    let ctx = Arc::new(Context::new(client.clone(), service_monitor, health_state));

    let memcacheds: Api<Memcached> = scoped_api(client.clone(), namespace);
    let deployments: Api<Deployment> = scoped_api(client.clone(), namespace);
    let services: Api<Service> = scoped_api(client.clone(), namespace);
    let pdbs: Api<PodDisruptionBudget> = scoped_api(client.clone(), namespace);
    let hpas: Api<HorizontalPodAutoscaler> = scoped_api(client.clone(), namespace);
    let network_policies: Api<NetworkPolicy> = scoped_api(client.clone(), namespace);
    let secrets: Api<Secret> = scoped_api(client.clone(), namespace);

    let watcher_config = default_watcher_config();

    let (reader, resource_stream) = create_filtered_stream(memcacheds, watcher_config.clone());
    let store = reader.clone();

    // Full watcher only for Deployments, whose status feeds conditions.
    // Secrets are watched by metadata only so their data never enters the cache.
    Controller::for_stream(resource_stream, reader)
        .owns(deployments, watcher_config.clone())
        .owns_stream(metadata_watcher(services, watcher_config.clone()).touched_objects())
        .owns_stream(metadata_watcher(pdbs, watcher_config.clone()).touched_objects())
        .owns_stream(metadata_watcher(hpas, watcher_config.clone()).touched_objects())
        .owns_stream(metadata_watcher(network_policies, watcher_config.clone()).touched_objects())
        .watches_stream(
            metadata_watcher(secrets, watcher_config).touched_objects(),
            move |secret: PartialObjectMeta<Secret>| {
                let namespace = secret.namespace().unwrap_or_default();
                let cached = store.state();
                secret_reconcile_targets(
                    &secret.name_any(),
                    &namespace,
                    cached.iter().map(Arc::as_ref),
                )
            },
        )
        .run(reconcile, controller::reconciler::error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    debug!("Reconciled: {}", obj.name);
                }
                Err(e) => {
                    // NotFound is expected after deletion when a related watch
                    // event triggers reconciliation for a deleted object.
                    let is_not_found = match &e {
                        kube::runtime::controller::Error::ObjectNotFound(_) => true,
                        kube::runtime::controller::Error::ReconcilerFailed(err, _) => {
                            err.is_not_found()
                        }
                        _ => false,
                    };
                    if is_not_found {
                        debug!("Object no longer exists (likely deleted): {:?}", e);
                    } else {
                        error!("Reconciliation error: {:?}", e);
                    }
                }
            }
        })
        .await;

    // This should never complete in normal operation
    error!("Controller stream ended unexpectedly");
}
