//! Resource generation module.
//!
//! Contains one pure constructor per Kubernetes object owned by a Memcached
//! resource.
//!
//! ## Resources Generated
//!
//! | Resource | Purpose |
//! |----------|---------|
//! | Deployment | Memcached pods plus optional exporter sidecar |
//! | Headless Service | Per-pod DNS for client-side sharding |
//! | PodDisruptionBudget | Bound voluntary disruptions |
//! | HorizontalPodAutoscaler | External replica management |
//! | NetworkPolicy | Ingress isolation |
//! | ServiceMonitor | Prometheus scrape configuration |
//!
//! Constructors mutate a target object in place and overwrite every field
//! they own, so running one twice against the same input yields the same
//! object. They perform no I/O.

pub mod common;
pub mod deployment;
pub mod hpa;
pub mod network_policy;
pub mod pdb;
pub mod service;
pub mod service_monitor;

use k8s_openapi::NamespaceResourceScope;
use kube::{Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::crd::{Defaults, Memcached};

// Re-export commonly used items from common
pub use common::{owner_reference, standard_labels};

/// Inputs a constructor may read besides the custom resource itself.
#[derive(Clone, Copy, Debug)]
pub struct BuildContext<'a> {
    /// Shared defaults and bounds.
    pub defaults: &'a Defaults,
    /// Content hash of referenced secrets, empty when none were found.
    pub secret_hash: &'a str,
}

impl<'a> BuildContext<'a> {
    pub fn new(defaults: &'a Defaults, secret_hash: &'a str) -> Self {
        Self {
            defaults,
            secret_hash,
        }
    }
}

mod private {
    pub trait Sealed {}

    impl Sealed for k8s_openapi::api::apps::v1::Deployment {}
    impl Sealed for k8s_openapi::api::core::v1::Service {}
    impl Sealed for k8s_openapi::api::policy::v1::PodDisruptionBudget {}
    impl Sealed for k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler {}
    impl Sealed for k8s_openapi::api::networking::v1::NetworkPolicy {}
}

/// A kind of object owned by a Memcached resource.
///
/// The set of implementors is closed; the create-or-update harness in
/// [`crate::controller::apply`] is generic over it.
pub trait Dependent:
    private::Sealed
    + Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + Default
    + PartialEq
    + Serialize
    + DeserializeOwned
    + std::fmt::Debug
    + Send
    + Sync
    + 'static
{
    /// Kubernetes kind, used in logs and events.
    const KIND: &'static str;

    /// Name of the owned object. Every kind shares the owner's name.
    fn object_name(resource: &Memcached) -> String {
        resource.name_any()
    }

    /// Overwrite every field this kind owns from the desired state.
    fn construct(resource: &Memcached, ctx: &BuildContext<'_>, target: &mut Self);
}
