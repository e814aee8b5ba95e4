// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Unit tests for memcached-operator.
//!
//! These tests run without a Kubernetes cluster and exercise the public
//! constructors, the status engine and the secret mapper together.

#[path = "../common/fixtures.rs"]
mod fixtures;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PodSpec, Service};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use memcached_operator::crd::{Defaults, Memcached};
use memcached_operator::resources::{BuildContext, Dependent};

use fixtures::MemcachedBuilder;

const DEFAULTS: Defaults = Defaults::STANDARD;

fn construct<K: Dependent>(resource: &Memcached) -> K {
    let mut target = K::default();
    K::construct(resource, &BuildContext::new(&DEFAULTS, ""), &mut target);
    target
}

fn pod_spec(deployment: &Deployment) -> PodSpec {
    deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.clone())
        .unwrap()
}

mod feature_independence {
    use super::*;
    use memcached_operator::crd::AntiAffinityPreset;
    use memcached_operator::resources::deployment::{EXPORTER_CONTAINER, MEMCACHED_CONTAINER};

    #[test]
    fn test_topology_spread_survives_affinity_removal() {
        let with_both = MemcachedBuilder::new("cache")
            .anti_affinity(AntiAffinityPreset::Hard)
            .topology_spread("topology.kubernetes.io/zone")
            .build();
        let spread_only = MemcachedBuilder::new("cache")
            .topology_spread("topology.kubernetes.io/zone")
            .build();

        let mut deployment: Deployment = construct(&with_both);
        Deployment::construct(
            &spread_only,
            &BuildContext::new(&DEFAULTS, ""),
            &mut deployment,
        );

        let pod = pod_spec(&deployment);
        assert!(pod.affinity.is_none());
        assert_eq!(pod.topology_spread_constraints.unwrap().len(), 1);
    }

    #[test]
    fn test_monitoring_does_not_touch_memcached_container() {
        let plain = MemcachedBuilder::new("cache").build();
        let monitored = MemcachedBuilder::new("cache").monitoring().build();

        let plain_pod = pod_spec(&construct(&plain));
        let monitored_pod = pod_spec(&construct(&monitored));

        assert_eq!(plain_pod.containers[0], monitored_pod.containers[0]);
        assert_eq!(monitored_pod.containers[0].name, MEMCACHED_CONTAINER);
        assert_eq!(monitored_pod.containers[1].name, EXPORTER_CONTAINER);
        assert_eq!(plain_pod.volumes, monitored_pod.volumes);
        assert_eq!(plain_pod.affinity, monitored_pod.affinity);
    }

    #[test]
    fn test_tls_does_not_touch_affinity_or_shutdown() {
        let base = MemcachedBuilder::new("cache")
            .anti_affinity(AntiAffinityPreset::Soft)
            .graceful_shutdown(15, 45);
        let plain_pod = pod_spec(&construct(&base.clone().build()));
        let tls_pod = pod_spec(&construct(&base.tls("certs", true).build()));

        assert_eq!(plain_pod.affinity, tls_pod.affinity);
        assert_eq!(
            plain_pod.termination_grace_period_seconds,
            tls_pod.termination_grace_period_seconds
        );
        assert_eq!(
            plain_pod.containers[0].lifecycle,
            tls_pod.containers[0].lifecycle
        );
    }

    #[test]
    fn test_sasl_and_tls_volumes_independent() {
        let both = MemcachedBuilder::new("cache")
            .sasl("creds")
            .tls("certs", false)
            .build();
        let sasl_only = MemcachedBuilder::new("cache").sasl("creds").build();

        let mut deployment: Deployment = construct(&both);
        assert_eq!(pod_spec(&deployment).volumes.unwrap().len(), 2);

        Deployment::construct(
            &sasl_only,
            &BuildContext::new(&DEFAULTS, ""),
            &mut deployment,
        );
        let pod = pod_spec(&deployment);
        let volumes = pod.volumes.unwrap();
        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].name, "sasl-credentials");
        let args = pod.containers[0].args.clone().unwrap();
        assert!(args.contains(&"-Y".to_string()));
        assert!(!args.contains(&"-Z".to_string()));
        assert_eq!(pod.containers[0].ports.as_ref().unwrap().len(), 1);
    }
}

mod ports {
    use super::*;
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

    #[test]
    fn test_service_and_network_policy_port_order_match() {
        let resource = MemcachedBuilder::new("cache")
            .monitoring()
            .tls("certs", false)
            .build();

        let service: Service = construct(&resource);
        let service_ports: Vec<i32> = service
            .spec
            .unwrap()
            .ports
            .unwrap()
            .iter()
            .map(|p| p.port)
            .collect();
        assert_eq!(service_ports, vec![11211, 11212, 9150]);

        let np: NetworkPolicy = construct(&resource);
        let np_ports: Vec<i32> = np.spec.unwrap().ingress.unwrap()[0]
            .ports
            .clone()
            .unwrap()
            .into_iter()
            .filter_map(|p| match p.port {
                Some(IntOrString::Int(port)) => Some(port),
                _ => None,
            })
            .collect();
        assert_eq!(np_ports, service_ports);
    }
}

mod status {
    use memcached_operator::controller::status::{
        DeploymentObservation, REASON_SECRET_NOT_FOUND, StatusInputs, build_status,
        is_condition_true,
    };
    use memcached_operator::crd::{ConditionType, Defaults};

    use super::fixtures::MemcachedBuilder;

    #[test]
    fn test_missing_secret_reason_wins() {
        let resource = MemcachedBuilder::new("cache")
            .replicas(3)
            .sasl("creds")
            .generation(7)
            .build();
        let missing = vec!["creds".to_string()];
        let status = build_status(
            &resource,
            &Defaults::STANDARD,
            &StatusInputs {
                deployment: Some(DeploymentObservation {
                    replicas: 3,
                    ready_replicas: 0,
                    updated_replicas: 3,
                }),
                missing_secrets: &missing,
                autoscaling_active: false,
            },
            "2026-01-01T00:00:00Z",
        );

        let degraded = status
            .conditions
            .iter()
            .find(|c| c.r#type == "Degraded")
            .unwrap();
        assert_eq!(degraded.reason, REASON_SECRET_NOT_FOUND);
        assert!(!degraded.message.contains("password"));
        assert!(is_condition_true(&status.conditions, ConditionType::Degraded));
        assert!(!is_condition_true(&status.conditions, ConditionType::Available));
        assert_eq!(status.observed_generation, Some(7));
    }
}

mod secret_mapper {
    use memcached_operator::controller::secret_mapper::secret_reconcile_targets;

    use super::fixtures::MemcachedBuilder;

    #[test]
    fn test_only_same_namespace_references() {
        let resources = vec![
            MemcachedBuilder::new("a").namespace("team-a").sasl("creds").build(),
            MemcachedBuilder::new("b").namespace("team-b").sasl("creds").build(),
            MemcachedBuilder::new("c")
                .namespace("team-a")
                .tls("creds", true)
                .build(),
            MemcachedBuilder::new("d").namespace("team-a").build(),
        ];
        let targets = secret_reconcile_targets("creds", "team-a", &resources);
        let names: Vec<&str> = targets.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert!(
            targets
                .iter()
                .all(|r| r.namespace.as_deref() == Some("team-a"))
        );
    }
}

mod error_tests {
    use memcached_operator::controller::error::Error;

    #[test]
    fn test_error_is_retryable() {
        let kube_err = Error::Kube(kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "timeout".to_string(),
            reason: "Timeout".to_string(),
            code: 504,
        }));
        assert!(kube_err.is_retryable());

        let missing = Error::MissingField("metadata.namespace".to_string());
        assert!(!missing.is_retryable());
    }

    #[test]
    fn test_status_patch_error_message() {
        let err = Error::StatusPatch(kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "conflict".to_string(),
            reason: "Conflict".to_string(),
            code: 409,
        }));
        assert!(err.to_string().starts_with("Failed to update status"));
        assert!(err.is_retryable());
    }
}

mod crd_tests {
    use kube::CustomResourceExt;
    use memcached_operator::crd::Memcached;

    #[test]
    fn test_crd_identity() {
        let crd = Memcached::crd();
        assert_eq!(crd.spec.group, "memcached.smoketurner.com");
        assert_eq!(crd.spec.names.kind, "Memcached");
        assert_eq!(
            crd.spec.names.short_names.as_deref(),
            Some(&["mc".to_string()][..])
        );
        assert!(crd.spec.versions[0].subresources.is_some());
    }
}
