//! Test fixtures and builder patterns for Memcached.

#![allow(dead_code)]

use k8s_openapi::api::core::v1::{LocalObjectReference, TopologySpreadConstraint};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use memcached_operator::crd::{
    AntiAffinityPreset, AutoscalingSpec, GracefulShutdownSpec, HighAvailabilitySpec, Memcached,
    MemcachedConfig, MemcachedSpec, MonitoringSpec, SaslSpec, SecuritySpec, TlsSpec,
};

/// Builder for creating Memcached test fixtures.
///
/// # Example
/// ```ignore
/// let resource = MemcachedBuilder::new("sessions")
///     .namespace("apps")
///     .replicas(3)
///     .monitoring()
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct MemcachedBuilder {
    name: String,
    namespace: String,
    generation: Option<i64>,
    uid: String,
    spec: MemcachedSpec,
}

impl MemcachedBuilder {
    /// Create a new builder with the given resource name in `default`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: "default".to_string(),
            generation: Some(1),
            uid: "test-uid".to_string(),
            spec: MemcachedSpec::default(),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn generation(mut self, generation: i64) -> Self {
        self.generation = Some(generation);
        self
    }

    pub fn replicas(mut self, replicas: i32) -> Self {
        self.spec.replicas = Some(replicas);
        self
    }

    pub fn engine(mut self, config: MemcachedConfig) -> Self {
        self.spec.memcached = Some(config);
        self
    }

    pub fn monitoring(mut self) -> Self {
        self.spec.monitoring = Some(MonitoringSpec {
            enabled: true,
            ..Default::default()
        });
        self
    }

    pub fn sasl(mut self, secret: &str) -> Self {
        self.security().sasl = Some(SaslSpec {
            enabled: true,
            credentials_secret_ref: Some(LocalObjectReference {
                name: secret.to_string(),
            }),
        });
        self
    }

    pub fn tls(mut self, secret: &str, client_cert: bool) -> Self {
        self.security().tls = Some(TlsSpec {
            enabled: true,
            certificate_secret_ref: Some(LocalObjectReference {
                name: secret.to_string(),
            }),
            enable_client_cert: client_cert,
        });
        self
    }

    pub fn anti_affinity(mut self, preset: AntiAffinityPreset) -> Self {
        self.high_availability().anti_affinity_preset = Some(preset);
        self
    }

    pub fn topology_spread(mut self, topology_key: &str) -> Self {
        self.high_availability().topology_spread_constraints =
            Some(vec![TopologySpreadConstraint {
                max_skew: 1,
                topology_key: topology_key.to_string(),
                when_unsatisfiable: "ScheduleAnyway".to_string(),
                ..Default::default()
            }]);
        self
    }

    pub fn graceful_shutdown(mut self, pre_stop: i64, grace: i64) -> Self {
        self.high_availability().graceful_shutdown = Some(GracefulShutdownSpec {
            enabled: true,
            pre_stop_delay_seconds: Some(pre_stop),
            termination_grace_period_seconds: Some(grace),
        });
        self
    }

    pub fn autoscaling(mut self, min: i32, max: i32) -> Self {
        self.spec.autoscaling = Some(AutoscalingSpec {
            enabled: true,
            min_replicas: Some(min),
            max_replicas: max,
            ..Default::default()
        });
        self
    }

    fn security(&mut self) -> &mut SecuritySpec {
        self.spec.security.get_or_insert_with(Default::default)
    }

    fn high_availability(&mut self) -> &mut HighAvailabilitySpec {
        self.spec
            .high_availability
            .get_or_insert_with(Default::default)
    }

    /// Build the Memcached resource.
    pub fn build(self) -> Memcached {
        Memcached {
            metadata: ObjectMeta {
                name: Some(self.name),
                namespace: Some(self.namespace),
                generation: self.generation,
                uid: Some(self.uid),
                ..Default::default()
            },
            spec: self.spec,
            status: None,
        }
    }
}
