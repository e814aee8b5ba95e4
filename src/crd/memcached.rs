//! Memcached Custom Resource Definition.
//!
//! Every optional block of the spec is independently nilable. An absent block
//! resolves to the same values as a present block carrying only defaults, and
//! the `enabled_*` accessors collapse "absent" and "present but disabled" into
//! a single `None` so constructors never have to distinguish the two.

use std::collections::BTreeMap;

use k8s_openapi::api::autoscaling::v2::{HorizontalPodAutoscalerBehavior, MetricSpec};
use k8s_openapi::api::core::v1::{
    LocalObjectReference, PodSecurityContext, ResourceRequirements, SecurityContext,
    TopologySpreadConstraint,
};
use k8s_openapi::api::networking::v1::NetworkPolicyPeer;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::defaults::Defaults;

/// Memcached is a custom resource for running a Memcached deployment.
///
/// Example:
/// ```yaml
/// apiVersion: memcached.smoketurner.com/v1alpha1
/// kind: Memcached
/// metadata:
///   name: sessions
/// spec:
///   replicas: 3
///   memcached:
///     maxMemoryMB: 256
///   highAvailability:
///     antiAffinityPreset: soft
///   monitoring:
///     enabled: true
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "memcached.smoketurner.com",
    version = "v1alpha1",
    kind = "Memcached",
    plural = "memcacheds",
    shortname = "mc",
    status = "MemcachedStatus",
    namespaced,
    printcolumn = r#"{"name":"Replicas", "type":"integer", "jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Ready", "type":"integer", "jsonPath":".status.readyReplicas"}"#,
    printcolumn = r#"{"name":"Available", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Available\")].status"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MemcachedSpec {
    /// Number of Memcached pods (default 1, 0-64).
    /// Ignored while autoscaling is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Memcached container image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Resource requests and limits for the memcached container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// Cache engine settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memcached: Option<MemcachedConfig>,

    /// Scheduling and disruption settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_availability: Option<HighAvailabilitySpec>,

    /// Prometheus exporter sidecar and ServiceMonitor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<MonitoringSpec>,

    /// Security contexts, SASL, TLS and network isolation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecuritySpec>,

    /// HorizontalPodAutoscaler settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<AutoscalingSpec>,

    /// Headless service settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceConfig>,
}

/// Cache engine command-line settings.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemcachedConfig {
    /// Memory ceiling in megabytes (`-m`, default 64).
    #[serde(default, rename = "maxMemoryMB", skip_serializing_if = "Option::is_none")]
    pub max_memory_mb: Option<i32>,

    /// Maximum simultaneous connections (`-c`, default 1024).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<i32>,

    /// Worker threads (`-t`, default 4).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<i32>,

    /// Maximum item size such as `1m` or `512k` (`-I`, default `1m`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_item_size: Option<String>,

    /// Log verbosity: 0 silent, 1 `-v`, 2 `-vv`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<i32>,

    /// Extra arguments appended verbatim after the generated ones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_args: Vec<String>,
}

/// Pod anti-affinity preset.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AntiAffinityPreset {
    /// Preferred anti-affinity across nodes.
    Soft,
    /// Required anti-affinity across nodes.
    Hard,
}

/// High availability settings.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HighAvailabilitySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anti_affinity_preset: Option<AntiAffinityPreset>,

    /// Passed through to the pod spec unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology_spread_constraints: Option<Vec<TopologySpreadConstraint>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_disruption_budget: Option<PodDisruptionBudgetConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graceful_shutdown: Option<GracefulShutdownSpec>,
}

/// PodDisruptionBudget settings. `minAvailable` and `maxUnavailable` are
/// mutually exclusive.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PodDisruptionBudgetConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_available: Option<IntOrString>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unavailable: Option<IntOrString>,
}

/// Graceful shutdown via a preStop sleep.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GracefulShutdownSpec {
    #[serde(default)]
    pub enabled: bool,

    /// Seconds to sleep in the preStop hook (default 10).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_stop_delay_seconds: Option<i64>,

    /// Pod termination grace period (default 30, must exceed the preStop delay).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_grace_period_seconds: Option<i64>,
}

/// Monitoring settings.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringSpec {
    #[serde(default)]
    pub enabled: bool,

    /// Exporter image override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exporter_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exporter_resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_monitor: Option<ServiceMonitorConfig>,
}

/// ServiceMonitor settings.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMonitorConfig {
    /// Scrape interval such as `30s`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    /// Scrape timeout such as `10s`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_timeout: Option<String>,

    /// Extra labels so a Prometheus instance can select the monitor.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_labels: BTreeMap<String, String>,
}

/// Security settings.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_security_context: Option<PodSecurityContext>,

    /// Applied to every container, including the exporter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_security_context: Option<SecurityContext>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sasl: Option<SaslSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_policy: Option<NetworkPolicyConfig>,
}

/// SASL authentication.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaslSpec {
    #[serde(default)]
    pub enabled: bool,

    /// Secret holding the `password-file` key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_secret_ref: Option<LocalObjectReference>,
}

/// TLS encryption.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsSpec {
    #[serde(default)]
    pub enabled: bool,

    /// Secret holding `tls.crt`, `tls.key` and optionally `ca.crt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_secret_ref: Option<LocalObjectReference>,

    /// Verify client certificates against `ca.crt`.
    #[serde(default)]
    pub enable_client_cert: bool,
}

/// Ingress NetworkPolicy.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPolicyConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Allowed peers. Empty means any source may connect.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_sources: Vec<NetworkPolicyPeer>,
}

/// HorizontalPodAutoscaler settings.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutoscalingSpec {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<i32>,

    #[serde(default)]
    pub max_replicas: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<MetricSpec>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<HorizontalPodAutoscalerBehavior>,
}

/// Headless service settings.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// Resolved cache engine settings with every default applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings<'a> {
    pub max_memory_mb: i32,
    pub max_connections: i32,
    pub threads: i32,
    pub max_item_size: &'a str,
    pub verbosity: i32,
    pub extra_args: &'a [String],
}

/// Resolved graceful shutdown timings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShutdownTimings {
    pub pre_stop_delay_seconds: i64,
    pub termination_grace_period_seconds: i64,
}

impl MemcachedSpec {
    /// Replica count declared in the spec.
    pub fn replicas_or_default(&self, defaults: &Defaults) -> i32 {
        self.replicas.unwrap_or(defaults.replicas)
    }

    /// Image to run.
    pub fn image_or_default<'a>(&'a self, defaults: &'a Defaults) -> &'a str {
        self.image.as_deref().unwrap_or(defaults.image)
    }

    /// Engine settings, defaults filled in.
    pub fn engine<'a>(&'a self, defaults: &'a Defaults) -> EngineSettings<'a> {
        let config = self.memcached.as_ref();
        EngineSettings {
            max_memory_mb: config
                .and_then(|c| c.max_memory_mb)
                .unwrap_or(defaults.max_memory_mb),
            max_connections: config
                .and_then(|c| c.max_connections)
                .unwrap_or(defaults.max_connections),
            threads: config.and_then(|c| c.threads).unwrap_or(defaults.threads),
            max_item_size: config
                .and_then(|c| c.max_item_size.as_deref())
                .unwrap_or(defaults.max_item_size),
            verbosity: config.and_then(|c| c.verbosity).unwrap_or(0),
            extra_args: config.map(|c| c.extra_args.as_slice()).unwrap_or(&[]),
        }
    }

    pub fn anti_affinity_preset(&self) -> Option<AntiAffinityPreset> {
        self.high_availability
            .as_ref()
            .and_then(|ha| ha.anti_affinity_preset)
    }

    pub fn topology_spread_constraints(&self) -> Option<&[TopologySpreadConstraint]> {
        self.high_availability
            .as_ref()
            .and_then(|ha| ha.topology_spread_constraints.as_deref())
            .filter(|c| !c.is_empty())
    }

    pub fn enabled_pdb(&self) -> Option<&PodDisruptionBudgetConfig> {
        self.high_availability
            .as_ref()
            .and_then(|ha| ha.pod_disruption_budget.as_ref())
            .filter(|pdb| pdb.enabled)
    }

    /// Shutdown timings when graceful shutdown is enabled.
    pub fn graceful_shutdown(&self, defaults: &Defaults) -> Option<ShutdownTimings> {
        self.high_availability
            .as_ref()
            .and_then(|ha| ha.graceful_shutdown.as_ref())
            .filter(|gs| gs.enabled)
            .map(|gs| ShutdownTimings {
                pre_stop_delay_seconds: gs
                    .pre_stop_delay_seconds
                    .unwrap_or(defaults.pre_stop_delay_seconds),
                termination_grace_period_seconds: gs
                    .termination_grace_period_seconds
                    .unwrap_or(defaults.termination_grace_period_seconds),
            })
    }

    pub fn enabled_monitoring(&self) -> Option<&MonitoringSpec> {
        self.monitoring.as_ref().filter(|m| m.enabled)
    }

    pub fn pod_security_context(&self) -> Option<&PodSecurityContext> {
        self.security
            .as_ref()
            .and_then(|s| s.pod_security_context.as_ref())
    }

    pub fn container_security_context(&self) -> Option<&SecurityContext> {
        self.security
            .as_ref()
            .and_then(|s| s.container_security_context.as_ref())
    }

    pub fn enabled_sasl(&self) -> Option<&SaslSpec> {
        self.security
            .as_ref()
            .and_then(|s| s.sasl.as_ref())
            .filter(|sasl| sasl.enabled)
    }

    pub fn enabled_tls(&self) -> Option<&TlsSpec> {
        self.security
            .as_ref()
            .and_then(|s| s.tls.as_ref())
            .filter(|tls| tls.enabled)
    }

    pub fn enabled_network_policy(&self) -> Option<&NetworkPolicyConfig> {
        self.security
            .as_ref()
            .and_then(|s| s.network_policy.as_ref())
            .filter(|np| np.enabled)
    }

    pub fn enabled_autoscaling(&self) -> Option<&AutoscalingSpec> {
        self.autoscaling.as_ref().filter(|a| a.enabled)
    }

    /// Whether the replica count is owned by an autoscaler instead of the spec.
    pub fn autoscaling_active(&self) -> bool {
        self.enabled_autoscaling().is_some()
    }

    pub fn service_annotations(&self) -> Option<&BTreeMap<String, String>> {
        self.service.as_ref().and_then(|s| s.annotations.as_ref())
    }

    /// Name of the SASL credentials secret, if SASL is enabled.
    pub fn sasl_secret_name(&self) -> Option<&str> {
        self.enabled_sasl()
            .and_then(|s| s.credentials_secret_ref.as_ref())
            .map(|r| r.name.as_str())
            .filter(|n| !n.is_empty())
    }

    /// Name of the TLS certificate secret, if TLS is enabled.
    pub fn tls_secret_name(&self) -> Option<&str> {
        self.enabled_tls()
            .and_then(|t| t.certificate_secret_ref.as_ref())
            .map(|r| r.name.as_str())
            .filter(|n| !n.is_empty())
    }
}

/// Status of a Memcached resource.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemcachedStatus {
    /// Number of ready memcached pods.
    #[serde(default)]
    pub ready_replicas: i32,

    /// The generation most recently observed by the controller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Available, Progressing and Degraded conditions.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Condition describes the state of a resource at a certain point.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition.
    pub r#type: String,
    /// Status of the condition ("True", "False", "Unknown").
    pub status: String,
    /// Machine-readable reason for the condition's last transition.
    pub reason: String,
    /// Human-readable message indicating details about last transition.
    pub message: String,
    /// Last time the condition transitioned from one status to another.
    pub last_transition_time: String,
    /// The generation of the resource this condition was observed for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Condition {
    /// Create a new condition transitioning at `transition_time`.
    pub fn new(
        condition_type: ConditionType,
        status: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
        transition_time: String,
    ) -> Self {
        Self {
            r#type: condition_type.to_string(),
            status: if status {
                "True".to_string()
            } else {
                "False".to_string()
            },
            reason: reason.to_string(),
            message: message.to_string(),
            last_transition_time: transition_time,
            observed_generation: generation,
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == "True"
    }
}

/// Types of conditions reported for a Memcached resource.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum ConditionType {
    /// At least one pod is ready.
    Available,
    /// A rollout has not yet converged.
    Progressing,
    /// Fewer pods are ready than desired, or credentials are missing.
    Degraded,
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionType::Available => write!(f, "Available"),
            ConditionType::Progressing => write!(f, "Progressing"),
            ConditionType::Degraded => write!(f, "Degraded"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_type_display() {
        assert_eq!(ConditionType::Available.to_string(), "Available");
        assert_eq!(ConditionType::Progressing.to_string(), "Progressing");
        assert_eq!(ConditionType::Degraded.to_string(), "Degraded");
    }

    #[test]
    fn test_engine_defaults_when_block_absent() {
        let spec = MemcachedSpec::default();
        let engine = spec.engine(&Defaults::STANDARD);
        assert_eq!(engine.max_memory_mb, 64);
        assert_eq!(engine.max_connections, 1024);
        assert_eq!(engine.threads, 4);
        assert_eq!(engine.max_item_size, "1m");
        assert_eq!(engine.verbosity, 0);
        assert!(engine.extra_args.is_empty());
    }

    #[test]
    fn test_empty_block_matches_absent_block() {
        let absent = MemcachedSpec::default();
        let empty = MemcachedSpec {
            memcached: Some(MemcachedConfig::default()),
            ..Default::default()
        };
        assert_eq!(
            absent.engine(&Defaults::STANDARD),
            empty.engine(&Defaults::STANDARD)
        );
    }

    #[test]
    fn test_disabled_blocks_resolve_to_none() {
        let spec = MemcachedSpec {
            security: Some(SecuritySpec {
                tls: Some(TlsSpec {
                    enabled: false,
                    certificate_secret_ref: Some(LocalObjectReference {
                        name: "certs".to_string(),
                    }),
                    enable_client_cert: false,
                }),
                ..Default::default()
            }),
            autoscaling: Some(AutoscalingSpec::default()),
            ..Default::default()
        };
        assert!(spec.enabled_tls().is_none());
        assert!(spec.tls_secret_name().is_none());
        assert!(!spec.autoscaling_active());
    }

    #[test]
    fn test_graceful_shutdown_defaults() {
        let spec = MemcachedSpec {
            high_availability: Some(HighAvailabilitySpec {
                graceful_shutdown: Some(GracefulShutdownSpec {
                    enabled: true,
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let timings = spec.graceful_shutdown(&Defaults::STANDARD).unwrap();
        assert_eq!(timings.pre_stop_delay_seconds, 10);
        assert_eq!(timings.termination_grace_period_seconds, 30);
    }

    #[test]
    fn test_spec_deserializes_camel_case() {
        let json = serde_json::json!({
            "replicas": 3,
            "memcached": { "maxMemoryMB": 256, "maxItemSize": "2m", "extraArgs": ["-o", "modern"] },
            "highAvailability": { "antiAffinityPreset": "hard" },
            "security": { "sasl": { "enabled": true, "credentialsSecretRef": { "name": "sasl" } } }
        });
        let spec: MemcachedSpec = serde_json::from_value(json).expect("valid spec");
        assert_eq!(spec.replicas, Some(3));
        assert_eq!(spec.engine(&Defaults::STANDARD).max_memory_mb, 256);
        assert_eq!(spec.anti_affinity_preset(), Some(AntiAffinityPreset::Hard));
        assert_eq!(spec.sasl_secret_name(), Some("sasl"));
    }
}
