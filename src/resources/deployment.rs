//! Deployment generation for Memcached instances.
//!
//! Builds the memcached container command line, TLS and SASL mounts,
//! anti-affinity, topology spread, graceful shutdown and the optional
//! Prometheus exporter sidecar.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentStrategy, RollingUpdateDeployment};
use k8s_openapi::api::core::v1::{
    Affinity, Container, ContainerPort, ExecAction, KeyToPath, Lifecycle, LifecycleHandler,
    PodAffinityTerm, PodAntiAffinity, PodSpec, Probe, SecretVolumeSource, TCPSocketAction, Volume,
    VolumeMount, WeightedPodAffinityTerm,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

use crate::crd::{
    AntiAffinityPreset, Defaults, MEMCACHED_PORT, MEMCACHED_PORT_NAME, MEMCACHED_TLS_PORT,
    MEMCACHED_TLS_PORT_NAME, METRICS_PORT, METRICS_PORT_NAME, Memcached, MemcachedSpec,
    SASL_MOUNT_PATH, SASL_PASSWORD_FILE_KEY, TLS_MOUNT_PATH,
};
use crate::resources::common::{apply_owned_metadata, standard_labels, standard_selector};
use crate::resources::{BuildContext, Dependent};

pub const MEMCACHED_CONTAINER: &str = "memcached";
pub const EXPORTER_CONTAINER: &str = "memcached-exporter";

pub const TLS_VOLUME: &str = "tls-certificates";
pub const SASL_VOLUME: &str = "sasl-credentials";

/// Pod-template annotation carrying the referenced secrets' content hash.
pub const SECRET_HASH_ANNOTATION: &str = "memcached.smoketurner.com/secret-hash";

/// Topology key used by the anti-affinity presets.
pub const HOSTNAME_TOPOLOGY_KEY: &str = "kubernetes.io/hostname";

const ANTI_AFFINITY_WEIGHT: i32 = 100;

impl Dependent for Deployment {
    const KIND: &'static str = "Deployment";

    fn construct(resource: &Memcached, ctx: &BuildContext<'_>, target: &mut Self) {
        let name = resource.name_any();
        let spec = &resource.spec;

        apply_owned_metadata(&mut target.metadata, resource);

        let deploy = target.spec.get_or_insert_with(Default::default);
        // With autoscaling on, the HPA owns spec.replicas
        if !spec.autoscaling_active() {
            deploy.replicas = Some(spec.replicas_or_default(ctx.defaults));
        }
        deploy.selector = standard_selector(&name);
        deploy.strategy = Some(rolling_update_strategy());

        let template_meta = deploy.template.metadata.get_or_insert_with(Default::default);
        template_meta.labels = Some(standard_labels(&name));
        set_secret_hash(&mut template_meta.annotations, ctx.secret_hash);

        let pod = deploy.template.spec.get_or_insert_with(Default::default);
        construct_pod_spec(spec, ctx.defaults, &name, pod);
    }
}

fn rolling_update_strategy() -> DeploymentStrategy {
    DeploymentStrategy {
        type_: Some("RollingUpdate".to_string()),
        rolling_update: Some(RollingUpdateDeployment {
            max_surge: Some(IntOrString::Int(1)),
            max_unavailable: Some(IntOrString::Int(0)),
        }),
    }
}

fn set_secret_hash(annotations: &mut Option<BTreeMap<String, String>>, hash: &str) {
    if hash.is_empty() {
        if let Some(existing) = annotations.as_mut() {
            existing.remove(SECRET_HASH_ANNOTATION);
            if existing.is_empty() {
                *annotations = None;
            }
        }
    } else {
        annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(SECRET_HASH_ANNOTATION.to_string(), hash.to_string());
    }
}

fn construct_pod_spec(spec: &MemcachedSpec, defaults: &Defaults, name: &str, pod: &mut PodSpec) {
    pod.affinity = spec
        .anti_affinity_preset()
        .map(|preset| anti_affinity(preset, name));
    pod.topology_spread_constraints = spec.topology_spread_constraints().map(<[_]>::to_vec);
    pod.security_context = spec.pod_security_context().cloned();
    pod.termination_grace_period_seconds = spec
        .graceful_shutdown(defaults)
        .map(|t| t.termination_grace_period_seconds);

    let volumes = volumes(spec);
    pod.volumes = if volumes.is_empty() {
        None
    } else {
        Some(volumes)
    };

    // Reuse live containers so server-defaulted fields survive
    let mut existing = std::mem::take(&mut pod.containers);
    let mut containers = Vec::with_capacity(2);

    let mut memcached = take_container(&mut existing, MEMCACHED_CONTAINER);
    construct_memcached_container(spec, defaults, &mut memcached);
    containers.push(memcached);

    if spec.enabled_monitoring().is_some() {
        let mut exporter = take_container(&mut existing, EXPORTER_CONTAINER);
        construct_exporter_container(spec, defaults, &mut exporter);
        containers.push(exporter);
    }

    pod.containers = containers;
}

fn take_container(containers: &mut Vec<Container>, name: &str) -> Container {
    match containers.iter().position(|c| c.name == name) {
        Some(index) => containers.swap_remove(index),
        None => Container {
            name: name.to_string(),
            ..Default::default()
        },
    }
}

/// Build the memcached command line.
///
/// Order: core flags, verbosity, extra args, TLS, SASL.
pub fn memcached_args(spec: &MemcachedSpec, defaults: &Defaults) -> Vec<String> {
    let engine = spec.engine(defaults);
    let mut args = vec![
        "-m".to_string(),
        engine.max_memory_mb.to_string(),
        "-c".to_string(),
        engine.max_connections.to_string(),
        "-t".to_string(),
        engine.threads.to_string(),
        "-I".to_string(),
        engine.max_item_size.to_string(),
    ];

    match engine.verbosity {
        1 => args.push("-v".to_string()),
        v if v >= 2 => args.push("-vv".to_string()),
        _ => {}
    }

    args.extend(engine.extra_args.iter().cloned());

    if let Some(tls) = spec.enabled_tls() {
        args.push("-Z".to_string());
        args.push("-o".to_string());
        args.push(format!("ssl_chain_cert={TLS_MOUNT_PATH}/tls.crt"));
        args.push("-o".to_string());
        args.push(format!("ssl_key={TLS_MOUNT_PATH}/tls.key"));
        if tls.enable_client_cert {
            args.push("-o".to_string());
            args.push(format!("ssl_ca_cert={TLS_MOUNT_PATH}/ca.crt"));
        }
    }

    if spec.enabled_sasl().is_some() {
        args.push("-Y".to_string());
        args.push(format!("{SASL_MOUNT_PATH}/{SASL_PASSWORD_FILE_KEY}"));
    }

    args
}

fn construct_memcached_container(spec: &MemcachedSpec, defaults: &Defaults, c: &mut Container) {
    c.image = Some(spec.image_or_default(defaults).to_string());
    c.command = None;
    c.args = Some(memcached_args(spec, defaults));
    c.resources = spec.resources.clone();
    c.security_context = spec.container_security_context().cloned();

    let mut ports = vec![container_port(MEMCACHED_PORT_NAME, MEMCACHED_PORT)];
    if spec.enabled_tls().is_some() {
        ports.push(container_port(MEMCACHED_TLS_PORT_NAME, MEMCACHED_TLS_PORT));
    }
    c.ports = Some(ports);

    let mut mounts = Vec::new();
    if spec.enabled_tls().is_some() {
        mounts.push(read_only_mount(TLS_VOLUME, TLS_MOUNT_PATH));
    }
    if spec.enabled_sasl().is_some() {
        mounts.push(read_only_mount(SASL_VOLUME, SASL_MOUNT_PATH));
    }
    c.volume_mounts = if mounts.is_empty() { None } else { Some(mounts) };

    c.liveness_probe = Some(tcp_probe(10, 10));
    c.readiness_probe = Some(tcp_probe(5, 5));

    c.lifecycle = spec.graceful_shutdown(defaults).map(|t| Lifecycle {
        pre_stop: Some(LifecycleHandler {
            exec: Some(ExecAction {
                command: Some(vec![
                    "sleep".to_string(),
                    t.pre_stop_delay_seconds.to_string(),
                ]),
            }),
            ..Default::default()
        }),
        ..Default::default()
    });
}

fn construct_exporter_container(spec: &MemcachedSpec, defaults: &Defaults, c: &mut Container) {
    let monitoring = spec.enabled_monitoring();
    c.image = Some(
        monitoring
            .and_then(|m| m.exporter_image.clone())
            .unwrap_or_else(|| defaults.exporter_image.to_string()),
    );
    c.ports = Some(vec![container_port(METRICS_PORT_NAME, METRICS_PORT)]);
    c.resources = monitoring.and_then(|m| m.exporter_resources.clone());
    c.security_context = spec.container_security_context().cloned();
}

fn container_port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        container_port: port,
        name: Some(name.to_string()),
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

fn read_only_mount(volume: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: volume.to_string(),
        mount_path: path.to_string(),
        read_only: Some(true),
        ..Default::default()
    }
}

fn tcp_probe(initial_delay: i32, period: i32) -> Probe {
    Probe {
        tcp_socket: Some(TCPSocketAction {
            port: IntOrString::String(MEMCACHED_PORT_NAME.to_string()),
            ..Default::default()
        }),
        initial_delay_seconds: Some(initial_delay),
        period_seconds: Some(period),
        timeout_seconds: Some(5),
        failure_threshold: Some(3),
        success_threshold: Some(1),
        ..Default::default()
    }
}

fn volumes(spec: &MemcachedSpec) -> Vec<Volume> {
    let mut volumes = Vec::new();

    if let Some(tls) = spec.enabled_tls() {
        let mut keys = vec!["tls.crt", "tls.key"];
        if tls.enable_client_cert {
            keys.push("ca.crt");
        }
        volumes.push(secret_volume(
            TLS_VOLUME,
            spec.tls_secret_name().unwrap_or_default(),
            &keys,
        ));
    }

    if spec.enabled_sasl().is_some() {
        volumes.push(secret_volume(
            SASL_VOLUME,
            spec.sasl_secret_name().unwrap_or_default(),
            &[SASL_PASSWORD_FILE_KEY],
        ));
    }

    volumes
}

fn secret_volume(volume: &str, secret: &str, keys: &[&str]) -> Volume {
    Volume {
        name: volume.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret.to_string()),
            items: Some(
                keys.iter()
                    .map(|key| KeyToPath {
                        key: (*key).to_string(),
                        path: (*key).to_string(),
                        mode: None,
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Pod anti-affinity for a preset. Soft prefers spreading across nodes,
/// hard requires it.
fn anti_affinity(preset: AntiAffinityPreset, name: &str) -> Affinity {
    let term = PodAffinityTerm {
        label_selector: Some(standard_selector(name)),
        topology_key: HOSTNAME_TOPOLOGY_KEY.to_string(),
        ..Default::default()
    };

    let pod_anti_affinity = match preset {
        AntiAffinityPreset::Soft => PodAntiAffinity {
            preferred_during_scheduling_ignored_during_execution: Some(vec![
                WeightedPodAffinityTerm {
                    weight: ANTI_AFFINITY_WEIGHT,
                    pod_affinity_term: term,
                },
            ]),
            required_during_scheduling_ignored_during_execution: None,
        },
        AntiAffinityPreset::Hard => PodAntiAffinity {
            preferred_during_scheduling_ignored_during_execution: None,
            required_during_scheduling_ignored_during_execution: Some(vec![term]),
        },
    };

    Affinity {
        pod_anti_affinity: Some(pod_anti_affinity),
        ..Default::default()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::get_unwrap
)]
mod tests {
    use super::*;
    use crate::crd::{
        AutoscalingSpec, GracefulShutdownSpec, HighAvailabilitySpec, MemcachedConfig,
        MonitoringSpec, SaslSpec, SecuritySpec, TlsSpec,
    };
    use k8s_openapi::api::core::v1::{LocalObjectReference, SecurityContext};

    const DEFAULTS: Defaults = Defaults::STANDARD;

    fn test_resource(spec: MemcachedSpec) -> Memcached {
        let mut resource = Memcached::new("cache", spec);
        resource.metadata.namespace = Some("default".to_string());
        resource.metadata.uid = Some("test-uid".to_string());
        resource
    }

    fn build(resource: &Memcached) -> Deployment {
        let mut deployment = Deployment::default();
        Deployment::construct(resource, &BuildContext::new(&DEFAULTS, ""), &mut deployment);
        deployment
    }

    fn pod_spec(deployment: &Deployment) -> &PodSpec {
        deployment
            .spec
            .as_ref()
            .unwrap()
            .template
            .spec
            .as_ref()
            .unwrap()
    }

    fn tls_spec(client_cert: bool) -> SecuritySpec {
        SecuritySpec {
            tls: Some(TlsSpec {
                enabled: true,
                certificate_secret_ref: Some(LocalObjectReference {
                    name: "cache-tls".to_string(),
                }),
                enable_client_cert: client_cert,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let deployment = build(&test_resource(MemcachedSpec::default()));
        let spec = deployment.spec.as_ref().unwrap();
        assert_eq!(spec.replicas, Some(1));

        let strategy = spec.strategy.as_ref().unwrap();
        let rolling = strategy.rolling_update.as_ref().unwrap();
        assert_eq!(rolling.max_surge, Some(IntOrString::Int(1)));
        assert_eq!(rolling.max_unavailable, Some(IntOrString::Int(0)));

        let pod = pod_spec(&deployment);
        assert_eq!(pod.containers.len(), 1);
        let container = &pod.containers[0];
        assert_eq!(container.image.as_deref(), Some("memcached:1.6.38"));
        assert_eq!(
            container.args.as_ref().unwrap(),
            &vec!["-m", "64", "-c", "1024", "-t", "4", "-I", "1m"]
        );
        assert!(pod.affinity.is_none());
        assert!(pod.volumes.is_none());
        assert!(pod.termination_grace_period_seconds.is_none());
        assert!(container.lifecycle.is_none());
    }

    #[test]
    fn test_argument_ordering() {
        let spec = MemcachedSpec {
            memcached: Some(MemcachedConfig {
                max_memory_mb: Some(256),
                max_connections: Some(2048),
                threads: Some(8),
                max_item_size: Some("2m".to_string()),
                verbosity: Some(2),
                extra_args: vec!["-o".to_string(), "modern".to_string()],
            }),
            ..Default::default()
        };
        assert_eq!(
            memcached_args(&spec, &DEFAULTS),
            vec![
                "-m", "256", "-c", "2048", "-t", "8", "-I", "2m", "-vv", "-o", "modern"
            ]
        );
    }

    #[test]
    fn test_verbosity_one() {
        let spec = MemcachedSpec {
            memcached: Some(MemcachedConfig {
                verbosity: Some(1),
                ..Default::default()
            }),
            ..Default::default()
        };
        let args = memcached_args(&spec, &DEFAULTS);
        assert!(args.contains(&"-v".to_string()));
        assert!(!args.contains(&"-vv".to_string()));
    }

    #[test]
    fn test_tls_without_client_cert() {
        let deployment = build(&test_resource(MemcachedSpec {
            security: Some(tls_spec(false)),
            ..Default::default()
        }));
        let pod = pod_spec(&deployment);
        let container = &pod.containers[0];
        let args = container.args.as_ref().unwrap();
        assert!(args.contains(&"-Z".to_string()));
        assert!(args.contains(&"ssl_chain_cert=/etc/memcached/tls/tls.crt".to_string()));
        assert!(args.contains(&"ssl_key=/etc/memcached/tls/tls.key".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("ssl_ca_cert=")));

        let ports = container.ports.as_ref().unwrap();
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[1].container_port, 11212);
        assert_eq!(ports[1].name.as_deref(), Some("memcached-tls"));

        let volume = &pod.volumes.as_ref().unwrap()[0];
        let secret = volume.secret.as_ref().unwrap();
        assert_eq!(secret.secret_name.as_deref(), Some("cache-tls"));
        assert_eq!(secret.items.as_ref().unwrap().len(), 2);

        let mount = &container.volume_mounts.as_ref().unwrap()[0];
        assert_eq!(mount.read_only, Some(true));
        assert_eq!(mount.mount_path, "/etc/memcached/tls");
    }

    #[test]
    fn test_tls_with_client_cert() {
        let deployment = build(&test_resource(MemcachedSpec {
            security: Some(tls_spec(true)),
            ..Default::default()
        }));
        let pod = pod_spec(&deployment);
        let args = pod.containers[0].args.as_ref().unwrap();
        assert!(args.contains(&"ssl_ca_cert=/etc/memcached/tls/ca.crt".to_string()));
        let items = pod.volumes.as_ref().unwrap()[0]
            .secret
            .as_ref()
            .unwrap()
            .items
            .as_ref()
            .unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].key, "ca.crt");
    }

    #[test]
    fn test_sasl_mount_and_flag() {
        let deployment = build(&test_resource(MemcachedSpec {
            security: Some(SecuritySpec {
                sasl: Some(SaslSpec {
                    enabled: true,
                    credentials_secret_ref: Some(LocalObjectReference {
                        name: "cache-sasl".to_string(),
                    }),
                }),
                ..Default::default()
            }),
            ..Default::default()
        }));
        let pod = pod_spec(&deployment);
        let args = pod.containers[0].args.as_ref().unwrap();
        let y = args.iter().position(|a| a == "-Y").unwrap();
        assert_eq!(args[y + 1], "/etc/memcached/sasl/password-file");

        let volumes = pod.volumes.as_ref().unwrap();
        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].name, SASL_VOLUME);
        let mounts = pod.containers[0].volume_mounts.as_ref().unwrap();
        assert_eq!(mounts[0].read_only, Some(true));
    }

    #[test]
    fn test_monitoring_sidecar_gets_security_context() {
        let deployment = build(&test_resource(MemcachedSpec {
            monitoring: Some(MonitoringSpec {
                enabled: true,
                ..Default::default()
            }),
            security: Some(SecuritySpec {
                container_security_context: Some(SecurityContext {
                    run_as_non_root: Some(true),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }));
        let pod = pod_spec(&deployment);
        assert_eq!(pod.containers.len(), 2);
        let exporter = &pod.containers[1];
        assert_eq!(exporter.name, EXPORTER_CONTAINER);
        assert_eq!(
            exporter.image.as_deref(),
            Some("prom/memcached-exporter:v0.15.3")
        );
        assert_eq!(exporter.ports.as_ref().unwrap()[0].container_port, 9150);
        for container in &pod.containers {
            assert_eq!(
                container
                    .security_context
                    .as_ref()
                    .and_then(|s| s.run_as_non_root),
                Some(true)
            );
        }
    }

    #[test]
    fn test_disabling_monitoring_removes_sidecar() {
        let mut resource = test_resource(MemcachedSpec {
            monitoring: Some(MonitoringSpec {
                enabled: true,
                ..Default::default()
            }),
            ..Default::default()
        });
        let mut deployment = build(&resource);
        resource.spec.monitoring = None;
        Deployment::construct(
            &resource,
            &BuildContext::new(&DEFAULTS, ""),
            &mut deployment,
        );
        assert_eq!(pod_spec(&deployment).containers.len(), 1);
    }

    #[test]
    fn test_graceful_shutdown_toggle() {
        let mut resource = test_resource(MemcachedSpec {
            high_availability: Some(HighAvailabilitySpec {
                graceful_shutdown: Some(GracefulShutdownSpec {
                    enabled: true,
                    pre_stop_delay_seconds: Some(15),
                    termination_grace_period_seconds: Some(45),
                }),
                ..Default::default()
            }),
            ..Default::default()
        });
        let mut deployment = build(&resource);
        {
            let pod = pod_spec(&deployment);
            assert_eq!(pod.termination_grace_period_seconds, Some(45));
            let command = pod.containers[0]
                .lifecycle
                .as_ref()
                .and_then(|l| l.pre_stop.as_ref())
                .and_then(|h| h.exec.as_ref())
                .and_then(|e| e.command.clone())
                .unwrap();
            assert_eq!(command, vec!["sleep", "15"]);
        }

        resource.spec.high_availability = None;
        Deployment::construct(
            &resource,
            &BuildContext::new(&DEFAULTS, ""),
            &mut deployment,
        );
        let pod = pod_spec(&deployment);
        assert!(pod.termination_grace_period_seconds.is_none());
        assert!(pod.containers[0].lifecycle.is_none());
    }

    #[test]
    fn test_anti_affinity_soft_to_hard_to_none() {
        let mut resource = test_resource(MemcachedSpec {
            high_availability: Some(HighAvailabilitySpec {
                anti_affinity_preset: Some(AntiAffinityPreset::Soft),
                ..Default::default()
            }),
            ..Default::default()
        });
        let mut deployment = build(&resource);
        {
            let anti = pod_spec(&deployment)
                .affinity
                .as_ref()
                .unwrap()
                .pod_anti_affinity
                .as_ref()
                .unwrap();
            let preferred = anti
                .preferred_during_scheduling_ignored_during_execution
                .as_ref()
                .unwrap();
            assert_eq!(preferred[0].weight, 100);
            assert_eq!(
                preferred[0].pod_affinity_term.topology_key,
                "kubernetes.io/hostname"
            );
        }

        resource.spec.high_availability = Some(HighAvailabilitySpec {
            anti_affinity_preset: Some(AntiAffinityPreset::Hard),
            ..Default::default()
        });
        let ctx = BuildContext::new(&DEFAULTS, "");
        Deployment::construct(&resource, &ctx, &mut deployment);
        {
            let anti = pod_spec(&deployment)
                .affinity
                .as_ref()
                .unwrap()
                .pod_anti_affinity
                .as_ref()
                .unwrap();
            assert!(
                anti.preferred_during_scheduling_ignored_during_execution
                    .as_ref()
                    .is_none_or(Vec::is_empty)
            );
            assert_eq!(
                anti.required_during_scheduling_ignored_during_execution
                    .as_ref()
                    .unwrap()
                    .len(),
                1
            );
        }

        resource.spec.high_availability = None;
        Deployment::construct(&resource, &ctx, &mut deployment);
        assert!(pod_spec(&deployment).affinity.is_none());
    }

    #[test]
    fn test_autoscaling_leaves_replicas_alone() {
        let resource = test_resource(MemcachedSpec {
            replicas: Some(3),
            autoscaling: Some(AutoscalingSpec {
                enabled: true,
                max_replicas: 10,
                ..Default::default()
            }),
            ..Default::default()
        });
        let mut deployment = Deployment::default();
        deployment.spec.get_or_insert_with(Default::default).replicas = Some(7);
        Deployment::construct(
            &resource,
            &BuildContext::new(&DEFAULTS, ""),
            &mut deployment,
        );
        assert_eq!(deployment.spec.unwrap().replicas, Some(7));
    }

    #[test]
    fn test_secret_hash_annotation_set_and_cleared() {
        let resource = test_resource(MemcachedSpec::default());
        let mut deployment = Deployment::default();
        Deployment::construct(
            &resource,
            &BuildContext::new(&DEFAULTS, "abc123"),
            &mut deployment,
        );
        let annotations = deployment
            .spec
            .as_ref()
            .and_then(|s| s.template.metadata.as_ref())
            .and_then(|m| m.annotations.clone())
            .unwrap();
        assert_eq!(
            annotations.get(SECRET_HASH_ANNOTATION),
            Some(&"abc123".to_string())
        );

        Deployment::construct(
            &resource,
            &BuildContext::new(&DEFAULTS, ""),
            &mut deployment,
        );
        let annotations = deployment
            .spec
            .as_ref()
            .and_then(|s| s.template.metadata.as_ref())
            .and_then(|m| m.annotations.clone());
        assert!(annotations.is_none());
    }

    #[test]
    fn test_idempotent() {
        let resource = test_resource(MemcachedSpec {
            security: Some(tls_spec(true)),
            monitoring: Some(MonitoringSpec {
                enabled: true,
                ..Default::default()
            }),
            ..Default::default()
        });
        let ctx = BuildContext::new(&DEFAULTS, "hash");
        let mut deployment = Deployment::default();
        Deployment::construct(&resource, &ctx, &mut deployment);
        let first = deployment.clone();
        Deployment::construct(&resource, &ctx, &mut deployment);
        assert_eq!(first, deployment);
    }

    #[test]
    fn test_single_controller_owner_reference() {
        let deployment = build(&test_resource(MemcachedSpec::default()));
        let owners = deployment.metadata.owner_references.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].controller, Some(true));
        assert_eq!(owners[0].block_owner_deletion, Some(true));
    }
}
