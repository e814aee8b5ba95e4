// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Property-based tests for memcached-operator.
//!
//! Uses proptest to generate random inputs and verify invariants.

#[path = "../common/fixtures.rs"]
mod fixtures;

use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use proptest::prelude::*;

use memcached_operator::controller::secret_mapper::secret_reconcile_targets;
use memcached_operator::controller::secrets::secret_hash;
use memcached_operator::crd::{AntiAffinityPreset, Defaults, Memcached, MemcachedConfig};
use memcached_operator::resources::deployment::memcached_args;
use memcached_operator::resources::{BuildContext, Dependent};

use fixtures::MemcachedBuilder;

const DEFAULTS: Defaults = Defaults::STANDARD;

/// Strategy for generating extra memcached flags that never collide with
/// flags the operator emits itself.
fn extra_arg() -> impl Strategy<Value = String> {
    "--[a-z]{2,10}(=[a-z0-9]{1,6})?"
}

fn any_preset() -> impl Strategy<Value = Option<AntiAffinityPreset>> {
    prop_oneof![
        Just(None),
        Just(Some(AntiAffinityPreset::Soft)),
        Just(Some(AntiAffinityPreset::Hard)),
    ]
}

/// Strategy for generating resources across every feature toggle.
fn any_memcached() -> impl Strategy<Value = Memcached> {
    (
        (0..=64i32, 16..=4096i32, 0..=2i32),
        proptest::collection::vec(extra_arg(), 0..4),
        (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()),
        (any::<bool>(), any::<bool>(), any::<bool>()),
        any_preset(),
    )
        .prop_map(
            |(
                (replicas, memory, verbosity),
                extra_args,
                (monitoring, sasl, tls, client_cert),
                (spread, shutdown, autoscaling),
                preset,
            )| {
                let mut builder = MemcachedBuilder::new("cache")
                    .replicas(replicas)
                    .engine(MemcachedConfig {
                        max_memory_mb: Some(memory),
                        verbosity: Some(verbosity),
                        extra_args,
                        ..Default::default()
                    });
                if monitoring {
                    builder = builder.monitoring();
                }
                if sasl {
                    builder = builder.sasl("creds");
                }
                if tls {
                    builder = builder.tls("certs", client_cert);
                }
                if spread {
                    builder = builder.topology_spread("topology.kubernetes.io/zone");
                }
                if shutdown {
                    builder = builder.graceful_shutdown(10, 30);
                }
                if autoscaling {
                    builder = builder.autoscaling(1, 5);
                }
                if let Some(preset) = preset {
                    builder = builder.anti_affinity(preset);
                }
                builder.build()
            },
        )
}

fn secret(entries: &[(String, Vec<u8>)]) -> Secret {
    Secret {
        data: Some(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), ByteString(v.clone())))
                .collect(),
        ),
        ..Default::default()
    }
}

/// Running a constructor against its own output must not change it.
fn assert_idempotent<K: Dependent>(resource: &Memcached, hash: &str) {
    let ctx = BuildContext::new(&DEFAULTS, hash);
    let mut first = K::default();
    K::construct(resource, &ctx, &mut first);
    let mut second = first.clone();
    K::construct(resource, &ctx, &mut second);
    assert_eq!(first, second, "{} constructor is not idempotent", K::KIND);
}

proptest! {
    #[test]
    fn constructors_are_idempotent(resource in any_memcached(), hash in "[0-9a-f]{0,16}") {
        assert_idempotent::<Deployment>(&resource, &hash);
        assert_idempotent::<Service>(&resource, &hash);
        assert_idempotent::<PodDisruptionBudget>(&resource, &hash);
        assert_idempotent::<HorizontalPodAutoscaler>(&resource, &hash);
        assert_idempotent::<NetworkPolicy>(&resource, &hash);
    }

    #[test]
    fn reconstruct_from_other_config_matches_fresh(
        before in any_memcached(),
        after in any_memcached(),
    ) {
        // An active autoscaler keeps whatever replica count is live
        prop_assume!(!after.spec.autoscaling_active());
        let ctx = BuildContext::new(&DEFAULTS, "");

        let mut reused = Deployment::default();
        Deployment::construct(&before, &ctx, &mut reused);
        Deployment::construct(&after, &ctx, &mut reused);

        let mut fresh = Deployment::default();
        Deployment::construct(&after, &ctx, &mut fresh);

        prop_assert_eq!(reused.spec, fresh.spec);
    }

    #[test]
    fn args_keep_flag_order(resource in any_memcached()) {
        let args = memcached_args(&resource.spec, &DEFAULTS);

        prop_assert_eq!(&args[0], "-m");
        prop_assert_eq!(&args[2], "-c");
        prop_assert_eq!(&args[4], "-t");
        prop_assert_eq!(&args[6], "-I");

        let position = |flag: &str| args.iter().position(|a| a == flag);
        let last_extra = resource
            .spec
            .memcached
            .as_ref()
            .and_then(|c| c.extra_args.last())
            .and_then(|last| args.iter().rposition(|a| a == last));

        if let (Some(extra), Some(tls)) = (last_extra, position("-Z")) {
            prop_assert!(extra < tls);
        }
        if let (Some(extra), Some(sasl)) = (last_extra, position("-Y")) {
            prop_assert!(extra < sasl);
        }
        if let (Some(tls), Some(sasl)) = (position("-Z"), position("-Y")) {
            prop_assert!(tls < sasl);
        }
        prop_assert_eq!(position("-Z").is_some(), resource.spec.enabled_tls().is_some());
        prop_assert_eq!(position("-Y").is_some(), resource.spec.enabled_sasl().is_some());
    }

    #[test]
    fn secret_hash_independent_of_insertion_order(
        entries in proptest::collection::btree_map("[a-z]{1,8}", proptest::collection::vec(any::<u8>(), 1..16), 1..6),
    ) {
        let entries: Vec<(String, Vec<u8>)> = entries.into_iter().collect();

        let mut forward = BTreeMap::new();
        forward.insert("creds".to_string(), secret(&entries));
        forward.insert("certs".to_string(), secret(&entries[..1]));

        let reversed_entries: Vec<_> = entries.iter().rev().cloned().collect();
        let mut reversed = BTreeMap::new();
        reversed.insert("certs".to_string(), secret(&entries[..1]));
        reversed.insert("creds".to_string(), secret(&reversed_entries));

        let hash = secret_hash(&forward);
        prop_assert_eq!(hash.len(), 64);
        prop_assert_eq!(hash, secret_hash(&reversed));
    }

    #[test]
    fn secret_hash_tracks_values(
        key in "[a-z]{1,8}",
        value in proptest::collection::vec(any::<u8>(), 1..16),
    ) {
        let mut original = BTreeMap::new();
        original.insert("creds".to_string(), secret(&[(key.clone(), value.clone())]));

        let mut rotated_value = value.clone();
        rotated_value[0] = rotated_value[0].wrapping_add(1);
        let mut rotated = BTreeMap::new();
        rotated.insert("creds".to_string(), secret(&[(key, rotated_value)]));

        prop_assert_ne!(secret_hash(&original), secret_hash(&rotated));
    }

    #[test]
    fn mapper_stays_in_namespace(
        namespaces in proptest::collection::vec(prop_oneof![Just("a"), Just("b"), Just("c")], 1..8),
        target in prop_oneof![Just("a"), Just("b"), Just("c")],
    ) {
        let resources: Vec<Memcached> = namespaces
            .iter()
            .enumerate()
            .map(|(i, ns)| {
                MemcachedBuilder::new(format!("cache-{i}"))
                    .namespace(*ns)
                    .sasl("creds")
                    .build()
            })
            .collect();

        let targets = secret_reconcile_targets("creds", target, &resources);
        let expected = namespaces.iter().filter(|ns| **ns == target).count();

        prop_assert_eq!(targets.len(), expected);
        for r in &targets {
            prop_assert_eq!(r.namespace.as_deref(), Some(target));
        }
    }
}
