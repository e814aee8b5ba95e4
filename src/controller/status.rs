//! Status condition engine.
//!
//! Derives the Available, Progressing and Degraded conditions from replica
//! counters and the missing-secret set. Everything here is pure; the caller
//! supplies the timestamp used for transitions.

use k8s_openapi::api::apps::v1::Deployment;

use crate::crd::{Condition, ConditionType, Defaults, Memcached, MemcachedStatus};

pub const REASON_AVAILABLE: &str = "MinimumReplicasAvailable";
pub const REASON_UNAVAILABLE: &str = "NoReplicasAvailable";
pub const REASON_NOT_CREATED: &str = "DeploymentNotCreated";
pub const REASON_ROLLING_OUT: &str = "RollingUpdate";
pub const REASON_COMPLETE: &str = "RolloutComplete";
pub const REASON_SECRET_NOT_FOUND: &str = "SecretNotFound";
pub const REASON_REPLICA_SHORTFALL: &str = "InsufficientReplicas";
pub const REASON_HEALTHY: &str = "AllReplicasReady";

/// Replica counters read from a live Deployment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeploymentObservation {
    pub replicas: i32,
    pub ready_replicas: i32,
    pub updated_replicas: i32,
}

impl DeploymentObservation {
    pub fn from_deployment(deployment: &Deployment) -> Self {
        let status = deployment.status.as_ref();
        Self {
            replicas: status.and_then(|s| s.replicas).unwrap_or(0),
            ready_replicas: status.and_then(|s| s.ready_replicas).unwrap_or(0),
            updated_replicas: status.and_then(|s| s.updated_replicas).unwrap_or(0),
        }
    }
}

/// Inputs to [`compute_conditions`].
#[derive(Clone, Copy, Debug)]
pub struct StatusInputs<'a> {
    pub deployment: Option<DeploymentObservation>,
    pub missing_secrets: &'a [String],
    pub autoscaling_active: bool,
}

/// Replica count the instance should converge to.
///
/// With autoscaling active the autoscaler is authoritative, so the live
/// Deployment's observed total is used instead of the spec.
pub fn desired_replicas(
    resource: &Memcached,
    defaults: &Defaults,
    deployment: Option<&DeploymentObservation>,
    autoscaling_active: bool,
) -> i32 {
    if autoscaling_active {
        deployment.map(|d| d.replicas).unwrap_or(0)
    } else {
        resource.spec.replicas_or_default(defaults)
    }
}

/// A condition before its timestamp and generation are attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConditionState {
    pub condition_type: ConditionType,
    pub status: bool,
    pub reason: &'static str,
    pub message: String,
}

/// Compute the three conditions in Available, Progressing, Degraded order.
pub fn compute_conditions(
    resource: &Memcached,
    defaults: &Defaults,
    inputs: &StatusInputs<'_>,
) -> [ConditionState; 3] {
    let observed = inputs.deployment.as_ref();
    let desired = desired_replicas(
        resource,
        defaults,
        observed,
        inputs.autoscaling_active,
    );
    let ready = observed.map(|d| d.ready_replicas).unwrap_or(0);

    let available = if ready > 0 {
        ConditionState {
            condition_type: ConditionType::Available,
            status: true,
            reason: REASON_AVAILABLE,
            message: format!("{ready} replica(s) ready"),
        }
    } else {
        ConditionState {
            condition_type: ConditionType::Available,
            status: false,
            reason: REASON_UNAVAILABLE,
            message: "no replicas ready".to_string(),
        }
    };

    let progressing = match observed {
        None => ConditionState {
            condition_type: ConditionType::Progressing,
            status: true,
            reason: REASON_NOT_CREATED,
            message: "deployment not yet created".to_string(),
        },
        Some(d) if d.updated_replicas < desired || d.replicas != desired => ConditionState {
            condition_type: ConditionType::Progressing,
            status: true,
            reason: REASON_ROLLING_OUT,
            message: format!("rollout in progress: {}/{desired}", d.updated_replicas),
        },
        Some(_) => ConditionState {
            condition_type: ConditionType::Progressing,
            status: false,
            reason: REASON_COMPLETE,
            message: format!("rollout complete: {desired} replica(s)"),
        },
    };

    // Missing credentials take precedence over replica health
    let degraded = if !inputs.missing_secrets.is_empty() {
        ConditionState {
            condition_type: ConditionType::Degraded,
            status: true,
            reason: REASON_SECRET_NOT_FOUND,
            message: format!(
                "referenced secret(s) not found: {}",
                inputs.missing_secrets.join(", ")
            ),
        }
    } else if desired > 0 && ready < desired {
        ConditionState {
            condition_type: ConditionType::Degraded,
            status: true,
            reason: REASON_REPLICA_SHORTFALL,
            message: format!("{ready}/{desired} replicas ready"),
        }
    } else {
        ConditionState {
            condition_type: ConditionType::Degraded,
            status: false,
            reason: REASON_HEALTHY,
            message: format!("{ready}/{desired} replicas ready"),
        }
    };

    [available, progressing, degraded]
}

/// Builder for managing conditions list
///
/// Seeded with the previously stored conditions so a condition whose status
/// did not change keeps its `lastTransitionTime`.
#[derive(Debug)]
pub struct ConditionBuilder {
    previous: Vec<Condition>,
    conditions: Vec<Condition>,
    generation: Option<i64>,
    now: String,
}

impl ConditionBuilder {
    pub fn new(previous: &[Condition], generation: Option<i64>, now: impl Into<String>) -> Self {
        Self {
            previous: previous.to_vec(),
            conditions: Vec::new(),
            generation,
            now: now.into(),
        }
    }

    /// Add or update a condition
    pub fn set(&mut self, state: ConditionState) -> &mut Self {
        let type_name = state.condition_type.to_string();
        let status = if state.status { "True" } else { "False" };
        let transition_time = self
            .previous
            .iter()
            .find(|c| c.r#type == type_name && c.status == status)
            .map(|c| c.last_transition_time.clone())
            .unwrap_or_else(|| self.now.clone());

        let condition = Condition::new(
            state.condition_type,
            state.status,
            state.reason,
            &state.message,
            self.generation,
            transition_time,
        );

        if let Some(existing) = self
            .conditions
            .iter_mut()
            .find(|c| c.r#type == condition.r#type)
        {
            *existing = condition;
        } else {
            self.conditions.push(condition);
        }
        self
    }

    /// Build the conditions list
    pub fn build(self) -> Vec<Condition> {
        self.conditions
    }
}

/// Full status for one reconciliation pass.
pub fn build_status(
    resource: &Memcached,
    defaults: &Defaults,
    inputs: &StatusInputs<'_>,
    now: &str,
) -> MemcachedStatus {
    let previous = resource
        .status
        .as_ref()
        .map(|s| s.conditions.as_slice())
        .unwrap_or_default();
    let generation = resource.metadata.generation;

    let mut builder = ConditionBuilder::new(previous, generation, now);
    for state in compute_conditions(resource, defaults, inputs) {
        builder.set(state);
    }

    MemcachedStatus {
        ready_replicas: inputs.deployment.map(|d| d.ready_replicas).unwrap_or(0),
        observed_generation: generation,
        conditions: builder.build(),
    }
}

/// Check if a condition type is true
pub fn is_condition_true(conditions: &[Condition], condition_type: ConditionType) -> bool {
    let type_name = condition_type.to_string();
    conditions
        .iter()
        .find(|c| c.r#type == type_name)
        .is_some_and(Condition::is_true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::crd::MemcachedSpec;

    const DEFAULTS: Defaults = Defaults::STANDARD;

    fn resource(replicas: i32) -> Memcached {
        let mut mc = Memcached::new(
            "cache",
            MemcachedSpec {
                replicas: Some(replicas),
                ..Default::default()
            },
        );
        mc.metadata.generation = Some(4);
        mc
    }

    fn observed(replicas: i32, ready: i32, updated: i32) -> DeploymentObservation {
        DeploymentObservation {
            replicas,
            ready_replicas: ready,
            updated_replicas: updated,
        }
    }

    #[test]
    fn test_not_yet_created() {
        let [available, progressing, degraded] = compute_conditions(
            &resource(3),
            &DEFAULTS,
            &StatusInputs {
                deployment: None,
                missing_secrets: &[],
                autoscaling_active: false,
            },
        );
        assert!(!available.status);
        assert!(progressing.status);
        assert_eq!(progressing.message, "deployment not yet created");
        assert!(degraded.status);
        assert_eq!(degraded.reason, REASON_REPLICA_SHORTFALL);
    }

    #[test]
    fn test_rollout_in_progress_message() {
        let [_, progressing, _] = compute_conditions(
            &resource(3),
            &DEFAULTS,
            &StatusInputs {
                deployment: Some(observed(3, 2, 1)),
                missing_secrets: &[],
                autoscaling_active: false,
            },
        );
        assert!(progressing.status);
        assert_eq!(progressing.message, "rollout in progress: 1/3");
    }

    #[test]
    fn test_healthy() {
        let [available, progressing, degraded] = compute_conditions(
            &resource(3),
            &DEFAULTS,
            &StatusInputs {
                deployment: Some(observed(3, 3, 3)),
                missing_secrets: &[],
                autoscaling_active: false,
            },
        );
        assert!(available.status);
        assert!(!progressing.status);
        assert!(!degraded.status);
    }

    #[test]
    fn test_missing_secret_overrides_shortfall() {
        let missing = vec!["sasl-creds".to_string()];
        let [_, _, degraded] = compute_conditions(
            &resource(3),
            &DEFAULTS,
            &StatusInputs {
                deployment: Some(observed(3, 0, 3)),
                missing_secrets: &missing,
                autoscaling_active: false,
            },
        );
        assert!(degraded.status);
        assert_eq!(degraded.reason, REASON_SECRET_NOT_FOUND);
        assert!(degraded.message.contains("sasl-creds"));
    }

    #[test]
    fn test_zero_desired_is_not_available_nor_degraded() {
        let [available, _, degraded] = compute_conditions(
            &resource(0),
            &DEFAULTS,
            &StatusInputs {
                deployment: Some(observed(0, 0, 0)),
                missing_secrets: &[],
                autoscaling_active: false,
            },
        );
        assert!(!available.status);
        assert!(!degraded.status);
    }

    #[test]
    fn test_autoscaling_uses_live_replicas() {
        let [_, progressing, degraded] = compute_conditions(
            &resource(1),
            &DEFAULTS,
            &StatusInputs {
                deployment: Some(observed(5, 5, 5)),
                missing_secrets: &[],
                autoscaling_active: true,
            },
        );
        assert!(!progressing.status);
        assert!(!degraded.status);
    }

    #[test]
    fn test_transition_time_kept_when_status_unchanged() {
        let mut mc = resource(1);
        let inputs = StatusInputs {
            deployment: Some(observed(1, 1, 1)),
            missing_secrets: &[],
            autoscaling_active: false,
        };
        let first = build_status(&mc, &DEFAULTS, &inputs, "2026-01-01T00:00:00Z");
        mc.status = Some(first.clone());

        let second = build_status(&mc, &DEFAULTS, &inputs, "2026-01-02T00:00:00Z");
        assert_eq!(first.conditions, second.conditions);

        let degraded_inputs = StatusInputs {
            deployment: Some(observed(1, 0, 1)),
            ..inputs
        };
        let third = build_status(&mc, &DEFAULTS, &degraded_inputs, "2026-01-03T00:00:00Z");
        let available = third
            .conditions
            .iter()
            .find(|c| c.r#type == "Available")
            .unwrap();
        assert_eq!(available.last_transition_time, "2026-01-03T00:00:00Z");
        let progressing = third
            .conditions
            .iter()
            .find(|c| c.r#type == "Progressing")
            .unwrap();
        assert_eq!(progressing.last_transition_time, "2026-01-01T00:00:00Z");
    }

    #[test]
    fn test_observed_generation_matches_metadata() {
        let status = build_status(
            &resource(1),
            &DEFAULTS,
            &StatusInputs {
                deployment: None,
                missing_secrets: &[],
                autoscaling_active: false,
            },
            "2026-01-01T00:00:00Z",
        );
        assert_eq!(status.observed_generation, Some(4));
        assert_eq!(status.conditions.len(), 3);
        assert!(status
            .conditions
            .iter()
            .all(|c| c.observed_generation == Some(4)));
        assert!(!is_condition_true(&status.conditions, ConditionType::Available));
    }
}
