//! Cross-field consistency policy.
//!
//! Tier 2: Always enforced, after bounds
//!
//! Validates:
//! - A disruption budget sets at most one of minAvailable / maxUnavailable
//! - The termination grace period exceeds the preStop delay
//! - Autoscaling bounds are positive and ordered
//! - Enabled SASL and TLS blocks name a secret

use super::{ValidationContext, ValidationResult};

/// Validate cross-field rules
pub fn validate(ctx: &ValidationContext<'_>) -> ValidationResult {
    let spec = &ctx.resource.spec;

    if let Some(pdb) = spec.enabled_pdb() {
        if pdb.min_available.is_some() && pdb.max_unavailable.is_some() {
            return ValidationResult::denied(
                "InvalidPodDisruptionBudget",
                "spec.highAvailability.podDisruptionBudget: minAvailable and maxUnavailable are mutually exclusive",
            );
        }
    }

    if let Some(timings) = spec.graceful_shutdown(ctx.defaults) {
        if timings.termination_grace_period_seconds <= timings.pre_stop_delay_seconds {
            return ValidationResult::denied(
                "InvalidGracefulShutdown",
                &format!(
                    "terminationGracePeriodSeconds ({}) must exceed preStopDelaySeconds ({})",
                    timings.termination_grace_period_seconds, timings.pre_stop_delay_seconds
                ),
            );
        }
    }

    if let Some(autoscaling) = spec.enabled_autoscaling() {
        let min = autoscaling.min_replicas.unwrap_or(1);
        if min < 1 || autoscaling.max_replicas < 1 {
            return ValidationResult::denied(
                "InvalidAutoscaling",
                "spec.autoscaling: minReplicas and maxReplicas must be at least 1",
            );
        }
        if min > autoscaling.max_replicas {
            return ValidationResult::denied(
                "InvalidAutoscaling",
                &format!(
                    "spec.autoscaling.minReplicas ({}) cannot exceed maxReplicas ({})",
                    min, autoscaling.max_replicas
                ),
            );
        }
    }

    if spec.enabled_sasl().is_some() && spec.sasl_secret_name().is_none() {
        return ValidationResult::denied(
            "MissingSecretRef",
            "spec.security.sasl.credentialsSecretRef.name is required when SASL is enabled",
        );
    }

    if spec.enabled_tls().is_some() && spec.tls_secret_name().is_none() {
        return ValidationResult::denied(
            "MissingSecretRef",
            "spec.security.tls.certificateSecretRef.name is required when TLS is enabled",
        );
    }

    ValidationResult::allowed()
}
