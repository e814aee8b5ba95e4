//! Numeric range and format validation policy.
//!
//! Tier 1: Always enforced
//!
//! Validates:
//! - Replica count is within bounds
//! - Engine memory, connections, threads and verbosity are within bounds
//! - `maxItemSize` is a number followed by `k` or `m`
//! - Graceful shutdown timings are within bounds

use std::borrow::Cow;
use std::fmt::Display;
use std::sync::LazyLock;

use regex::Regex;

use super::{ValidationContext, ValidationResult};
use crate::crd::{Bounds, Defaults};

/// Compiled once for the standard `maxItemSize` pattern.
static MAX_ITEM_SIZE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(Defaults::STANDARD.max_item_size_pattern).ok());

/// The standard pattern comes from the cache; any other pattern is compiled.
fn max_item_size_regex(pattern: &str) -> Result<Cow<'static, Regex>, regex::Error> {
    match MAX_ITEM_SIZE_RE.as_ref() {
        Some(re) if re.as_str() == pattern => Ok(Cow::Borrowed(re)),
        _ => Regex::new(pattern).map(Cow::Owned),
    }
}

fn check<T: PartialOrd + Copy + Display>(
    field: &str,
    reason: &str,
    value: Option<T>,
    bounds: Bounds<T>,
) -> Option<ValidationResult> {
    let value = value?;
    if bounds.contains(value) {
        return None;
    }
    Some(ValidationResult::denied(
        reason,
        &format!(
            "{} must be between {} and {} (got {})",
            field, bounds.min, bounds.max, value
        ),
    ))
}

/// Validate ranges and formats
pub fn validate(ctx: &ValidationContext<'_>) -> ValidationResult {
    let spec = &ctx.resource.spec;
    let d = ctx.defaults;
    let config = spec.memcached.as_ref();
    let shutdown = spec
        .high_availability
        .as_ref()
        .and_then(|ha| ha.graceful_shutdown.as_ref());

    let checks = [
        check("spec.replicas", "InvalidReplicas", spec.replicas, d.replicas_bounds),
        check(
            "spec.memcached.maxMemoryMB",
            "InvalidMemory",
            config.and_then(|c| c.max_memory_mb),
            d.max_memory_mb_bounds,
        ),
        check(
            "spec.memcached.maxConnections",
            "InvalidConnections",
            config.and_then(|c| c.max_connections),
            d.max_connections_bounds,
        ),
        check(
            "spec.memcached.threads",
            "InvalidThreads",
            config.and_then(|c| c.threads),
            d.threads_bounds,
        ),
        check(
            "spec.memcached.verbosity",
            "InvalidVerbosity",
            config.and_then(|c| c.verbosity),
            d.verbosity_bounds,
        ),
    ];
    if let Some(denied) = checks.into_iter().flatten().next() {
        return denied;
    }

    let shutdown_checks = [
        check(
            "spec.highAvailability.gracefulShutdown.preStopDelaySeconds",
            "InvalidGracefulShutdown",
            shutdown.and_then(|s| s.pre_stop_delay_seconds),
            d.pre_stop_delay_bounds,
        ),
        check(
            "spec.highAvailability.gracefulShutdown.terminationGracePeriodSeconds",
            "InvalidGracefulShutdown",
            shutdown.and_then(|s| s.termination_grace_period_seconds),
            d.termination_grace_period_bounds,
        ),
    ];
    if let Some(denied) = shutdown_checks.into_iter().flatten().next() {
        return denied;
    }

    if let Some(size) = config.and_then(|c| c.max_item_size.as_deref()) {
        match max_item_size_regex(d.max_item_size_pattern) {
            Ok(re) if re.is_match(size) => {}
            Ok(_) => {
                return ValidationResult::denied(
                    "InvalidMaxItemSize",
                    &format!(
                        "spec.memcached.maxItemSize must look like 1m or 512k (got {})",
                        size
                    ),
                );
            }
            Err(e) => {
                return ValidationResult::denied("InternalError", &e.to_string());
            }
        }
    }

    ValidationResult::allowed()
}
