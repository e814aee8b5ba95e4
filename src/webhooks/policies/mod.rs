//! Validation policies for Memcached admission webhooks.
//!
//! Policies are organized into tiers:
//! - Tier 1 (Bounds): numeric ranges and formats shared with the constructors
//! - Tier 2 (Consistency): fields that only make sense together

pub mod bounds;
pub mod consistency;

use crate::crd::{Defaults, Memcached};

/// Result of a validation check
#[derive(Debug)]
pub struct ValidationResult {
    /// Whether the validation passed
    pub allowed: bool,
    /// Reason for denial (if not allowed)
    pub reason: Option<String>,
    /// Detailed message (if not allowed)
    pub message: Option<String>,
}

impl ValidationResult {
    /// Create an allowed result
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            message: None,
        }
    }

    /// Create a denied result
    pub fn denied(reason: &str, message: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        }
    }
}

/// Context for validation
#[derive(Debug)]
pub struct ValidationContext<'a> {
    /// The resource being validated
    pub resource: &'a Memcached,
    /// The old resource (for UPDATE operations)
    pub old_resource: Option<&'a Memcached>,
    /// Defaults and bounds, the same table the constructors use
    pub defaults: &'a Defaults,
    /// Whether this is a dry-run request
    pub dry_run: bool,
    /// The namespace of the resource
    pub namespace: Option<&'a str>,
}

impl ValidationContext<'_> {
    /// Check if this is an UPDATE operation
    pub fn is_update(&self) -> bool {
        self.old_resource.is_some()
    }
}

/// Run all validation policies
pub fn validate_all(ctx: &ValidationContext<'_>) -> ValidationResult {
    let result = bounds::validate(ctx);
    if !result.allowed {
        return result;
    }

    let result = consistency::validate(ctx);
    if !result.allowed {
        return result;
    }

    ValidationResult::allowed()
}
