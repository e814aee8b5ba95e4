//! Error types for the controller.
//!
//! Defines custom error types with classification for retry behavior.

use std::time::Duration;
use thiserror::Error;

/// Error type for controller operations
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Missing required field in resource
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Applying one dependent object failed
    #[error("Failed to apply {kind} {name}: {source}")]
    Apply {
        kind: &'static str,
        name: String,
        #[source]
        source: kube::Error,
    },

    /// An object with the dependent's name is controlled by someone else
    #[error("{kind} {name} is controlled by {owner}, refusing to modify it")]
    ForeignOwner {
        kind: &'static str,
        name: String,
        owner: String,
    },

    /// One or more non-workload dependents failed; the rest were still applied
    #[error("{} dependent object(s) failed: {}", .0.len(), join_errors(.0))]
    DependentApply(Vec<Error>),

    /// Writing the status subresource failed
    #[error("Failed to update status: {0}")]
    StatusPatch(#[source] kube::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn kube_retryable(e: &kube::Error) -> bool {
    // Retry on network errors, rate limiting, conflicts and server errors
    matches!(
        e,
        kube::Error::Api(api_err)
            if api_err.code >= 500 || api_err.code == 429 || api_err.code == 409
    ) || matches!(e, kube::Error::Service(_))
}

impl Error {
    /// Check if this error indicates a not-found condition
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Kube(kube::Error::Api(e)) => e.code == 404,
            Error::Apply {
                source: kube::Error::Api(e),
                ..
            } => e.code == 404,
            _ => false,
        }
    }

    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube(e) | Error::StatusPatch(e) => kube_retryable(e),
            Error::Apply { source, .. } => kube_retryable(source),
            Error::DependentApply(errors) => errors.iter().any(Error::is_retryable),
            Error::MissingField(_) | Error::ForeignOwner { .. } | Error::Serialization(_) => {
                false
            }
        }
    }

    /// Check if this is a write conflict (409) worth re-reading and retrying
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Kube(kube::Error::Api(e))
            | Error::Apply {
                source: kube::Error::Api(e),
                ..
            } => e.code == 409,
            _ => false,
        }
    }

    /// Short label for metrics
    pub fn metric_label(&self) -> &'static str {
        match self {
            Error::Kube(_) => "kube",
            Error::MissingField(_) => "missing_field",
            Error::Apply { .. } => "apply",
            Error::ForeignOwner { .. } => "foreign_owner",
            Error::DependentApply(_) => "dependent_apply",
            Error::StatusPatch(_) => "status_patch",
            Error::Serialization(_) => "serialization",
        }
    }

    /// Get the recommended requeue duration for this error
    pub fn requeue_after(&self) -> Duration {
        if self.is_retryable() {
            Duration::from_secs(30)
        } else {
            Duration::from_secs(300)
        }
    }
}

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, Error>;
