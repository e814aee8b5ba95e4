//! Webhook module for validating admission requests.
//!
//! Validation reads the same [`crate::crd::Defaults`] table as the resource
//! constructors:
//! - Tier 1 (Bounds): numeric ranges and the `maxItemSize` format
//! - Tier 2 (Consistency): cross-field rules

pub mod policies;
mod server;

pub use policies::{ValidationContext, ValidationResult};
pub use server::{
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookError, WebhookState,
    create_webhook_router, run_webhook_server,
};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
