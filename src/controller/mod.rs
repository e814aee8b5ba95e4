//! Controller module for memcached-operator.
//!
//! Contains the reconciliation loop, the create-or-update harness, secret
//! tracking, status derivation and error handling.

pub mod apply;
pub mod context;
pub mod error;
pub mod reconciler;
pub mod secret_mapper;
pub mod secrets;
pub mod status;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod test_client;
