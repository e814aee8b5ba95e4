//! Custom Resource Definitions (CRDs) for memcached-operator.
//!
//! - `Memcached`: Desired state of one Memcached instance
//! - `Defaults`: Default values and bounds shared with admission validation

mod defaults;
mod memcached;

pub use defaults::*;
pub use memcached::*;
