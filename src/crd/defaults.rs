//! Default values and numeric bounds for `Memcached` resources.
//!
//! The same [`Defaults`] value is handed to the resource constructors and to
//! the admission policies so the value a webhook fills in and the value a
//! constructor falls back to can never disagree.

/// Inclusive numeric range accepted for a spec field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Bounds<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy> Bounds<T> {
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    /// Whether `value` falls inside the range.
    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Immutable table of defaults and bounds shared by constructors and
/// admission validation.
#[derive(Clone, Debug)]
pub struct Defaults {
    pub replicas: i32,
    pub replicas_bounds: Bounds<i32>,

    pub image: &'static str,
    pub exporter_image: &'static str,

    pub max_memory_mb: i32,
    pub max_memory_mb_bounds: Bounds<i32>,
    pub max_connections: i32,
    pub max_connections_bounds: Bounds<i32>,
    pub threads: i32,
    pub threads_bounds: Bounds<i32>,
    pub max_item_size: &'static str,
    /// Pattern `maxItemSize` must match.
    pub max_item_size_pattern: &'static str,
    pub verbosity_bounds: Bounds<i32>,

    /// Minimum available pods when a disruption budget names neither mode.
    pub pdb_min_available: i32,

    pub pre_stop_delay_seconds: i64,
    pub pre_stop_delay_bounds: Bounds<i64>,
    pub termination_grace_period_seconds: i64,
    pub termination_grace_period_bounds: Bounds<i64>,
}

impl Defaults {
    /// The defaults installed with the operator.
    pub const STANDARD: Defaults = Defaults {
        replicas: 1,
        replicas_bounds: Bounds::new(0, 64),

        image: "memcached:1.6.38",
        exporter_image: "prom/memcached-exporter:v0.15.3",

        max_memory_mb: 64,
        max_memory_mb_bounds: Bounds::new(16, 65536),
        max_connections: 1024,
        max_connections_bounds: Bounds::new(1, 65536),
        threads: 4,
        threads_bounds: Bounds::new(1, 128),
        max_item_size: "1m",
        max_item_size_pattern: r"^\d+[km]$",
        verbosity_bounds: Bounds::new(0, 2),

        pdb_min_available: 1,

        pre_stop_delay_seconds: 10,
        pre_stop_delay_bounds: Bounds::new(1, 300),
        termination_grace_period_seconds: 30,
        termination_grace_period_bounds: Bounds::new(2, 600),
    };
}

impl Default for Defaults {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Memcached client port.
pub const MEMCACHED_PORT: i32 = 11211;
/// Memcached TLS port.
pub const MEMCACHED_TLS_PORT: i32 = 11212;
/// Prometheus exporter port.
pub const METRICS_PORT: i32 = 9150;

pub const MEMCACHED_PORT_NAME: &str = "memcached";
pub const MEMCACHED_TLS_PORT_NAME: &str = "memcached-tls";
pub const METRICS_PORT_NAME: &str = "metrics";

/// Mount path of the TLS certificate volume.
pub const TLS_MOUNT_PATH: &str = "/etc/memcached/tls";
/// Mount path of the SASL credentials volume.
pub const SASL_MOUNT_PATH: &str = "/etc/memcached/sasl";
/// Key within the SASL secret holding the password file.
pub const SASL_PASSWORD_FILE_KEY: &str = "password-file";
