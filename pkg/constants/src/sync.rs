//! Endpoints sync loop constants.

/// Interval between two sync cycles, in seconds.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 120;

/// How long the metrics listener may drain in-flight requests on shutdown, in seconds.
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

/// Roles available in static mode without any config file.
pub const DEFAULT_ROLES: [&str; 2] = ["scheduler", "controller-manager"];

/// Default `tracing` filter directive.
pub const DEFAULT_LOG_LEVEL: &str = "info";
