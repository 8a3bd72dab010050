//! Network-related constants.

/// Default listen address for the `/metrics` endpoint.
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

/// Path the metrics handler is mounted on.
pub const METRICS_PATH: &str = "/metrics";

/// Content type of the Prometheus text exposition format.
pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
