pub mod handlers;
pub mod server;

use std::sync::Arc;

use pkg_metrics::MetricsRegistry;
use pkg_metrics::process::ProcessCollector;

/// Shared application state injected into all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<MetricsRegistry>,
    pub process: Arc<ProcessCollector>,
}

impl AppState {
    pub fn new() -> Self {
        let metrics = Arc::new(MetricsRegistry::new());
        let process = Arc::new(ProcessCollector::new(&metrics));
        Self { metrics, process }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
