pub mod process;

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// A lightweight, thread-safe metrics registry that renders in Prometheus text exposition format.
///
/// Values are sampled rather than accumulated here: collectors read a source
/// (the OS, a runtime) and `set` the current reading before each render.
pub struct MetricsRegistry {
    metrics: RwLock<BTreeMap<String, Metric>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Monotonically increasing value.
    Counter,
    /// Value that can go up or down.
    Gauge,
}

impl MetricKind {
    fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

struct Metric {
    kind: MetricKind,
    help: String,
    /// `f64` bits.
    value: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            metrics: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a metric. If it already exists, this is a no-op.
    pub fn register(&self, name: &str, kind: MetricKind, help: &str) {
        let mut metrics = self.metrics.write().unwrap_or_else(|e| e.into_inner());
        metrics.entry(name.to_string()).or_insert_with(|| Metric {
            kind,
            help: help.to_string(),
            value: AtomicU64::new(0f64.to_bits()),
        });
    }

    /// Set a metric to the latest sampled value. Unregistered names are ignored.
    pub fn set(&self, name: &str, val: f64) {
        let metrics = self.metrics.read().unwrap_or_else(|e| e.into_inner());
        if let Some(m) = metrics.get(name) {
            m.value.store(val.to_bits(), Ordering::Relaxed);
        }
    }

    /// Current value of a metric, if registered.
    pub fn get(&self, name: &str) -> Option<f64> {
        let metrics = self.metrics.read().unwrap_or_else(|e| e.into_inner());
        metrics
            .get(name)
            .map(|m| f64::from_bits(m.value.load(Ordering::Relaxed)))
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut output = String::new();

        let metrics = self.metrics.read().unwrap_or_else(|e| e.into_inner());
        for (name, metric) in metrics.iter() {
            output.push_str(&format!("# HELP {} {}\n", name, metric.help));
            output.push_str(&format!("# TYPE {} {}\n", name, metric.kind.as_str()));
            output.push_str(&format!(
                "{} {}\n",
                name,
                f64::from_bits(metric.value.load(Ordering::Relaxed))
            ));
        }

        output
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
