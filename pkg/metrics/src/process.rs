//! Process metrics sampled from the OS on every scrape.

use std::sync::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::debug;

use crate::{MetricKind, MetricsRegistry};

pub const RESIDENT_MEMORY: &str = "process_resident_memory_bytes";
pub const VIRTUAL_MEMORY: &str = "process_virtual_memory_bytes";
pub const CPU_SECONDS: &str = "process_cpu_seconds_total";
pub const START_TIME: &str = "process_start_time_seconds";
pub const UPTIME: &str = "process_uptime_seconds";

/// Reads this process's resource usage into a [`MetricsRegistry`].
pub struct ProcessCollector {
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl ProcessCollector {
    /// Create a collector and register its metrics in `registry`.
    pub fn new(registry: &MetricsRegistry) -> Self {
        registry.register(
            RESIDENT_MEMORY,
            MetricKind::Gauge,
            "Resident memory size in bytes.",
        );
        registry.register(
            VIRTUAL_MEMORY,
            MetricKind::Gauge,
            "Virtual memory size in bytes.",
        );
        registry.register(
            CPU_SECONDS,
            MetricKind::Counter,
            "Total user and system CPU time spent in seconds.",
        );
        registry.register(
            START_TIME,
            MetricKind::Gauge,
            "Start time of the process since unix epoch in seconds.",
        );
        registry.register(
            UPTIME,
            MetricKind::Gauge,
            "Seconds since the process started.",
        );

        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                debug!("Process metrics unavailable: {}", e);
                None
            }
        };
        Self {
            pid,
            system: Mutex::new(System::new()),
        }
    }

    /// Refresh the process stats and store them in `registry`.
    /// Leaves the previous values in place if the process can't be read.
    pub fn collect(&self, registry: &MetricsRegistry) {
        let Some(pid) = self.pid else {
            return;
        };
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::everything(),
        );
        let Some(process) = system.process(pid) else {
            debug!("Process {} not found while collecting metrics", pid);
            return;
        };

        registry.set(RESIDENT_MEMORY, process.memory() as f64);
        registry.set(VIRTUAL_MEMORY, process.virtual_memory() as f64);
        registry.set(CPU_SECONDS, process.accumulated_cpu_time() as f64 / 1000.0);
        registry.set(START_TIME, process.start_time() as f64);
        registry.set(UPTIME, process.run_time() as f64);
    }
}
