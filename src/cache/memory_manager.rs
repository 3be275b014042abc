use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Memory pressure levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemoryPressure {
    Low,
    Medium,
    High,
    Critical,
}

impl MemoryPressure {
    pub fn from_usage_percent(usage_percent: f64) -> Self {
        if usage_percent >= 90.0 {
            MemoryPressure::Critical
        } else if usage_percent >= 80.0 {
            MemoryPressure::High
        } else if usage_percent >= 60.0 {
            MemoryPressure::Medium
        } else {
            MemoryPressure::Low
        }
    }
}

/// Source of host memory usage readings
pub trait MemoryMonitor: Send + Sync + Debug {
    /// Used memory as a percentage of total, `None` when unavailable
    fn usage_percent(&self) -> Option<f64>;

    fn pressure(&self) -> Option<MemoryPressure> {
        self.usage_percent().map(MemoryPressure::from_usage_percent)
    }
}

/// Reads host memory through the OS
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMemoryMonitor;

impl MemoryMonitor for SystemMemoryMonitor {
    fn usage_percent(&self) -> Option<f64> {
        match sys_info::mem_info() {
            Ok(info) if info.total > 0 => {
                let used = info.total.saturating_sub(info.avail);
                Some(used as f64 / info.total as f64 * 100.0)
            }
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "host memory information unavailable");
                None
            }
        }
    }
}

/// Fixed, adjustable reading; lets hosts and tests drive pressure handling
#[derive(Debug, Default)]
pub struct StaticMemoryMonitor {
    percent_bits: AtomicU64,
}

impl StaticMemoryMonitor {
    pub fn new(usage_percent: f64) -> Self {
        Self {
            percent_bits: AtomicU64::new(usage_percent.to_bits()),
        }
    }

    pub fn set(&self, usage_percent: f64) {
        self.percent_bits
            .store(usage_percent.to_bits(), Ordering::Relaxed);
    }
}

impl MemoryMonitor for StaticMemoryMonitor {
    fn usage_percent(&self) -> Option<f64> {
        Some(f64::from_bits(self.percent_bits.load(Ordering::Relaxed)))
    }
}
