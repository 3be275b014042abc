use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cache::strategy::CacheStrategy;

/// Lock-free counters updated on the hot path
#[derive(Debug, Default)]
pub struct CacheCounters {
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    compressions: AtomicU64,
    refreshes: AtomicU64,
    writes: AtomicU64,
    errors: AtomicU64,
}

macro_rules! counter {
    ($record:ident, $field:ident) => {
        pub fn $record(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl CacheCounters {
    counter!(record_l1_hit, l1_hits);
    counter!(record_l2_hit, l2_hits);
    counter!(record_miss, misses);
    counter!(record_compression, compressions);
    counter!(record_refresh, refreshes);
    counter!(record_write, writes);
    counter!(record_error, errors);

    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    fn load(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of one cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub name: String,
    pub strategy: CacheStrategy,
    pub ttl_seconds: u64,
    pub max_size: usize,
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
    pub evictions: u64,
    pub compressions: u64,
    pub refreshes: u64,
    pub writes: u64,
    pub errors: u64,
    pub l1_size: usize,
    pub l2_size: usize,
    pub l1_memory_bytes: usize,
    pub predictions: usize,
}

/// Tier sizes sampled under the state lock
#[derive(Debug, Clone, Copy, Default)]
pub struct TierSizes {
    pub l1_size: usize,
    pub l2_size: usize,
    pub l1_memory_bytes: usize,
    pub predictions: usize,
}

impl CacheStats {
    pub fn collect(
        name: &str,
        strategy: CacheStrategy,
        ttl_seconds: u64,
        max_size: usize,
        counters: &CacheCounters,
        sizes: TierSizes,
    ) -> Self {
        let l1_hits = CacheCounters::load(&counters.l1_hits);
        let l2_hits = CacheCounters::load(&counters.l2_hits);
        let misses = CacheCounters::load(&counters.misses);
        let hits = l1_hits + l2_hits;

        Self {
            name: name.to_string(),
            strategy,
            ttl_seconds,
            max_size,
            l1_hits,
            l2_hits,
            hits,
            misses,
            hit_ratio: hits as f64 / (hits + misses).max(1) as f64,
            evictions: CacheCounters::load(&counters.evictions),
            compressions: CacheCounters::load(&counters.compressions),
            refreshes: CacheCounters::load(&counters.refreshes),
            writes: CacheCounters::load(&counters.writes),
            errors: CacheCounters::load(&counters.errors),
            l1_size: sizes.l1_size,
            l2_size: sizes.l2_size,
            l1_memory_bytes: sizes.l1_memory_bytes,
            predictions: sizes.predictions,
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }

    pub fn l1_hit_ratio(&self) -> f64 {
        self.ratio(self.l1_hits)
    }

    pub fn l2_hit_ratio(&self) -> f64 {
        self.ratio(self.l2_hits)
    }

    pub fn l1_memory_mb(&self) -> f64 {
        self.l1_memory_bytes as f64 / (1024.0 * 1024.0)
    }

    fn ratio(&self, part: u64) -> f64 {
        part as f64 / self.total_requests().max(1) as f64
    }
}

/// Summary written to tier-2 by the maintenance loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub name: String,
    pub hit_ratio: f64,
    pub total_requests: u64,
    pub l1_size: usize,
    pub l2_size: usize,
    pub published_at: DateTime<Utc>,
}

impl From<&CacheStats> for StatsReport {
    fn from(stats: &CacheStats) -> Self {
        Self {
            name: stats.name.clone(),
            hit_ratio: stats.hit_ratio,
            total_requests: stats.total_requests(),
            l1_size: stats.l1_size,
            l2_size: stats.l2_size,
            published_at: Utc::now(),
        }
    }
}
