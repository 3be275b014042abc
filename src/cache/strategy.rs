use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::cache::memory::CacheEntry;
use crate::infrastructure::error::{CacheError, Result};

pub const PROFILE_CACHE: &str = "profiles";
pub const GPT_CACHE: &str = "gpt_responses";
pub const LOG_CACHE: &str = "logs";
pub const SESSION_CACHE: &str = "sessions";

/// Cache strategies a namespace can be configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheStrategy {
    /// Least Recently Used
    #[serde(rename = "lru")]
    LRU,
    /// Least Frequently Used
    #[serde(rename = "lfu")]
    LFU,
    /// Time-based expiration, priority eviction when full
    #[serde(rename = "ttl")]
    TTL,
    /// Frequency weighted by age
    #[serde(rename = "adaptive")]
    Adaptive,
    /// Synchronous tier-2 writes
    #[serde(rename = "write_through")]
    WriteThrough,
    /// Deferred tier-2 writes tracked by a dirty flag
    #[serde(rename = "write_back")]
    WriteBack,
}

impl CacheStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStrategy::LRU => "lru",
            CacheStrategy::LFU => "lfu",
            CacheStrategy::TTL => "ttl",
            CacheStrategy::Adaptive => "adaptive",
            CacheStrategy::WriteThrough => "write_through",
            CacheStrategy::WriteBack => "write_back",
        }
    }

    /// Victim selection rule used when tier-1 is full
    pub fn eviction(&self) -> EvictionStrategy {
        match self {
            CacheStrategy::LRU => EvictionStrategy::LRU,
            CacheStrategy::LFU => EvictionStrategy::LFU,
            CacheStrategy::Adaptive => EvictionStrategy::Adaptive,
            CacheStrategy::TTL | CacheStrategy::WriteThrough | CacheStrategy::WriteBack => {
                EvictionStrategy::Priority
            }
        }
    }
}

impl std::str::FromStr for CacheStrategy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(CacheStrategy::LRU),
            "lfu" => Ok(CacheStrategy::LFU),
            "ttl" => Ok(CacheStrategy::TTL),
            "adaptive" => Ok(CacheStrategy::Adaptive),
            "write_through" | "write-through" => Ok(CacheStrategy::WriteThrough),
            "write_back" | "write-back" => Ok(CacheStrategy::WriteBack),
            other => Err(CacheError::config(format!("unknown cache strategy: {}", other))),
        }
    }
}

/// Cache eviction strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionStrategy {
    /// Oldest last access
    LRU,
    /// Fewest accesses
    LFU,
    /// Lowest `access_count / max(age_secs, 1)`
    Adaptive,
    /// Lowest priority level first, FIFO within a level
    Priority,
}

impl EvictionStrategy {
    /// Pick the entry to evict among `entries`.
    ///
    /// Ties are broken by the logical access clock so the least recently
    /// touched entry goes first. `Priority` is answered by the tier-1 store's
    /// per-level queues and always yields `None` here.
    pub fn select_victim<'a, V: 'a>(
        &self,
        entries: impl Iterator<Item = &'a CacheEntry<V>>,
        now: Instant,
    ) -> Option<&'a CacheEntry<V>> {
        match self {
            EvictionStrategy::LRU => entries.min_by_key(|entry| entry.touch_seq),
            EvictionStrategy::LFU => entries.min_by_key(|entry| (entry.access_count, entry.touch_seq)),
            EvictionStrategy::Adaptive => entries.min_by(|a, b| {
                adaptive_score(a, now)
                    .total_cmp(&adaptive_score(b, now))
                    .then(a.touch_seq.cmp(&b.touch_seq))
            }),
            EvictionStrategy::Priority => None,
        }
    }
}

/// Penalizes old-but-rarely-used and new-but-unused entries alike
pub fn adaptive_score<V>(entry: &CacheEntry<V>, now: Instant) -> f64 {
    let age = entry.age(now).as_secs_f64();
    entry.access_count as f64 / age.max(1.0)
}

/// Immutable per-namespace cache policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachePolicy {
    pub strategy: CacheStrategy,
    pub ttl_seconds: u64,
    pub max_size: usize,
    pub compression: bool,
    /// Whether tier-2 is used at all
    pub persistence: bool,
    pub auto_refresh: bool,
    /// Fraction of the TTL after which a hit schedules a refresh
    pub refresh_threshold: f64,
    pub priority_levels: u8,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            strategy: CacheStrategy::Adaptive,
            ttl_seconds: 300,
            max_size: 1000,
            compression: true,
            persistence: true,
            auto_refresh: false,
            refresh_threshold: 0.8,
            priority_levels: 3,
        }
    }
}

impl CachePolicy {
    pub fn new(strategy: CacheStrategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    pub fn with_ttl_seconds(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_persistence(mut self, persistence: bool) -> Self {
        self.persistence = persistence;
        self
    }

    pub fn with_auto_refresh(mut self, auto_refresh: bool, refresh_threshold: f64) -> Self {
        self.auto_refresh = auto_refresh;
        self.refresh_threshold = refresh_threshold;
        self
    }

    pub fn with_priority_levels(mut self, priority_levels: u8) -> Self {
        self.priority_levels = priority_levels;
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Highest priority level an entry can carry
    pub fn max_priority(&self) -> u8 {
        self.priority_levels.saturating_sub(1)
    }

    /// Per-call TTLs may shorten an entry's lifetime, never extend it past the policy TTL.
    /// A zero TTL means "no override", same as `None`.
    pub fn effective_ttl(&self, requested: Option<Duration>) -> Duration {
        match requested {
            Some(ttl) if !ttl.is_zero() => ttl.min(self.ttl()),
            _ => self.ttl(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        // tier-2 stores read a zero TTL as "never expires"
        if self.ttl_seconds == 0 {
            return Err(CacheError::config("ttl_seconds must be at least 1"));
        }
        if self.priority_levels == 0 {
            return Err(CacheError::config("priority_levels must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.refresh_threshold) {
            return Err(CacheError::config(format!(
                "refresh_threshold must be within 0..=1, got {}",
                self.refresh_threshold
            )));
        }
        Ok(())
    }

    /// Persona profiles: adaptive, refreshed while hot
    pub fn profiles() -> Self {
        Self::new(CacheStrategy::Adaptive)
            .with_ttl_seconds(600)
            .with_max_size(500)
            .with_auto_refresh(true, 0.8)
    }

    /// GPT replies: large LRU, no refresh
    pub fn gpt_responses() -> Self {
        Self::new(CacheStrategy::LRU)
            .with_ttl_seconds(1800)
            .with_max_size(2000)
    }

    /// Short-lived log lines, tier-1 only
    pub fn logs() -> Self {
        Self::new(CacheStrategy::TTL)
            .with_ttl_seconds(300)
            .with_max_size(1000)
            .with_compression(false)
            .with_persistence(false)
    }

    /// Chat sessions: write-back so bursts of updates coalesce
    pub fn sessions() -> Self {
        Self::new(CacheStrategy::WriteBack)
            .with_ttl_seconds(3600)
            .with_max_size(200)
            .with_auto_refresh(true, 0.8)
    }

    /// Built-in policy for one of the predefined cache names
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            PROFILE_CACHE => Some(Self::profiles()),
            GPT_CACHE => Some(Self::gpt_responses()),
            LOG_CACHE => Some(Self::logs()),
            SESSION_CACHE => Some(Self::sessions()),
            _ => None,
        }
    }
}

/// Glob match supporting a single leading or trailing `*`
pub fn matches_pattern(key: &str, pattern: &str) -> bool {
    if pattern == "*" {
        true
    } else if let Some(prefix) = pattern.strip_suffix('*') {
        key.starts_with(prefix)
    } else if let Some(suffix) = pattern.strip_prefix('*') {
        key.ends_with(suffix)
    } else {
        key == pattern
    }
}
