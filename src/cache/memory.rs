use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

use crate::cache::codec::{self, CacheValue};
use crate::cache::strategy::EvictionStrategy;
use crate::infrastructure::error::Result;

/// Stored form of a cached value
#[derive(Debug, Clone)]
pub enum Payload<V> {
    Plain(V),
    /// zlib-compressed encoding of the value
    Compressed(Vec<u8>),
}

impl<V: CacheValue> Payload<V> {
    pub fn is_compressed(&self) -> bool {
        matches!(self, Payload::Compressed(_))
    }

    /// Decompress if needed and hand back the value
    pub fn into_value(self) -> Result<V> {
        match self {
            Payload::Plain(value) => Ok(value),
            Payload::Compressed(bytes) => V::decode(&codec::decompress(&bytes)?),
        }
    }

    /// Bytes in the tier-2 format of a namespace with `compression` on or off
    pub fn to_remote_bytes(&self, compression: bool) -> Result<Vec<u8>> {
        match self {
            Payload::Plain(value) => codec::encode_remote(value, compression),
            // the compressed payload already is zlib(encode(value))
            Payload::Compressed(bytes) if compression => Ok(bytes.clone()),
            Payload::Compressed(bytes) => codec::decompress(bytes),
        }
    }
}

/// Cache entry with metadata
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub payload: Payload<V>,
    pub created_at: Instant,
    pub last_access: Instant,
    pub access_count: u64,
    pub priority: u8,
    pub size_bytes: usize,
    pub ttl: Duration,
    /// Pending write-back to tier-2
    pub dirty: bool,
    /// Logical clock value of the last insert or hit
    pub touch_seq: u64,
}

impl<V> CacheEntry<V> {
    pub fn new(
        key: String,
        payload: Payload<V>,
        priority: u8,
        size_bytes: usize,
        ttl: Duration,
        now: Instant,
    ) -> Self {
        Self {
            key,
            payload,
            created_at: now,
            last_access: now,
            access_count: 0,
            priority,
            size_bytes,
            ttl,
            dirty: false,
            touch_seq: 0,
        }
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    pub fn idle_time(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_access)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.age(now) >= self.ttl
    }

    pub fn remaining_ttl(&self, now: Instant) -> Duration {
        self.ttl.saturating_sub(self.age(now))
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.payload, Payload::Compressed(_))
    }

    fn touch(&mut self, now: Instant, seq: u64) {
        self.access_count += 1;
        self.last_access = now;
        self.touch_seq = seq;
    }
}

/// Mean inter-access interval derived from a key's recent hits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccessPrediction {
    pub avg_interval: Duration,
    pub next_predicted: Instant,
}

/// Bounded window of hit timestamps for one key
#[derive(Debug, Clone, Default)]
pub struct AccessPattern {
    samples: VecDeque<Instant>,
    prediction: Option<AccessPrediction>,
}

impl AccessPattern {
    fn record(&mut self, now: Instant, window: usize, min_samples: usize) {
        self.samples.push_back(now);
        while self.samples.len() > window {
            self.samples.pop_front();
        }

        if self.samples.len() >= min_samples.max(2) {
            if let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) {
                let intervals = (self.samples.len() - 1) as u32;
                let avg_interval = last.saturating_duration_since(*first) / intervals;
                self.prediction = Some(AccessPrediction {
                    avg_interval,
                    next_predicted: now + avg_interval,
                });
            }
        }
    }

    pub fn samples(&self) -> usize {
        self.samples.len()
    }

    pub fn prediction(&self) -> Option<AccessPrediction> {
        self.prediction
    }
}

/// Outcome of a tier-1 lookup
#[derive(Debug)]
pub enum Access<V> {
    Hit {
        payload: Payload<V>,
        age: Duration,
        ttl: Duration,
        priority: u8,
        prediction: Option<AccessPrediction>,
    },
    /// The entry had outlived its TTL and was dropped
    Expired(CacheEntry<V>),
    Missing,
}

/// Process-local tier-1 store.
///
/// Capacity is enforced by the caller: eviction may need to write a dirty
/// victim back to tier-2 first, which this synchronous store cannot do.
#[derive(Debug)]
pub struct MemoryCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
    priority_queues: Vec<VecDeque<String>>,
    patterns: HashMap<String, AccessPattern>,
    eviction: EvictionStrategy,
    clock: u64,
    access_window: usize,
    min_prediction_samples: usize,
}

impl<V> MemoryCache<V> {
    pub fn new(eviction: EvictionStrategy, priority_levels: u8) -> Self {
        let levels = usize::from(priority_levels.max(1));
        Self {
            entries: HashMap::new(),
            priority_queues: vec![VecDeque::new(); levels],
            patterns: HashMap::new(),
            eviction,
            clock: 0,
            access_window: 100,
            min_prediction_samples: 10,
        }
    }

    pub fn with_access_window(mut self, window: usize, min_samples: usize) -> Self {
        self.access_window = window.max(1);
        self.min_prediction_samples = min_samples;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Sum of entry size estimates
    pub fn memory_usage(&self) -> usize {
        self.entries.values().map(|entry| entry.size_bytes).sum()
    }

    /// Number of keys with enough history for a prediction
    pub fn predictions(&self) -> usize {
        self.patterns
            .values()
            .filter(|pattern| pattern.prediction.is_some())
            .count()
    }

    pub fn prediction(&self, key: &str) -> Option<AccessPrediction> {
        self.patterns.get(key).and_then(AccessPattern::prediction)
    }

    /// Insert or replace an entry, returning the replaced one
    pub fn insert(&mut self, mut entry: CacheEntry<V>) -> Option<CacheEntry<V>> {
        let level = usize::from(entry.priority).min(self.priority_queues.len() - 1);
        entry.priority = level as u8;
        entry.touch_seq = self.tick();

        let key = entry.key.clone();
        let replaced = self.entries.insert(key.clone(), entry);
        if let Some(old) = &replaced {
            self.dequeue(&key, old.priority);
        }
        self.priority_queues[level].push_back(key);
        replaced
    }

    /// Record a hit for a key already present (e.g. right after promotion)
    pub fn record_access(&mut self, key: &str, now: Instant) {
        if self.entries.contains_key(key) {
            self.patterns
                .entry(key.to_string())
                .or_default()
                .record(now, self.access_window, self.min_prediction_samples);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.dequeue(key, entry.priority);
        self.patterns.remove(key);
        Some(entry)
    }

    /// Key the configured strategy would evict next
    pub fn select_victim(&self, now: Instant) -> Option<String> {
        match self.eviction {
            EvictionStrategy::Priority => self
                .priority_queues
                .iter()
                .find_map(|queue| queue.front().cloned()),
            strategy => strategy
                .select_victim(self.entries.values(), now)
                .map(|entry| entry.key.clone()),
        }
    }

    /// Drop every entry whose TTL has elapsed
    pub fn remove_expired(&mut self, now: Instant) -> Vec<CacheEntry<V>> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        expired.iter().filter_map(|key| self.remove(key)).collect()
    }

    pub fn dirty_keys(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.dirty)
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn mark_clean(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.dirty = false;
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.patterns.clear();
        for queue in &mut self.priority_queues {
            queue.clear();
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn dequeue(&mut self, key: &str, priority: u8) {
        if let Some(queue) = self.priority_queues.get_mut(usize::from(priority)) {
            if queue.front().map(String::as_str) == Some(key) {
                queue.pop_front();
            } else {
                queue.retain(|queued| queued != key);
            }
        }
    }
}

impl<V: Clone> MemoryCache<V> {
    /// Look a key up, counting the hit or dropping the entry if it expired
    pub fn access(&mut self, key: &str, now: Instant) -> Access<V> {
        let expired = match self.entries.get(key) {
            None => return Access::Missing,
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            return match self.remove(key) {
                Some(entry) => Access::Expired(entry),
                None => Access::Missing,
            };
        }

        let seq = self.tick();
        let (payload, age, ttl, priority) = match self.entries.get_mut(key) {
            Some(entry) => {
                entry.touch(now, seq);
                (entry.payload.clone(), entry.age(now), entry.ttl, entry.priority)
            }
            None => return Access::Missing,
        };

        let pattern = self.patterns.entry(key.to_string()).or_default();
        pattern.record(now, self.access_window, self.min_prediction_samples);

        Access::Hit {
            payload,
            age,
            ttl,
            priority,
            prediction: pattern.prediction(),
        }
    }
}
