use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::cache::codec::{self, CacheValue};
use crate::cache::memory::{Access, AccessPrediction, CacheEntry, MemoryCache, Payload};
use crate::cache::memory_manager::{MemoryMonitor, MemoryPressure, SystemMemoryMonitor};
use crate::cache::stats::{CacheCounters, CacheStats, StatsReport, TierSizes};
use crate::cache::storage::RemoteStore;
use crate::cache::strategy::{CachePolicy, CacheStrategy};
use crate::infrastructure::config::ManagerSettings;
use crate::infrastructure::error::{CacheError, Result};

/// Priority given to `set` calls that do not ask for one
pub const DEFAULT_PRIORITY: u8 = 1;

/// Entries promoted from tier-2 were worth fetching; keep them above default
const PROMOTION_PRIORITY: u8 = 2;

/// Origin hook invoked when a hot entry nears the end of its TTL
#[async_trait]
pub trait RefreshHandler<V>: Send + Sync {
    /// Fetch a fresh value for `key`; `Ok(None)` keeps the cached copy.
    async fn refresh(&self, key: &str) -> Result<Option<V>>;
}

struct CacheState<V> {
    l1: MemoryCache<V>,
    /// Keys known to exist in tier-2 for this namespace
    l2_keys: HashSet<String>,
}

struct CacheCore<V> {
    name: String,
    policy: CachePolicy,
    settings: ManagerSettings,
    state: Mutex<CacheState<V>>,
    remote: Option<Arc<dyn RemoteStore>>,
    monitor: Arc<dyn MemoryMonitor>,
    refresh_handler: Option<Arc<dyn RefreshHandler<V>>>,
    refreshing: Mutex<HashSet<String>>,
    refresh_tasks: Mutex<JoinSet<()>>,
    running: AtomicBool,
    counters: CacheCounters,
}

#[derive(Default)]
struct BackgroundTasks {
    shutdown: Option<watch::Sender<bool>>,
    handles: Vec<JoinHandle<()>>,
}

/// Two-tier cache for one namespace.
///
/// Tier-1 is a bounded in-process store with policy-driven eviction; tier-2
/// is an optional shared [`RemoteStore`] used when the policy enables
/// persistence. Tier-2 failures never reach callers: they are logged and
/// counted, and the operation continues on tier-1 alone.
pub struct SmartCacheManager<V: CacheValue> {
    core: Arc<CacheCore<V>>,
    tasks: Mutex<BackgroundTasks>,
}

impl<V: CacheValue> std::fmt::Debug for SmartCacheManager<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartCacheManager")
            .field("name", &self.core.name)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SmartCacheManager`]
pub struct CacheManagerBuilder<V: CacheValue> {
    name: String,
    policy: CachePolicy,
    settings: ManagerSettings,
    remote: Option<Arc<dyn RemoteStore>>,
    monitor: Option<Arc<dyn MemoryMonitor>>,
    refresh_handler: Option<Arc<dyn RefreshHandler<V>>>,
}

impl<V: CacheValue> CacheManagerBuilder<V> {
    pub fn settings(mut self, settings: ManagerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn memory_monitor(mut self, monitor: Arc<dyn MemoryMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn refresh_handler(mut self, handler: Arc<dyn RefreshHandler<V>>) -> Self {
        self.refresh_handler = Some(handler);
        self
    }

    pub fn build(self) -> Result<SmartCacheManager<V>> {
        // tier-2 keys are `<prefix>:<name>:<key>`; namespaces must not nest
        if self.name.is_empty() || self.name.contains([':', '*']) {
            return Err(CacheError::config(format!(
                "cache name `{}` must be non-empty without `:` or `*`",
                self.name
            )));
        }
        self.policy.validate()?;
        self.settings.validate()?;

        let l1 = MemoryCache::new(self.policy.strategy.eviction(), self.policy.priority_levels)
            .with_access_window(self.settings.access_window, self.settings.min_prediction_samples);

        let core = CacheCore {
            name: self.name,
            policy: self.policy,
            settings: self.settings,
            state: Mutex::new(CacheState {
                l1,
                l2_keys: HashSet::new(),
            }),
            remote: self.remote,
            monitor: self.monitor.unwrap_or_else(|| Arc::new(SystemMemoryMonitor)),
            refresh_handler: self.refresh_handler,
            refreshing: Mutex::new(HashSet::new()),
            refresh_tasks: Mutex::new(JoinSet::new()),
            running: AtomicBool::new(false),
            counters: CacheCounters::default(),
        };

        Ok(SmartCacheManager {
            core: Arc::new(core),
            tasks: Mutex::new(BackgroundTasks::default()),
        })
    }
}

impl<V: CacheValue> SmartCacheManager<V> {
    pub fn builder(name: impl Into<String>, policy: CachePolicy) -> CacheManagerBuilder<V> {
        CacheManagerBuilder {
            name: name.into(),
            policy,
            settings: ManagerSettings::default(),
            remote: None,
            monitor: None,
            refresh_handler: None,
        }
    }

    pub fn new(
        name: impl Into<String>,
        policy: CachePolicy,
        remote: Option<Arc<dyn RemoteStore>>,
    ) -> Result<Self> {
        let mut builder = Self::builder(name, policy);
        if let Some(remote) = remote {
            builder = builder.remote(remote);
        }
        builder.build()
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.core.policy
    }

    pub fn is_running(&self) -> bool {
        self.core.running.load(Ordering::Acquire)
    }

    /// Launch the maintenance loop, plus the write-back loop for
    /// write-back namespaces. Calling it twice is a no-op.
    pub async fn start(&self) {
        let mut tasks = self.tasks.lock().await;
        if tasks.shutdown.is_some() {
            return;
        }

        self.core.discover_remote_keys().await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tasks.handles.push(tokio::spawn(maintenance_loop(
            Arc::clone(&self.core),
            shutdown_rx.clone(),
        )));
        if self.core.policy.strategy == CacheStrategy::WriteBack {
            tasks.handles.push(tokio::spawn(write_back_loop(
                Arc::clone(&self.core),
                shutdown_rx,
            )));
        }
        tasks.shutdown = Some(shutdown_tx);
        self.core.running.store(true, Ordering::Release);

        info!(
            cache = %self.core.name,
            strategy = self.core.policy.strategy.as_str(),
            "smart cache manager started"
        );
    }

    /// Stop every background task, wait for them, then flush dirty entries
    pub async fn stop(&self) {
        self.core.running.store(false, Ordering::Release);

        let mut tasks = self.tasks.lock().await;
        if let Some(shutdown) = tasks.shutdown.take() {
            let _ = shutdown.send(true);
        }
        for handle in tasks.handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(cache = %self.core.name, error = %e, "background task ended abnormally");
            }
        }
        drop(tasks);

        // taken out of the lock so a racing lookup never waits on a refresh it scheduled
        let mut pending = std::mem::take(&mut *self.core.refresh_tasks.lock().await);
        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                warn!(cache = %self.core.name, error = %e, "refresh task ended abnormally");
            }
        }

        let flushed = self.core.flush_dirty_entries().await;
        info!(cache = %self.core.name, flushed, "smart cache manager stopped");
    }

    /// Tier-1, then tier-2 with promotion; `None` on miss
    pub async fn get(&self, key: &str) -> Option<V> {
        self.core.get(key).await
    }

    pub async fn get_or(&self, key: &str, default: V) -> V {
        self.get(key).await.unwrap_or(default)
    }

    pub async fn set(&self, key: &str, value: V) {
        self.core.set(key, value, DEFAULT_PRIORITY, None).await;
        self.core.counters.record_write();
    }

    /// Store with an explicit priority and TTL; the TTL is clamped to the policy TTL
    pub async fn set_with(&self, key: &str, value: V, priority: u8, ttl: Option<Duration>) {
        self.core.set(key, value, priority, ttl).await;
        self.core.counters.record_write();
    }

    /// Remove from both tiers; true if either tier held the key
    pub async fn delete(&self, key: &str) -> bool {
        self.core.delete(key).await
    }

    /// Empty tier-1 and this namespace in tier-2
    pub async fn clear(&self) {
        self.core.clear().await;
    }

    /// Write dirty entries to tier-2 now, returning how many were written
    pub async fn flush(&self) -> usize {
        self.core.flush_dirty_entries().await
    }

    /// One maintenance pass: expiry, memory pressure and stats publication
    pub async fn run_maintenance(&self) {
        self.core.run_maintenance().await;
    }

    pub async fn prediction(&self, key: &str) -> Option<AccessPrediction> {
        self.core.state.lock().await.l1.prediction(key)
    }

    pub async fn get_stats(&self) -> CacheStats {
        self.core.stats().await
    }
}

impl<V: CacheValue> CacheCore<V> {
    fn remote_key(&self, key: &str) -> String {
        format!("{}:{}:{}", self.settings.key_prefix, self.name, key)
    }

    fn remote_prefix(&self) -> String {
        format!("{}:{}:", self.settings.key_prefix, self.name)
    }

    fn tier2(&self) -> Option<&Arc<dyn RemoteStore>> {
        if self.policy.persistence {
            self.remote.as_ref()
        } else {
            None
        }
    }

    fn record_error(&self, operation: &str, err: &CacheError) {
        self.counters.record_error();
        warn!(
            cache = %self.name,
            operation,
            category = %err.category(),
            error = %err,
            "cache operation degraded"
        );
    }

    async fn get(self: &Arc<Self>, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut state = self.state.lock().await;

        match state.l1.access(key, now) {
            Access::Hit {
                payload,
                age,
                ttl,
                priority,
                prediction,
            } => {
                self.counters.record_l1_hit();
                if self.should_refresh(age, ttl, prediction, now) {
                    self.schedule_refresh(key, priority).await;
                }
                drop(state);
                return self.materialize(payload);
            }
            Access::Expired(entry) => {
                // the tier-2 copy shares the TTL, so it is stale too
                state.l2_keys.remove(key);
                self.counters.record_evictions(1);
                self.counters.record_miss();
                if entry.dirty {
                    warn!(cache = %self.name, key = %key, "dirty entry expired before write-back");
                }
                return None;
            }
            Access::Missing => {}
        }

        match self.read_through(&mut state, key, now).await {
            Some(value) => {
                self.counters.record_l2_hit();
                Some(value)
            }
            None => {
                self.counters.record_miss();
                None
            }
        }
    }

    fn materialize(&self, payload: Payload<V>) -> Option<V> {
        match payload.into_value() {
            Ok(value) => Some(value),
            Err(e) => {
                self.record_error("decode", &e);
                None
            }
        }
    }

    /// Fetch from tier-2 and promote into tier-1
    async fn read_through(&self, state: &mut CacheState<V>, key: &str, now: Instant) -> Option<V> {
        let remote = self.tier2()?;
        if !state.l2_keys.contains(key) {
            return None;
        }

        let bytes = match remote.get(&self.remote_key(key)).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                state.l2_keys.remove(key);
                return None;
            }
            Err(e) => {
                self.record_error("get", &e);
                return None;
            }
        };

        let value = match codec::decode_remote::<V>(&bytes, self.policy.compression) {
            Ok(value) => value,
            Err(e) => {
                self.record_error("decode", &e);
                return None;
            }
        };

        let encoded = (!self.policy.compression).then_some(bytes.as_slice());
        let entry = self.build_entry(key, value.clone(), PROMOTION_PRIORITY, self.policy.ttl(), encoded, now);
        self.insert_l1(state, entry, now).await;
        state.l1.record_access(key, now);
        debug!(cache = %self.name, key = %key, "promoted from tier-2");

        Some(value)
    }

    async fn set(&self, key: &str, value: V, priority: u8, ttl: Option<Duration>) {
        let now = Instant::now();
        let ttl = self.policy.effective_ttl(ttl);
        let compression = self.policy.compression;

        let encoded = match value.encode() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                self.record_error("encode", &e);
                None
            }
        };

        let remote = self.tier2();
        // with no tier-1 capacity a deferred write would be lost
        let write_back = remote.is_some()
            && encoded.is_some()
            && self.policy.strategy == CacheStrategy::WriteBack
            && self.policy.max_size > 0;

        let mut entry = self.build_entry(key, value, priority, ttl, encoded.as_deref(), now);
        entry.dirty = write_back;

        let remote_bytes = match (&encoded, remote) {
            (Some(encoded), Some(_)) if !write_back => match &entry.payload {
                Payload::Compressed(bytes) if compression => Some(bytes.clone()),
                _ => match codec::pack_remote(encoded, compression) {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        self.record_error("compress", &e);
                        None
                    }
                },
            },
            _ => None,
        };

        let mut state = self.state.lock().await;
        self.insert_l1(&mut state, entry, now).await;

        if let (Some(remote), Some(bytes)) = (remote, remote_bytes) {
            match remote.set(&self.remote_key(key), bytes, Some(ttl)).await {
                Ok(()) => {
                    state.l2_keys.insert(key.to_string());
                }
                Err(e) => self.record_error("set", &e),
            }
        }
    }

    fn build_entry(
        &self,
        key: &str,
        value: V,
        priority: u8,
        ttl: Duration,
        encoded: Option<&[u8]>,
        now: Instant,
    ) -> CacheEntry<V> {
        let (payload, size_bytes) = self.build_payload(value, encoded);
        CacheEntry::new(
            key.to_string(),
            payload,
            priority.min(self.policy.max_priority()),
            size_bytes,
            ttl,
            now,
        )
    }

    /// Compress when the policy allows and it pays off
    fn build_payload(&self, value: V, encoded: Option<&[u8]>) -> (Payload<V>, usize) {
        let fallback_size = std::mem::size_of::<V>();
        if !self.policy.compression {
            let size = encoded.map_or(fallback_size, <[u8]>::len);
            return (Payload::Plain(value), size);
        }

        let owned;
        let encoded = match encoded {
            Some(bytes) => bytes,
            None => match value.encode() {
                Ok(bytes) => {
                    owned = bytes;
                    owned.as_slice()
                }
                Err(_) => return (Payload::Plain(value), fallback_size),
            },
        };

        match codec::compress_if_worthwhile(
            encoded,
            self.settings.compression_threshold_bytes,
            self.settings.compression_max_ratio,
        ) {
            Ok(Some(compressed)) => {
                self.counters.record_compression();
                let size = compressed.len();
                (Payload::Compressed(compressed), size)
            }
            Ok(None) => (Payload::Plain(value), encoded.len()),
            Err(e) => {
                warn!(cache = %self.name, error = %e, "compression failed, storing uncompressed");
                (Payload::Plain(value), encoded.len())
            }
        }
    }

    async fn insert_l1(&self, state: &mut CacheState<V>, entry: CacheEntry<V>, now: Instant) {
        if self.policy.max_size == 0 {
            return;
        }
        if !state.l1.contains(&entry.key) {
            while state.l1.len() >= self.policy.max_size {
                if !self.evict_one(state, now).await {
                    break;
                }
            }
        }
        state.l1.insert(entry);
    }

    /// Evict one tier-1 entry, writing it back first if it is dirty
    async fn evict_one(&self, state: &mut CacheState<V>, now: Instant) -> bool {
        let Some(victim) = state.l1.select_victim(now) else {
            return false;
        };
        let Some(entry) = state.l1.remove(&victim) else {
            return false;
        };

        if entry.dirty && !entry.is_expired(now) {
            if self.write_back_entry(&entry, now).await {
                state.l2_keys.insert(victim.clone());
            } else {
                error!(cache = %self.name, key = %victim, "evicted dirty entry could not be written back");
            }
        }

        self.counters.record_evictions(1);
        debug!(cache = %self.name, key = %victim, "evicted from tier-1");
        true
    }

    async fn write_back_entry(&self, entry: &CacheEntry<V>, now: Instant) -> bool {
        let Some(remote) = self.tier2() else {
            return false;
        };

        let bytes = match entry.payload.to_remote_bytes(self.policy.compression) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.record_error("encode", &e);
                return false;
            }
        };

        match remote
            .set(&self.remote_key(&entry.key), bytes, Some(entry.remaining_ttl(now)))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                self.record_error("write_back", &e);
                false
            }
        }
    }

    async fn delete(&self, key: &str) -> bool {
        let mut state = self.state.lock().await;
        let mut deleted = state.l1.remove(key).is_some();
        let known_remote = state.l2_keys.remove(key);

        if let Some(remote) = self.tier2() {
            match remote.delete(&self.remote_key(key)).await {
                Ok(()) => deleted |= known_remote,
                Err(e) => self.record_error("delete", &e),
            }
        }
        deleted
    }

    async fn clear(&self) {
        let mut state = self.state.lock().await;
        let cleared = state.l1.len();
        state.l1.clear();
        let known: Vec<String> = state.l2_keys.drain().collect();

        if let Some(remote) = self.tier2() {
            let mut keys: HashSet<String> = known.iter().map(|key| self.remote_key(key)).collect();
            match remote.keys(&format!("{}*", self.remote_prefix())).await {
                Ok(found) => keys.extend(found),
                Err(e) => self.record_error("keys", &e),
            }
            for key in keys {
                if let Err(e) = remote.delete(&key).await {
                    self.record_error("delete", &e);
                }
            }
        }

        info!(cache = %self.name, entries = cleared, "cache cleared");
    }

    async fn discover_remote_keys(&self) {
        let Some(remote) = self.tier2() else {
            return;
        };

        let prefix = self.remote_prefix();
        match remote.keys(&format!("{}*", prefix)).await {
            Ok(keys) => {
                let mut state = self.state.lock().await;
                let before = state.l2_keys.len();
                state.l2_keys.extend(
                    keys.iter()
                        .filter_map(|key| key.strip_prefix(prefix.as_str()))
                        .map(str::to_string),
                );
                debug!(
                    cache = %self.name,
                    discovered = state.l2_keys.len() - before,
                    "loaded tier-2 key index"
                );
            }
            Err(e) => self.record_error("keys", &e),
        }
    }

    async fn flush_dirty_entries(&self) -> usize {
        if self.policy.strategy != CacheStrategy::WriteBack || self.tier2().is_none() {
            return 0;
        }

        let now = Instant::now();
        let mut state = self.state.lock().await;
        let mut flushed = 0;

        for key in state.l1.dirty_keys() {
            let written = match state.l1.get(&key) {
                // left for maintenance to drop
                Some(entry) if entry.is_expired(now) => continue,
                Some(entry) => self.write_back_entry(entry, now).await,
                None => continue,
            };

            if written {
                state.l1.mark_clean(&key);
                state.l2_keys.insert(key);
                flushed += 1;
            }
        }

        if flushed > 0 {
            debug!(cache = %self.name, flushed, "flushed dirty entries");
        }
        flushed
    }

    async fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let expired = state.l1.remove_expired(now);
        for entry in &expired {
            state.l2_keys.remove(&entry.key);
            if entry.dirty {
                warn!(cache = %self.name, key = %entry.key, "dirty entry expired before write-back");
            }
        }
        self.counters.record_evictions(expired.len() as u64);
        expired.len()
    }

    async fn relieve_memory_pressure(&self) -> usize {
        let Some(usage) = self.monitor.usage_percent() else {
            return 0;
        };
        if usage <= self.settings.memory_pressure_threshold_percent {
            return 0;
        }

        let now = Instant::now();
        let mut state = self.state.lock().await;
        let target = (state.l1.len() as f64 * self.settings.memory_pressure_target_ratio) as usize;
        let mut evicted = 0;
        while state.l1.len() > target {
            if !self.evict_one(&mut state, now).await {
                break;
            }
            evicted += 1;
        }

        warn!(
            cache = %self.name,
            usage_percent = usage,
            pressure = ?MemoryPressure::from_usage_percent(usage),
            evicted,
            "memory pressure cleanup"
        );
        evicted
    }

    async fn publish_stats(&self) {
        if !self.settings.publish_stats {
            return;
        }
        let Some(remote) = self.tier2() else {
            return;
        };

        let stats = self.stats().await;
        if stats.total_requests() == 0 {
            return;
        }

        let report = StatsReport::from(&stats);
        let bytes = match serde_json::to_vec(&report) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.record_error("publish_stats", &CacheError::from(e));
                return;
            }
        };

        let key = format!("{}:{}", self.settings.stats_key_prefix, self.name);
        if let Err(e) = remote.set(&key, bytes, None).await {
            self.record_error("publish_stats", &e);
        }
    }

    async fn run_maintenance(&self) {
        let expired = self.cleanup_expired().await;
        let relieved = self.relieve_memory_pressure().await;
        self.publish_stats().await;
        debug!(cache = %self.name, expired, relieved, "maintenance pass completed");
    }

    async fn stats(&self) -> CacheStats {
        let sizes = {
            let state = self.state.lock().await;
            TierSizes {
                l1_size: state.l1.len(),
                l2_size: state.l2_keys.len(),
                l1_memory_bytes: state.l1.memory_usage(),
                predictions: state.l1.predictions(),
            }
        };

        CacheStats::collect(
            &self.name,
            self.policy.strategy,
            self.policy.ttl_seconds,
            self.policy.max_size,
            &self.counters,
            sizes,
        )
    }

    fn should_refresh(
        &self,
        age: Duration,
        ttl: Duration,
        prediction: Option<AccessPrediction>,
        now: Instant,
    ) -> bool {
        if !self.policy.auto_refresh
            || self.refresh_handler.is_none()
            || !self.running.load(Ordering::Acquire)
        {
            return false;
        }
        if age.as_secs_f64() <= ttl.as_secs_f64() * self.policy.refresh_threshold {
            return false;
        }
        // not worth it when the next access is expected after a refreshed copy would expire
        prediction.map_or(true, |prediction| prediction.next_predicted <= now + ttl)
    }

    async fn schedule_refresh(self: &Arc<Self>, key: &str, priority: u8) {
        let mut tasks = self.refresh_tasks.lock().await;
        if !self.running.load(Ordering::Acquire) {
            return;
        }
        while tasks.try_join_next().is_some() {}

        let core = Arc::clone(self);
        let key = key.to_string();
        tasks.spawn(async move { core.refresh(key, priority).await });
    }

    async fn refresh(&self, key: String, priority: u8) {
        let Some(handler) = self.refresh_handler.clone() else {
            return;
        };
        if !self.refreshing.lock().await.insert(key.clone()) {
            debug!(cache = %self.name, key = %key, "refresh already in flight");
            return;
        }

        match handler.refresh(&key).await {
            Ok(Some(value)) => {
                let still_cached = self.state.lock().await.l1.contains(&key);
                if still_cached {
                    self.set(&key, value, priority, None).await;
                    self.counters.record_refresh();
                    debug!(cache = %self.name, key = %key, "entry refreshed");
                }
            }
            Ok(None) => debug!(cache = %self.name, key = %key, "refresh kept cached value"),
            Err(e) => self.record_error("refresh", &e),
        }

        self.refreshing.lock().await.remove(&key);
    }
}

async fn maintenance_loop<V: CacheValue>(core: Arc<CacheCore<V>>, mut shutdown: watch::Receiver<bool>) {
    let period = core.settings.maintenance_interval();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => core.run_maintenance().await,
            _ = shutdown.changed() => break,
        }
    }
    debug!(cache = %core.name, "maintenance loop stopped");
}

async fn write_back_loop<V: CacheValue>(core: Arc<CacheCore<V>>, mut shutdown: watch::Receiver<bool>) {
    let period = core.settings.write_back_interval();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                core.flush_dirty_entries().await;
            }
            _ = shutdown.changed() => break,
        }
    }
    debug!(cache = %core.name, "write-back loop stopped");
}
