pub mod codec;
pub mod factory;
pub mod manager;
pub mod memory;
pub mod memory_manager;
pub mod stats;
pub mod storage;
pub mod strategy;

pub use codec::CacheValue;
pub use factory::{
    CacheManagerFactory, ManagedCache, GPT_CACHE, LOG_CACHE, PROFILE_CACHE, SESSION_CACHE,
};
pub use manager::{CacheManagerBuilder, RefreshHandler, SmartCacheManager, DEFAULT_PRIORITY};
pub use memory::{AccessPrediction, CacheEntry, MemoryCache, Payload};
pub use memory_manager::{MemoryMonitor, MemoryPressure, StaticMemoryMonitor, SystemMemoryMonitor};
pub use stats::{CacheStats, StatsReport};
pub use storage::{FileRemoteStore, InMemoryRemoteStore, RemoteStore};
pub use strategy::{CachePolicy, CacheStrategy, EvictionStrategy};
