pub mod cache;
pub mod infrastructure;

pub use cache::{
    CacheManagerFactory, CachePolicy, CacheStats, CacheStrategy, CacheValue, InMemoryRemoteStore,
    RefreshHandler, RemoteStore, SmartCacheManager,
};
pub use infrastructure::{CacheError, CacheSettings, Result};
