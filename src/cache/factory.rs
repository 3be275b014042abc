use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

use crate::cache::codec::CacheValue;
use crate::cache::manager::{RefreshHandler, SmartCacheManager};
use crate::cache::memory_manager::{MemoryMonitor, SystemMemoryMonitor};
use crate::cache::stats::CacheStats;
use crate::cache::storage::RemoteStore;
use crate::cache::strategy::CachePolicy;
pub use crate::cache::strategy::{GPT_CACHE, LOG_CACHE, PROFILE_CACHE, SESSION_CACHE};
use crate::infrastructure::config::CacheSettings;
use crate::infrastructure::error::{CacheError, Result};

/// Type-erased view of a manager, for lifecycle and reporting
#[async_trait]
pub trait ManagedCache: Send + Sync {
    fn name(&self) -> &str;
    fn policy(&self) -> &CachePolicy;
    async fn stop(&self);
    async fn stats(&self) -> CacheStats;
}

#[async_trait]
impl<V: CacheValue> ManagedCache for SmartCacheManager<V> {
    fn name(&self) -> &str {
        SmartCacheManager::name(self)
    }

    fn policy(&self) -> &CachePolicy {
        SmartCacheManager::policy(self)
    }

    async fn stop(&self) {
        SmartCacheManager::stop(self).await;
    }

    async fn stats(&self) -> CacheStats {
        self.get_stats().await
    }
}

struct Registration {
    policy: CachePolicy,
    handle: Arc<dyn ManagedCache>,
    instance: Arc<dyn Any + Send + Sync>,
}

/// Registry of named cache managers sharing one tier-2 store.
///
/// Each name maps to exactly one started manager. Requesting an existing
/// name with a different explicit policy fails with
/// [`CacheError::PolicyConflict`]; requesting it with another value type
/// fails with [`CacheError::TypeMismatch`].
pub struct CacheManagerFactory {
    settings: CacheSettings,
    remote: Option<Arc<dyn RemoteStore>>,
    monitor: Arc<dyn MemoryMonitor>,
    instances: Mutex<HashMap<String, Registration>>,
}

impl CacheManagerFactory {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            settings,
            remote: None,
            monitor: Arc::new(SystemMemoryMonitor),
            instances: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_memory_monitor(mut self, monitor: Arc<dyn MemoryMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Return the started manager for `name`, creating it on first use.
    ///
    /// With `policy == None` an existing manager is returned as is, and a new
    /// one takes its policy from the settings.
    pub async fn get_cache_manager<V: CacheValue>(
        &self,
        name: &str,
        policy: Option<CachePolicy>,
    ) -> Result<Arc<SmartCacheManager<V>>> {
        self.get_or_create(name, policy, None).await
    }

    /// Like [`get_cache_manager`](Self::get_cache_manager), wiring `handler`
    /// into a newly created manager. An existing manager keeps its handler.
    pub async fn get_cache_manager_with_refresh<V: CacheValue>(
        &self,
        name: &str,
        policy: Option<CachePolicy>,
        handler: Arc<dyn RefreshHandler<V>>,
    ) -> Result<Arc<SmartCacheManager<V>>> {
        self.get_or_create(name, policy, Some(handler)).await
    }

    async fn get_or_create<V: CacheValue>(
        &self,
        name: &str,
        policy: Option<CachePolicy>,
        handler: Option<Arc<dyn RefreshHandler<V>>>,
    ) -> Result<Arc<SmartCacheManager<V>>> {
        let mut instances = self.instances.lock().await;

        if let Some(existing) = instances.get(name) {
            if let Some(requested) = &policy {
                if *requested != existing.policy {
                    return Err(CacheError::PolicyConflict {
                        name: name.to_string(),
                    });
                }
            }
            return Arc::clone(&existing.instance)
                .downcast::<SmartCacheManager<V>>()
                .map_err(|_| CacheError::TypeMismatch {
                    name: name.to_string(),
                });
        }

        let policy = policy.unwrap_or_else(|| self.settings.policy_for(name));
        let mut builder = SmartCacheManager::builder(name, policy.clone())
            .settings(self.settings.manager.clone())
            .memory_monitor(Arc::clone(&self.monitor));
        if let Some(remote) = &self.remote {
            builder = builder.remote(Arc::clone(remote));
        }
        if let Some(handler) = handler {
            builder = builder.refresh_handler(handler);
        }

        let manager = Arc::new(builder.build()?);
        manager.start().await;

        let handle: Arc<dyn ManagedCache> = manager.clone();
        let instance: Arc<dyn Any + Send + Sync> = manager.clone();
        instances.insert(
            name.to_string(),
            Registration {
                policy,
                handle,
                instance,
            },
        );

        info!(cache = %name, "registered cache manager");
        Ok(manager)
    }

    /// Stop every manager (flushing dirty entries) and empty the registry
    pub async fn shutdown_all(&self) {
        let registrations: Vec<Registration> = {
            let mut instances = self.instances.lock().await;
            instances.drain().map(|(_, registration)| registration).collect()
        };

        let count = registrations.len();
        for registration in registrations {
            registration.handle.stop().await;
        }
        info!(count, "all cache managers stopped");
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.instances.lock().await.contains_key(name)
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.instances.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn all_stats(&self) -> HashMap<String, CacheStats> {
        let handles: Vec<Arc<dyn ManagedCache>> = self
            .instances
            .lock()
            .await
            .values()
            .map(|registration| Arc::clone(&registration.handle))
            .collect();

        let mut stats = HashMap::with_capacity(handles.len());
        for handle in handles {
            stats.insert(handle.name().to_string(), handle.stats().await);
        }
        stats
    }

    pub async fn cached_get<V: CacheValue>(&self, cache_name: &str, key: &str) -> Result<Option<V>> {
        let manager = self.get_cache_manager::<V>(cache_name, None).await?;
        Ok(manager.get(key).await)
    }

    pub async fn cached_set<V: CacheValue>(
        &self,
        cache_name: &str,
        key: &str,
        value: V,
        priority: u8,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let manager = self.get_cache_manager::<V>(cache_name, None).await?;
        manager.set_with(key, value, priority, ttl).await;
        Ok(())
    }

    // preset policies come from `CacheSettings::policy_for`
    pub async fn profile_cache<V: CacheValue>(&self) -> Result<Arc<SmartCacheManager<V>>> {
        self.get_cache_manager(PROFILE_CACHE, None).await
    }

    pub async fn gpt_cache<V: CacheValue>(&self) -> Result<Arc<SmartCacheManager<V>>> {
        self.get_cache_manager(GPT_CACHE, None).await
    }

    pub async fn log_cache<V: CacheValue>(&self) -> Result<Arc<SmartCacheManager<V>>> {
        self.get_cache_manager(LOG_CACHE, None).await
    }

    pub async fn session_cache<V: CacheValue>(&self) -> Result<Arc<SmartCacheManager<V>>> {
        self.get_cache_manager(SESSION_CACHE, None).await
    }
}

impl Default for CacheManagerFactory {
    fn default() -> Self {
        Self::new(CacheSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory_manager::StaticMemoryMonitor;
    use crate::cache::strategy::CacheStrategy;

    fn factory() -> CacheManagerFactory {
        CacheManagerFactory::default().with_memory_monitor(Arc::new(StaticMemoryMonitor::new(10.0)))
    }

    #[tokio::test]
    async fn test_same_name_returns_same_instance() {
        let factory = factory();
        let first = factory.get_cache_manager::<String>("a", None).await.unwrap();
        let second = factory.get_cache_manager::<String>("a", None).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_running());
        factory.shutdown_all().await;
    }

    #[tokio::test]
    async fn test_preset_uses_configured_override() {
        let mut settings = CacheSettings::default();
        settings
            .caches
            .insert(LOG_CACHE.to_string(), CachePolicy::logs().with_max_size(10));
        let factory = CacheManagerFactory::new(settings)
            .with_memory_monitor(Arc::new(StaticMemoryMonitor::new(10.0)));

        let logs = factory.log_cache::<String>().await.unwrap();
        assert_eq!(logs.policy().max_size, 10);
        assert_eq!(logs.policy().strategy, CacheStrategy::TTL);
        factory.shutdown_all().await;
    }

    #[tokio::test]
    async fn test_shutdown_all_empties_registry() {
        let factory = factory();
        let manager = factory.get_cache_manager::<u64>("counts", None).await.unwrap();
        factory.get_cache_manager::<String>("names", None).await.unwrap();
        assert_eq!(factory.names().await, vec!["counts", "names"]);

        factory.shutdown_all().await;
        assert!(factory.names().await.is_empty());
        assert!(!manager.is_running());
    }
}
