use async_trait::async_trait;
use smart_cache::cache::codec::{self, CacheValue};
use smart_cache::cache::{
    CachePolicy, CacheStrategy, InMemoryRemoteStore, RefreshHandler, RemoteStore,
    SmartCacheManager, StaticMemoryMonitor, StatsReport,
};
use smart_cache::{CacheError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn quiet_monitor() -> Arc<StaticMemoryMonitor> {
    Arc::new(StaticMemoryMonitor::new(10.0))
}

fn local<V: CacheValue>(name: &str, policy: CachePolicy) -> SmartCacheManager<V> {
    SmartCacheManager::builder(name, policy)
        .memory_monitor(quiet_monitor())
        .build()
        .unwrap()
}

fn shared<V: CacheValue>(
    name: &str,
    policy: CachePolicy,
    remote: &Arc<InMemoryRemoteStore>,
) -> SmartCacheManager<V> {
    SmartCacheManager::builder(name, policy)
        .remote(remote.clone())
        .memory_monitor(quiet_monitor())
        .build()
        .unwrap()
}

/// Tier-2 whose every call fails, like an unreachable server
struct UnreachableStore;

#[async_trait]
impl RemoteStore for UnreachableStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Err(CacheError::remote("get", "connection refused"))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
        Err(CacheError::remote("set", "connection refused"))
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Err(CacheError::remote("delete", "connection refused"))
    }

    async fn keys(&self, _pattern: &str) -> Result<Vec<String>> {
        Err(CacheError::remote("keys", "connection refused"))
    }
}

#[tokio::test]
async fn test_write_then_read() -> anyhow::Result<()> {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let cache = shared::<String>("users", CachePolicy::new(CacheStrategy::LRU), &remote);

    cache.set("k", "v".to_string()).await;

    assert_eq!(cache.get("k").await, Some("v".to_string()));
    assert!(remote.contains("smartcache:users:k").await);

    let stats = cache.get_stats().await;
    assert_eq!(stats.l1_hits, 1);
    assert_eq!(stats.l2_size, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_ttl_expiry_returns_default() -> anyhow::Result<()> {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let policy = CachePolicy::new(CacheStrategy::TTL).with_ttl_seconds(1);
    let cache = shared::<u32>("short", policy, &remote);

    cache.set("x", 7).await;
    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(cache.get_or("x", 0).await, 0);
    let stats = cache.get_stats().await;
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.l2_hits, 0);
    assert_eq!(stats.l1_size, 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_per_call_ttl_shortens_lifetime() -> anyhow::Result<()> {
    let cache = local::<u32>("mixed", CachePolicy::new(CacheStrategy::LRU).with_ttl_seconds(60));

    cache.set_with("brief", 1, 1, Some(Duration::from_secs(2))).await;
    cache.set("long", 2).await;
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert!(cache.get("brief").await.is_none());
    assert_eq!(cache.get("long").await, Some(2));
    Ok(())
}

#[tokio::test]
async fn test_capacity_is_never_exceeded() -> anyhow::Result<()> {
    let cache = local::<u32>("bounded", CachePolicy::new(CacheStrategy::LRU).with_max_size(3));

    for i in 0..5 {
        cache.set(&format!("k{}", i), i).await;
    }

    let stats = cache.get_stats().await;
    assert_eq!(stats.l1_size, 3);
    assert_eq!(stats.evictions, 2);
    Ok(())
}

#[tokio::test]
async fn test_lru_evicts_least_recently_used() -> anyhow::Result<()> {
    let policy = CachePolicy::new(CacheStrategy::LRU)
        .with_max_size(2)
        .with_persistence(false);
    let cache = local::<String>("lru", policy);

    cache.set("a", "1".to_string()).await;
    cache.set("b", "2".to_string()).await;
    assert!(cache.get("a").await.is_some());
    cache.set("c", "3".to_string()).await;

    assert!(cache.get("b").await.is_none());
    assert_eq!(cache.get("a").await.as_deref(), Some("1"));
    assert_eq!(cache.get("c").await.as_deref(), Some("3"));
    Ok(())
}

#[tokio::test]
async fn test_lfu_evicts_least_frequently_used() -> anyhow::Result<()> {
    let policy = CachePolicy::new(CacheStrategy::LFU)
        .with_max_size(2)
        .with_persistence(false);
    let cache = local::<String>("lfu", policy);

    cache.set("a", "1".to_string()).await;
    cache.set("b", "2".to_string()).await;
    for _ in 0..3 {
        cache.get("a").await;
    }
    cache.get("b").await;
    cache.set("c", "3".to_string()).await;

    assert!(cache.get("b").await.is_none());
    assert!(cache.get("a").await.is_some());
    assert!(cache.get("c").await.is_some());
    Ok(())
}

#[tokio::test]
async fn test_priority_eviction_drops_lowest_level_first() -> anyhow::Result<()> {
    let policy = CachePolicy::new(CacheStrategy::TTL)
        .with_max_size(2)
        .with_persistence(false);
    let cache = local::<String>("priority", policy);

    cache.set_with("high", "h".to_string(), 2, None).await;
    cache.set_with("low", "l".to_string(), 0, None).await;
    cache.set_with("mid", "m".to_string(), 1, None).await;

    assert!(cache.get("low").await.is_none());
    assert!(cache.get("high").await.is_some());
    assert!(cache.get("mid").await.is_some());
    Ok(())
}

#[tokio::test]
async fn test_write_back_is_durable_after_stop() -> anyhow::Result<()> {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let cache = shared::<String>("sessions", CachePolicy::new(CacheStrategy::WriteBack), &remote);
    cache.start().await;

    cache.set("y", "v".to_string()).await;
    assert!(!remote.contains("smartcache:sessions:y").await);

    cache.stop().await;

    let bytes = remote
        .get("smartcache:sessions:y")
        .await?
        .expect("dirty entry flushed on stop");
    assert_eq!(codec::decode_remote::<String>(&bytes, true)?, "v");
    // nothing is left dirty
    assert_eq!(cache.flush().await, 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_write_back_loop_flushes_periodically() -> anyhow::Result<()> {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let cache = shared::<u64>("counters", CachePolicy::new(CacheStrategy::WriteBack), &remote);
    cache.start().await;

    cache.set("visits", 41).await;
    tokio::time::sleep(Duration::from_secs(31)).await;

    assert!(remote.contains("smartcache:counters:visits").await);
    cache.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_dirty_victim_is_written_back_on_eviction() -> anyhow::Result<()> {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let policy = CachePolicy::new(CacheStrategy::WriteBack).with_max_size(1);
    let cache = shared::<String>("tiny", policy, &remote);

    cache.set("a", "first".to_string()).await;
    cache.set("b", "second".to_string()).await;

    assert!(remote.contains("smartcache:tiny:a").await);
    assert!(!remote.contains("smartcache:tiny:b").await);
    // read back through tier-2
    assert_eq!(cache.get("a").await.as_deref(), Some("first"));
    Ok(())
}

#[tokio::test]
async fn test_compression_round_trip() -> anyhow::Result<()> {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let cache = shared::<String>("gpt", CachePolicy::gpt_responses(), &remote);
    let reply = "The cache keeps hot replies close. ".repeat(100);

    cache.set("prompt-1", reply.clone()).await;

    assert_eq!(cache.get("prompt-1").await, Some(reply.clone()));
    let stats = cache.get_stats().await;
    assert_eq!(stats.compressions, 1);
    assert!(stats.l1_memory_bytes < reply.len());

    let bytes = remote.get("smartcache:gpt:prompt-1").await?.unwrap();
    assert_eq!(codec::decode_remote::<String>(&bytes, true)?, reply);
    Ok(())
}

#[tokio::test]
async fn test_uncompressed_namespace_stores_plain_encoding() -> anyhow::Result<()> {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let policy = CachePolicy::new(CacheStrategy::LRU).with_compression(false);
    let cache = shared::<String>("plain", policy, &remote);
    let text = "x".repeat(4096);

    cache.set("k", text.clone()).await;

    let bytes = remote.get("smartcache:plain:k").await?.unwrap();
    assert_eq!(bytes, text.encode()?);
    assert_eq!(cache.get_stats().await.compressions, 0);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_tier2_degrades_to_tier1() -> anyhow::Result<()> {
    let cache = SmartCacheManager::<String>::builder("degraded", CachePolicy::default())
        .remote(Arc::new(UnreachableStore))
        .memory_monitor(quiet_monitor())
        .build()?;
    cache.start().await;

    cache.set("k", "v".to_string()).await;
    assert_eq!(cache.get("k").await.as_deref(), Some("v"));
    assert!(cache.get("missing").await.is_none());
    assert!(cache.delete("k").await);
    cache.clear().await;

    let stats = cache.get_stats().await;
    // keys on start, set, delete, keys on clear
    assert!(stats.errors >= 4);
    assert_eq!(stats.l1_hits, 1);

    cache.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_promotion_from_tier2() -> anyhow::Result<()> {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let writer = shared::<String>("profiles", CachePolicy::new(CacheStrategy::LRU), &remote);
    writer.set("user:1", "alice".to_string()).await;

    // a second process sharing the same tier-2
    let reader = shared::<String>("profiles", CachePolicy::new(CacheStrategy::LRU), &remote);
    reader.start().await;

    assert_eq!(reader.get("user:1").await.as_deref(), Some("alice"));
    assert_eq!(reader.get("user:1").await.as_deref(), Some("alice"));

    let stats = reader.get_stats().await;
    assert_eq!(stats.l2_hits, 1);
    assert_eq!(stats.l1_hits, 1);
    assert_eq!(stats.l1_size, 1);

    reader.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_delete_removes_from_both_tiers() -> anyhow::Result<()> {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let cache = shared::<String>("del", CachePolicy::new(CacheStrategy::LRU), &remote);

    cache.set("k", "v".to_string()).await;
    assert!(cache.delete("k").await);

    assert!(!remote.contains("smartcache:del:k").await);
    assert!(cache.get("k").await.is_none());
    assert!(!cache.delete("k").await);
    Ok(())
}

#[tokio::test]
async fn test_clear_empties_namespace_only() -> anyhow::Result<()> {
    let remote = Arc::new(InMemoryRemoteStore::new());
    remote.set("smartcache:logs:old", b"x".to_vec(), None).await?;
    remote.set("smartcache:other:k", b"x".to_vec(), None).await?;
    let cache = shared::<String>("logs", CachePolicy::new(CacheStrategy::LRU), &remote);

    cache.set("a", "1".to_string()).await;
    cache.set("b", "2".to_string()).await;
    cache.clear().await;

    assert_eq!(cache.get_stats().await.l1_size, 0);
    assert!(remote.keys("smartcache:logs:*").await?.is_empty());
    assert!(remote.contains("smartcache:other:k").await);
    Ok(())
}

struct OriginCounter {
    calls: AtomicUsize,
}

#[async_trait]
impl RefreshHandler<String> for OriginCounter {
    async fn refresh(&self, key: &str) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(format!("fresh:{}", key)))
    }
}

#[tokio::test(start_paused = true)]
async fn test_hot_entry_is_refreshed_near_expiry() -> anyhow::Result<()> {
    let origin = Arc::new(OriginCounter {
        calls: AtomicUsize::new(0),
    });
    let policy = CachePolicy::new(CacheStrategy::Adaptive)
        .with_ttl_seconds(10)
        .with_persistence(false)
        .with_auto_refresh(true, 0.5);
    let cache = SmartCacheManager::<String>::builder("refreshing", policy)
        .memory_monitor(quiet_monitor())
        .refresh_handler(origin.clone())
        .build()?;
    cache.start().await;

    cache.set("k", "stale".to_string()).await;
    assert_eq!(cache.get("k").await.as_deref(), Some("stale"));
    assert_eq!(origin.calls.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_secs(6)).await;
    // past half the TTL: served from cache, refresh runs in the background
    assert_eq!(cache.get("k").await.as_deref(), Some("stale"));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(origin.calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.get("k").await.as_deref(), Some("fresh:k"));
    let stats = cache.get_stats().await;
    assert_eq!(stats.refreshes, 1);
    // only the caller's write is counted
    assert_eq!(stats.writes, 1);

    cache.stop().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_maintenance_loop_drops_expired_entries() -> anyhow::Result<()> {
    let policy = CachePolicy::new(CacheStrategy::LRU).with_ttl_seconds(5);
    let cache = local::<u32>("maintained", policy);
    cache.start().await;

    cache.set("a", 1).await;
    cache.set("b", 2).await;
    tokio::time::sleep(Duration::from_secs(61)).await;

    let stats = cache.get_stats().await;
    assert_eq!(stats.l1_size, 0);
    assert_eq!(stats.evictions, 2);
    cache.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_memory_pressure_shrinks_tier1() -> anyhow::Result<()> {
    let monitor = Arc::new(StaticMemoryMonitor::new(10.0));
    let policy = CachePolicy::new(CacheStrategy::LRU)
        .with_max_size(10)
        .with_persistence(false);
    let cache = SmartCacheManager::<u32>::builder("pressured", policy)
        .memory_monitor(monitor.clone())
        .build()?;

    for i in 0..10 {
        cache.set(&format!("k{}", i), i).await;
    }
    cache.run_maintenance().await;
    assert_eq!(cache.get_stats().await.l1_size, 10);

    monitor.set(95.0);
    cache.run_maintenance().await;

    let stats = cache.get_stats().await;
    assert_eq!(stats.l1_size, 7);
    assert_eq!(stats.evictions, 3);
    Ok(())
}

#[tokio::test]
async fn test_stats_are_published_to_tier2() -> anyhow::Result<()> {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let cache = shared::<String>("published", CachePolicy::new(CacheStrategy::LRU), &remote);

    cache.run_maintenance().await;
    assert!(!remote.contains("cache_stats:published").await);

    cache.set("k", "v".to_string()).await;
    cache.get("k").await;
    cache.get("missing").await;
    cache.run_maintenance().await;

    let bytes = remote.get("cache_stats:published").await?.unwrap();
    let report: StatsReport = serde_json::from_slice(&bytes)?;
    assert_eq!(report.name, "published");
    assert_eq!(report.total_requests, 2);
    assert!((report.hit_ratio - 0.5).abs() < f64::EPSILON);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_access() -> anyhow::Result<()> {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let cache = Arc::new(shared::<u64>("concurrent", CachePolicy::default(), &remote));

    let writes = (0..50u64).map(|i| {
        let cache = cache.clone();
        async move { cache.set(&format!("k{}", i), i * 2).await }
    });
    futures::future::join_all(writes).await;

    let reads = (0..50u64).map(|i| {
        let cache = cache.clone();
        async move { cache.get(&format!("k{}", i)).await }
    });
    let values = futures::future::join_all(reads).await;

    for (i, value) in values.into_iter().enumerate() {
        assert_eq!(value, Some(i as u64 * 2));
    }
    assert_eq!(cache.get_stats().await.writes, 50);
    Ok(())
}

#[tokio::test]
async fn test_json_values_round_trip_through_both_tiers() -> anyhow::Result<()> {
    let reply = serde_json::json!({
        "reply": "hello there ".repeat(200),
        "usage": { "prompt_tokens": 12, "completion_tokens": 400 },
    });

    let local_only = CachePolicy::new(CacheStrategy::LRU).with_persistence(false);
    let cache = local::<serde_json::Value>("json-local", local_only);
    cache.set("k", reply.clone()).await;
    assert_eq!(cache.get("k").await, Some(reply.clone()));
    let stats = cache.get_stats().await;
    assert_eq!(stats.compressions, 1);
    assert_eq!(stats.errors, 0);

    let remote = Arc::new(InMemoryRemoteStore::new());
    let writer = shared::<serde_json::Value>("json", CachePolicy::new(CacheStrategy::LRU), &remote);
    writer.set("k", reply.clone()).await;

    let reader = shared::<serde_json::Value>("json", CachePolicy::new(CacheStrategy::LRU), &remote);
    reader.start().await;
    assert_eq!(reader.get("k").await, Some(reply));
    assert_eq!(reader.get_stats().await.l2_hits, 1);

    reader.stop().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_zero_ttl_falls_back_to_policy_ttl() -> anyhow::Result<()> {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let policy = CachePolicy::new(CacheStrategy::LRU).with_ttl_seconds(5);
    let first = shared::<String>("zero", policy.clone(), &remote);

    first.set_with("k", "stale".to_string(), 1, Some(Duration::ZERO)).await;
    assert_eq!(first.get("k").await.as_deref(), Some("stale"));

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(first.get("k").await.is_none());
    assert!(!remote.contains("smartcache:zero:k").await);

    let second = shared::<String>("zero", policy, &remote);
    second.start().await;
    assert!(second.get("k").await.is_none());

    second.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_namespaces_cannot_nest() -> anyhow::Result<()> {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let nested = SmartCacheManager::<String>::builder("a:b", CachePolicy::default())
        .remote(remote.clone())
        .build();
    assert!(matches!(nested, Err(CacheError::Configuration { .. })));

    // sibling names sharing a leading substring stay disjoint
    let a = shared::<String>("a", CachePolicy::new(CacheStrategy::LRU), &remote);
    let ab = shared::<String>("ab", CachePolicy::new(CacheStrategy::LRU), &remote);
    a.set("k", "1".to_string()).await;
    ab.set("k", "2".to_string()).await;

    a.clear().await;
    assert!(!remote.contains("smartcache:a:k").await);
    assert!(remote.contains("smartcache:ab:k").await);
    assert_eq!(ab.get("k").await.as_deref(), Some("2"));
    Ok(())
}
