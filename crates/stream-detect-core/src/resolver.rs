use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stream_detect_config::DetectorConfig;
use stream_detect_models::ServiceRecord;
use tracing::{debug, info, warn};

use crate::domain::extract_domain;
use crate::error::StoreError;
use crate::store::ServiceRegistry;

/// Preference key gating the one-time catalog seed.
pub const HAS_SEEDED_SERVICES: &str = "hasSeededServices";

#[derive(Debug, Clone, Copy)]
struct DomainVerdict {
    is_streaming: bool,
    observed_at: Instant,
}

/// Fast "is this a tracked streaming domain" check with bounded
/// staleness, backed by the registry.
///
/// The boolean cache is an optimization for the common "not tracked"
/// case; `service_info` always goes to the registry. Each page context
/// owns its own resolver, so the cache needs no synchronization.
pub struct DomainResolver {
    registry: Arc<ServiceRegistry>,
    cache: HashMap<String, DomainVerdict>,
    freshness_window: Duration,
    initialized: bool,
}

impl DomainResolver {
    pub fn new(registry: Arc<ServiceRegistry>, config: &DetectorConfig) -> Self {
        Self {
            registry,
            cache: HashMap::new(),
            freshness_window: Duration::from_millis(config.freshness_window_ms),
            initialized: false,
        }
    }

    /// Open the registry, run the one-time catalog seed if it has not
    /// happened yet, and preload every known domain as a positive cache
    /// entry. Idempotent.
    pub async fn init(&mut self) -> Result<(), StoreError> {
        if self.initialized {
            return Ok(());
        }

        self.registry.open().await?;

        let seeded = self
            .registry
            .get_preference(HAS_SEEDED_SERVICES)
            .await?
            .and_then(|value| value.as_bool())
            .unwrap_or(false);
        if !seeded {
            let count = self.registry.seed_known_services().await?;
            self.registry
                .set_preference(HAS_SEEDED_SERVICES, serde_json::Value::Bool(true))
                .await?;
            info!(count, "Seeded known streaming services");
        }

        self.preload().await?;
        self.initialized = true;
        Ok(())
    }

    /// Trades memory for skipping a registry round-trip on every poll
    /// of a tracked site.
    async fn preload(&mut self) -> Result<(), StoreError> {
        let domains = self.registry.list_all_domains().await?;
        let now = Instant::now();
        let count = domains.len();
        for domain in domains {
            self.cache.insert(
                domain,
                DomainVerdict {
                    is_streaming: true,
                    observed_at: now,
                },
            );
        }
        debug!(count, "Preloaded streaming domains into resolver cache");
        Ok(())
    }

    /// Cached yes/no check. Entries older than the freshness window are
    /// evicted lazily and revalidated against the registry. Malformed
    /// URLs are never streaming sites.
    pub async fn is_streaming_site(&mut self, url: &str) -> Result<bool, StoreError> {
        self.init().await?;

        let Some(domain) = extract_domain(url) else {
            warn!(url, "Cannot extract domain from URL");
            return Ok(false);
        };

        if let Some(cached) = self.cache.get(&domain) {
            if cached.observed_at.elapsed() < self.freshness_window {
                return Ok(cached.is_streaming);
            }
            self.cache.remove(&domain);
        }

        let is_streaming = self.registry.is_known_domain(&domain).await?;
        self.cache.insert(
            domain,
            DomainVerdict {
                is_streaming,
                observed_at: Instant::now(),
            },
        );
        Ok(is_streaming)
    }

    /// Full service metadata. Always queries the registry; the boolean
    /// cache is not a metadata cache.
    pub async fn service_info(
        &mut self,
        url: &str,
    ) -> Result<Option<ServiceRecord>, StoreError> {
        self.init().await?;

        let Some(domain) = extract_domain(url) else {
            return Ok(None);
        };
        self.registry.lookup_by_domain(&domain).await
    }

    /// Mark a domain as streaming, e.g. right after discovery learns
    /// it, so the next poll skips the registry.
    pub fn note_streaming(&mut self, domain: &str) {
        self.cache.insert(
            domain.to_string(),
            DomainVerdict {
                is_streaming: true,
                observed_at: Instant::now(),
            },
        );
    }

    /// Drop every cache entry older than the freshness window.
    pub fn evict_stale(&mut self) {
        let window = self.freshness_window;
        self.cache
            .retain(|_, verdict| verdict.observed_at.elapsed() < window);
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stream_detect_config::{DiscoveryTuning, PathManager};

    fn fixture(dir: &tempfile::TempDir, config: &DetectorConfig) -> DomainResolver {
        let paths = PathManager::rooted_at(dir.path());
        let registry = Arc::new(ServiceRegistry::new(&paths, DiscoveryTuning::default()));
        DomainResolver::new(registry, config)
    }

    #[tokio::test]
    async fn test_init_seeds_once_and_preloads() {
        let dir = tempfile::tempdir().unwrap();
        let config = DetectorConfig::default();
        let mut resolver = fixture(&dir, &config);

        resolver.init().await.unwrap();
        assert_eq!(resolver.cache_len(), 13);
        assert_eq!(
            resolver
                .registry()
                .get_preference(HAS_SEEDED_SERVICES)
                .await
                .unwrap(),
            Some(serde_json::Value::Bool(true))
        );

        // Second init is a no-op
        resolver.init().await.unwrap();
        assert_eq!(resolver.cache_len(), 13);
    }

    #[tokio::test]
    async fn test_is_streaming_site_hits_and_misses() {
        let dir = tempfile::tempdir().unwrap();
        let config = DetectorConfig::default();
        let mut resolver = fixture(&dir, &config);

        assert!(resolver
            .is_streaming_site("https://www.netflix.com/watch/1")
            .await
            .unwrap());
        assert!(!resolver
            .is_streaming_site("https://example.org/blog")
            .await
            .unwrap());
        // The negative verdict is now cached too
        assert_eq!(resolver.cache_len(), 14);
    }

    #[tokio::test]
    async fn test_malformed_url_is_not_streaming() {
        let dir = tempfile::tempdir().unwrap();
        let config = DetectorConfig::default();
        let mut resolver = fixture(&dir, &config);

        assert!(!resolver.is_streaming_site("not a url").await.unwrap());
        assert!(resolver.service_info("not a url").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_service_info_bypasses_boolean_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = DetectorConfig::default();
        let mut resolver = fixture(&dir, &config);
        resolver.init().await.unwrap();

        // A domain learned after preload is visible immediately via
        // service_info even though the cache has no entry for it
        resolver
            .registry()
            .record_discovery("example-stream.tv", crate::discovery::DiscoveryMetadata::default())
            .await
            .unwrap();

        let info = resolver
            .service_info("https://example-stream.tv/watch/42")
            .await
            .unwrap();
        assert!(info.is_some());
    }

    #[tokio::test]
    async fn test_stale_entries_are_evicted() {
        let dir = tempfile::tempdir().unwrap();
        let config = DetectorConfig {
            freshness_window_ms: 0, // Everything is stale immediately
            ..Default::default()
        };
        let mut resolver = fixture(&dir, &config);
        resolver.init().await.unwrap();
        assert_eq!(resolver.cache_len(), 13);

        resolver.evict_stale();
        assert_eq!(resolver.cache_len(), 0);

        // A zero-width window still answers correctly via the registry
        assert!(resolver
            .is_streaming_site("https://netflix.com/watch/1")
            .await
            .unwrap());
    }
}
