use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use stream_detect_models::MovieContext;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::monitor::DetectionEvent;
use crate::store::{entry_from_context, ServiceRegistry};

/// Structured key for one active sighting. The context id identifies
/// the page context (tab) that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub service: String,
    pub title: String,
    pub context_id: u64,
}

impl SessionKey {
    fn for_context(context_id: u64, context: &MovieContext) -> Self {
        Self {
            service: context.service_name.clone(),
            title: context.title.clone().unwrap_or_default(),
            context_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActiveSighting {
    pub context: MovieContext,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Currently active sightings across page contexts. One owner mutates
/// it; lifecycle is tied one-to-one to context teardown, which must
/// call `end_context`.
#[derive(Default)]
pub struct SessionStore {
    active: HashMap<SessionKey, ActiveSighting>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, context_id: u64, context: &MovieContext) -> SessionKey {
        let key = SessionKey::for_context(context_id, context);
        let now = Utc::now();
        self.active
            .entry(key.clone())
            .and_modify(|sighting| {
                sighting.context = context.clone();
                sighting.updated_at = now;
            })
            .or_insert_with(|| ActiveSighting {
                context: context.clone(),
                started_at: now,
                updated_at: now,
            });
        key
    }

    pub fn get(&self, key: &SessionKey) -> Option<&ActiveSighting> {
        self.active.get(key)
    }

    /// Drop every sighting owned by a torn-down context. Returns how
    /// many were released.
    pub fn end_context(&mut self, context_id: u64) -> usize {
        let before = self.active.len();
        self.active.retain(|key, _| key.context_id != context_id);
        before - self.active.len()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Consumes detection events on behalf of the UI/background layer:
/// persists a watch entry on each new detection and keeps the session
/// store in sync. Storage failures on non-critical paths are logged
/// and swallowed so event handling never crashes the host.
pub struct SessionCoordinator {
    registry: Arc<ServiceRegistry>,
    sessions: SessionStore,
}

impl SessionCoordinator {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            registry,
            sessions: SessionStore::new(),
        }
    }

    pub async fn handle(
        &mut self,
        context_id: u64,
        event: &DetectionEvent,
    ) -> Result<(), StoreError> {
        match event {
            DetectionEvent::MovieDetected(context) => {
                self.sessions.upsert(context_id, context);
                // A watch record the user depends on: surface failures
                self.registry.record_watch(entry_from_context(context)).await?;
                debug!(title = ?context.title, context_id, "Sighting recorded");
            }
            DetectionEvent::ProgressUpdate(context) => {
                self.sessions.upsert(context_id, context);
            }
            DetectionEvent::MovieLost { url } => {
                debug!(url = %url, context_id, "Movie no longer detected");
            }
        }
        Ok(())
    }

    /// Handle an event where persistence failures only matter as logs
    /// (badge updates and similar cosmetic consumers).
    pub async fn handle_lossy(&mut self, context_id: u64, event: &DetectionEvent) {
        if let Err(e) = self.handle(context_id, event).await {
            warn!(context_id, "Dropping detection event after storage failure: {}", e);
        }
    }

    /// Context teardown notification.
    pub fn end_context(&mut self, context_id: u64) {
        let released = self.sessions.end_context(context_id);
        debug!(context_id, released, "Context ended");
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stream_detect_config::{DiscoveryTuning, PathManager};
    use stream_detect_models::ServiceCategory;

    fn context(title: &str) -> MovieContext {
        MovieContext {
            url: "https://netflix.com/watch/1".to_string(),
            domain: "netflix.com".to_string(),
            service_name: "Netflix".to_string(),
            category: ServiceCategory::Premium,
            title: Some(title.to_string()),
            is_movie_page: true,
            confidence: 0.9,
            current_time: 0.0,
            duration: 3600.0,
        }
    }

    #[test]
    fn test_upsert_is_keyed_by_service_title_context() {
        let mut store = SessionStore::new();
        store.upsert(1, &context("Example Movie"));
        store.upsert(1, &context("Example Movie"));
        store.upsert(2, &context("Example Movie"));
        store.upsert(1, &context("Another Movie"));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_end_context_releases_only_that_context() {
        let mut store = SessionStore::new();
        store.upsert(1, &context("Example Movie"));
        store.upsert(1, &context("Another Movie"));
        store.upsert(2, &context("Example Movie"));

        assert_eq!(store.end_context(1), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.end_context(1), 0);
    }

    #[tokio::test]
    async fn test_coordinator_persists_detections_and_tracks_progress() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathManager::rooted_at(dir.path());
        let registry = Arc::new(ServiceRegistry::new(&paths, DiscoveryTuning::default()));
        let mut coordinator = SessionCoordinator::new(registry.clone());

        let detected = context("Example Movie");
        coordinator
            .handle(7, &DetectionEvent::MovieDetected(detected.clone()))
            .await
            .unwrap();

        let mut progressed = detected.clone();
        progressed.current_time = 120.0;
        coordinator
            .handle(7, &DetectionEvent::ProgressUpdate(progressed))
            .await
            .unwrap();

        // Progress updates do not create additional watch entries
        let recent = registry.recent_watches(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].title, "Example Movie");

        assert_eq!(coordinator.sessions().len(), 1);
        coordinator.end_context(7);
        assert!(coordinator.sessions().is_empty());
    }
}
