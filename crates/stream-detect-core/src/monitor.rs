use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use stream_detect_config::DetectorConfig;
use stream_detect_models::MovieContext;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::classifier::PageClassifier;
use crate::discovery::{url_pattern_candidates, DiscoveryEngine, DiscoveryMetadata};
use crate::error::StoreError;
use crate::page::{PageObservation, PageSnapshot};
use crate::resolver::DomainResolver;
use crate::store::ServiceRegistry;

/// Detection lifecycle events for the background/UI consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionEvent {
    /// A classification transitioned from no-movie (or a different
    /// title/url) to movie. Fired once per sighting.
    MovieDetected(MovieContext),
    /// `current_time` or `duration` changed for the already-detected
    /// movie. Never re-fires `MovieDetected`.
    ProgressUpdate(MovieContext),
    /// The page stopped qualifying as movie content.
    MovieLost { url: String },
}

/// Where observations come from: the host snapshots the live page on
/// request. Futures need not be `Send`; the monitor runs on the
/// cooperative single-threaded host context.
#[async_trait(?Send)]
pub trait SnapshotSource {
    async fn observe(&mut self) -> anyhow::Result<PageObservation>;
}

/// Control surface for a running monitor. Triggers coalesce: bursts of
/// DOM-change notifications collapse into at most one queued
/// re-evaluation.
#[derive(Clone)]
pub struct MonitorHandle {
    triggers: mpsc::Sender<()>,
    shutdown: watch::Sender<bool>,
}

impl MonitorHandle {
    /// Ask for a re-evaluation soon. Cheap and lossy; a queued trigger
    /// already covers this request.
    pub fn request_reevaluation(&self) {
        let _ = self.triggers.try_send(());
    }

    /// Stop the monitor loop. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Drives one page context: every poll tick or coalesced trigger takes
/// a fresh observation, classifies it, and emits lifecycle events.
/// Lookup failures are logged and never abort the loop.
pub struct PageMonitor {
    classifier: PageClassifier,
    resolver: DomainResolver,
    discovery: DiscoveryEngine,
    poll_interval: Duration,
    auto_learn: bool,
    current: Option<MovieContext>,
    events: mpsc::Sender<DetectionEvent>,
    triggers: mpsc::Receiver<()>,
    shutdown: watch::Receiver<bool>,
}

impl PageMonitor {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        config: &DetectorConfig,
        events: mpsc::Sender<DetectionEvent>,
    ) -> (Self, MonitorHandle) {
        // Capacity 1 makes try_send the coalescing point
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let monitor = Self {
            classifier: PageClassifier::new(config),
            resolver: DomainResolver::new(registry.clone(), config),
            discovery: DiscoveryEngine::new(registry, config),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            auto_learn: false,
            current: None,
            events,
            triggers: trigger_rx,
            shutdown: shutdown_rx,
        };
        let handle = MonitorHandle {
            triggers: trigger_tx,
            shutdown: shutdown_tx,
        };
        (monitor, handle)
    }

    /// Learn unregistered domains that show video content instead of
    /// only reporting them as non-movies.
    pub fn with_auto_learn(mut self, enabled: bool) -> Self {
        self.auto_learn = enabled;
        self
    }

    pub fn current(&self) -> Option<&MovieContext> {
        self.current.as_ref()
    }

    /// One classification pass. Returns the events this observation
    /// produced; the caller (or `run`) forwards them.
    pub async fn evaluate(
        &mut self,
        observation: &PageObservation,
    ) -> Result<Vec<DetectionEvent>, StoreError> {
        let context = self.classifier.detect(&mut self.resolver, observation).await?;
        let mut events = Vec::new();

        match context {
            Some(context) if context.title.is_some() => {
                let is_new = self
                    .current
                    .as_ref()
                    .map_or(true, |current| !current.same_sighting(&context));

                if is_new {
                    self.current = Some(context.clone());
                    events.push(DetectionEvent::MovieDetected(context));
                } else if let Some(current) = self.current.as_mut() {
                    if context.current_time != current.current_time
                        || context.duration != current.duration
                    {
                        current.current_time = context.current_time;
                        current.duration = context.duration;
                        events.push(DetectionEvent::ProgressUpdate(current.clone()));
                    }
                }
            }
            _ => {
                if let Some(previous) = self.current.take() {
                    debug!(url = %previous.url, "Movie no longer detected on page");
                    events.push(DetectionEvent::MovieLost { url: previous.url });
                }
                if self.auto_learn {
                    self.maybe_learn(observation).await?;
                }
            }
        }

        Ok(events)
    }

    /// Explicit discovery follow-up: classification declined, but the
    /// page looks like video content on an unregistered domain.
    async fn maybe_learn(&mut self, observation: &PageObservation) -> Result<(), StoreError> {
        if self.resolver.service_info(&observation.url).await?.is_some() {
            return Ok(());
        }

        let shows_video = !observation.media.is_empty() || {
            let snapshot = PageSnapshot::from_observation(observation);
            snapshot.has_media_element()
        };
        if !shows_video || url_pattern_candidates(&observation.url).is_empty() {
            return Ok(());
        }

        if let Some(record) = self
            .discovery
            .learn_from_page(observation, DiscoveryMetadata::default())
            .await?
        {
            self.resolver.note_streaming(&record.domain);
            info!(domain = %record.domain, "Learned streaming service from page");
        }
        Ok(())
    }

    /// Run until shutdown. Poll ticks and coalesced triggers feed the
    /// same evaluation pipeline; stopping releases the source and all
    /// timers, so nothing keeps observing a torn-down page.
    pub async fn run(mut self, source: &mut dyn SnapshotSource) -> anyhow::Result<()> {
        self.resolver.init().await?;

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                result = self.shutdown.changed() => {
                    if result.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
                received = self.triggers.recv() => {
                    if received.is_none() {
                        break;
                    }
                    // Drain anything queued behind this trigger
                    while self.triggers.try_recv().is_ok() {}
                }
            }

            let observation = match source.observe().await {
                Ok(observation) => observation,
                Err(e) => {
                    warn!("Snapshot source failed: {}", e);
                    continue;
                }
            };

            match self.evaluate(&observation).await {
                Ok(events) => {
                    for event in events {
                        if self.events.send(event).await.is_err() {
                            info!("Event consumer gone, stopping monitor");
                            return Ok(());
                        }
                    }
                }
                // Lookup failures must never abort the polling loop
                Err(e) => warn!("Classification pass failed: {}", e),
            }
        }

        info!("Page monitor stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::MediaState;
    use stream_detect_config::{DiscoveryTuning, PathManager};

    fn fixture(dir: &tempfile::TempDir) -> (PageMonitor, MonitorHandle, mpsc::Receiver<DetectionEvent>) {
        let paths = PathManager::rooted_at(dir.path());
        let registry = Arc::new(ServiceRegistry::new(&paths, DiscoveryTuning::default()));
        let (events_tx, events_rx) = mpsc::channel(16);
        let (monitor, handle) = PageMonitor::new(registry, &DetectorConfig::default(), events_tx);
        (monitor, handle, events_rx)
    }

    fn netflix_observation(title: &str, current_time: f64) -> PageObservation {
        PageObservation::new(
            "https://netflix.com/watch/12345",
            format!(
                "<html><body><h1 data-uia=\"video-title\">{}</h1><video></video></body></html>",
                title
            ),
            vec![MediaState::new(current_time, 3600.0)],
        )
    }

    #[tokio::test]
    async fn test_detected_fires_once_then_progress_updates() {
        let dir = tempfile::tempdir().unwrap();
        let (mut monitor, _handle, _events) = fixture(&dir);
        monitor.resolver.init().await.unwrap();

        let events = monitor
            .evaluate(&netflix_observation("Example Movie", 10.0))
            .await
            .unwrap();
        assert!(matches!(events.as_slice(), [DetectionEvent::MovieDetected(_)]));

        // Same sighting, same playback position: nothing to report
        let events = monitor
            .evaluate(&netflix_observation("Example Movie", 10.0))
            .await
            .unwrap();
        assert!(events.is_empty());

        // Position moved: progress only, no second detection
        let events = monitor
            .evaluate(&netflix_observation("Example Movie", 20.0))
            .await
            .unwrap();
        match events.as_slice() {
            [DetectionEvent::ProgressUpdate(context)] => {
                assert_eq!(context.current_time, 20.0);
            }
            other => panic!("expected a progress update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_new_title_is_a_new_detection() {
        let dir = tempfile::tempdir().unwrap();
        let (mut monitor, _handle, _events) = fixture(&dir);
        monitor.resolver.init().await.unwrap();

        monitor
            .evaluate(&netflix_observation("Example Movie", 10.0))
            .await
            .unwrap();
        let events = monitor
            .evaluate(&netflix_observation("Sequel Movie", 0.0))
            .await
            .unwrap();
        match events.as_slice() {
            [DetectionEvent::MovieDetected(context)] => {
                assert_eq!(context.title.as_deref(), Some("Sequel Movie"));
            }
            other => panic!("expected a detection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_movie_lost_when_page_stops_qualifying() {
        let dir = tempfile::tempdir().unwrap();
        let (mut monitor, _handle, _events) = fixture(&dir);
        monitor.resolver.init().await.unwrap();

        monitor
            .evaluate(&netflix_observation("Example Movie", 10.0))
            .await
            .unwrap();

        let browse = PageObservation::new(
            "https://netflix.com/browse",
            "<html><body><p>Rows of posters</p></body></html>",
            vec![],
        );
        let events = monitor.evaluate(&browse).await.unwrap();
        assert_eq!(
            events,
            vec![DetectionEvent::MovieLost {
                url: "https://netflix.com/watch/12345".to_string()
            }]
        );
        assert!(monitor.current().is_none());
    }

    #[tokio::test]
    async fn test_unregistered_domain_yields_no_classification() {
        let dir = tempfile::tempdir().unwrap();
        let (mut monitor, _handle, _events) = fixture(&dir);
        monitor.resolver.init().await.unwrap();

        let observation = PageObservation::new(
            "https://example-stream.tv/watch/42",
            "<html><body><h1>Pilot Episode</h1><video></video></body></html>",
            vec![],
        );
        // No service resolves, so no events; discovery is a separate,
        // explicit follow-up
        let events = monitor.evaluate(&observation).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_auto_learn_registers_then_detects() {
        let dir = tempfile::tempdir().unwrap();
        let (monitor, _handle, _events) = fixture(&dir);
        let mut monitor = monitor.with_auto_learn(true);
        monitor.resolver.init().await.unwrap();

        let observation = PageObservation::new(
            "https://example-stream.tv/watch/42",
            "<html><body><h1>Pilot Episode</h1><video></video></body></html>",
            vec![MediaState::new(0.0, 1500.0)],
        );

        // First pass: nothing detected yet, but the domain is learned
        let events = monitor.evaluate(&observation).await.unwrap();
        assert!(events.is_empty());

        // Second pass: the learned definition now classifies the page
        let events = monitor.evaluate(&observation).await.unwrap();
        match events.as_slice() {
            [DetectionEvent::MovieDetected(context)] => {
                assert_eq!(context.domain, "example-stream.tv");
                assert_eq!(context.title.as_deref(), Some("Pilot Episode"));
            }
            other => panic!("expected a detection, got {:?}", other),
        }
    }

    struct ScriptedSource {
        observation: PageObservation,
        calls: usize,
    }

    #[async_trait(?Send)]
    impl SnapshotSource for ScriptedSource {
        async fn observe(&mut self) -> anyhow::Result<PageObservation> {
            self.calls += 1;
            Ok(self.observation.clone())
        }
    }

    #[tokio::test]
    async fn test_run_emits_events_and_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathManager::rooted_at(dir.path());
        let registry = Arc::new(ServiceRegistry::new(&paths, DiscoveryTuning::default()));
        let (events_tx, mut events_rx) = mpsc::channel(16);

        let config = DetectorConfig {
            poll_interval_ms: 10,
            ..Default::default()
        };
        let (monitor, handle) = PageMonitor::new(registry, &config, events_tx);

        let mut source = ScriptedSource {
            observation: netflix_observation("Example Movie", 10.0),
            calls: 0,
        };

        let shutdown_after_event = async {
            let event = events_rx.recv().await;
            assert!(matches!(event, Some(DetectionEvent::MovieDetected(_))));
            handle.shutdown();
        };

        let (run_result, ()) = tokio::join!(monitor.run(&mut source), shutdown_after_event);
        run_result.unwrap();
        assert!(source.calls >= 1);
    }
}
