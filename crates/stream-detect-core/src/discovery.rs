use std::sync::Arc;
use stream_detect_config::{DetectorConfig, DiscoveryTuning};
use stream_detect_models::{SelectorSet, ServiceCategory, ServiceRecord};
use tracing::{debug, warn};
use url::Url;

use crate::error::StoreError;
use crate::page::{PageObservation, PageSnapshot};
use crate::store::ServiceRegistry;

/// Path fragments that mark content pages across most streaming sites.
const COMMON_PATH_PATTERNS: [&str; 8] = [
    "/watch/", "/video/", "/movie/", "/series/", "/show/", "/episode/", "/stream/", "/play/",
];

/// Title probes, tried in order; the first element with qualifying text
/// (longer than 3 characters) wins.
const TITLE_CANDIDATES: [&str; 6] = [
    "h1",
    "[data-testid*=\"title\"]",
    ".title",
    ".video-title",
    ".movie-title",
    ".show-title",
];

/// Duration probes; qualifying text must contain a digits:digits shape.
const DURATION_CANDIDATES: [&str; 5] = [
    ".duration",
    ".time-total",
    ".video-duration",
    "[data-testid*=\"duration\"]",
    ".current-time + .separator + .total-time",
];

/// Caller-supplied overrides merged into what the engine derives from
/// the live page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryMetadata {
    pub name: Option<String>,
    pub category: Option<ServiceCategory>,
    pub patterns: Vec<String>,
    pub selectors: SelectorSet,
    pub confidence: Option<f64>,
}

/// Turns repeated sightings of an unregistered domain showing video
/// content into a growing service definition.
pub struct DiscoveryEngine {
    registry: Arc<ServiceRegistry>,
    tuning: DiscoveryTuning,
}

impl DiscoveryEngine {
    pub fn new(registry: Arc<ServiceRegistry>, config: &DetectorConfig) -> Self {
        Self {
            registry,
            tuning: config.discovery.clone(),
        }
    }

    /// Derive URL patterns and selectors from the current page, merge
    /// the caller's hints on top, and fold the result into the
    /// registry. A malformed URL yields `Ok(None)` - nothing to learn.
    pub async fn learn_from_page(
        &self,
        observation: &PageObservation,
        hint: DiscoveryMetadata,
    ) -> Result<Option<ServiceRecord>, StoreError> {
        let Some(domain) = crate::domain::extract_domain(&observation.url) else {
            warn!(url = %observation.url, "Cannot learn from page: malformed URL");
            return Ok(None);
        };

        let mut patterns = url_pattern_candidates(&observation.url);
        for pattern in hint.patterns {
            if !patterns.contains(&pattern) {
                patterns.push(pattern);
            }
        }

        let mut selectors = {
            let snapshot = PageSnapshot::from_observation(observation);
            probe_selectors(&snapshot)
        };
        // Hints are explicit caller knowledge and win over probes
        selectors.merge_from(&hint.selectors);

        let metadata = DiscoveryMetadata {
            name: hint.name,
            category: hint.category,
            patterns,
            selectors,
            confidence: Some(hint.confidence.unwrap_or(self.tuning.seed_confidence)),
        };

        debug!(domain = %domain, "Learning service from page");
        let record = self.registry.record_discovery(&domain, metadata).await?;
        Ok(Some(record))
    }
}

/// Scan the URL for known-good content-page shapes: the common path
/// fragments, a `/v/<token>` path, and a `v=` query parameter.
pub fn url_pattern_candidates(url: &str) -> Vec<String> {
    let Ok(parsed) = Url::parse(url) else {
        return Vec::new();
    };
    let path = parsed.path();

    let mut patterns: Vec<String> = COMMON_PATH_PATTERNS
        .iter()
        .filter(|fragment| path.contains(*fragment))
        .map(|fragment| fragment.to_string())
        .collect();

    if has_video_id_segment(path) && !patterns.contains(&"/v/".to_string()) {
        patterns.push("/v/".to_string());
    }
    if parsed.query().is_some_and(|q| q.contains("v=")) {
        patterns.push("/watch?v=".to_string());
    }
    patterns
}

/// `/v/` immediately followed by a token character.
fn has_video_id_segment(path: &str) -> bool {
    path.match_indices("/v/").any(|(idx, _)| {
        path[idx + 3..]
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
    })
}

/// Probe the page with fixed candidate lists; first qualifying element
/// wins per role.
pub fn probe_selectors(snapshot: &PageSnapshot) -> SelectorSet {
    let mut selectors = SelectorSet::default();

    for candidate in TITLE_CANDIDATES {
        if snapshot
            .query_text(candidate)
            .is_some_and(|text| text.len() > 3)
        {
            selectors.title = Some(candidate.to_string());
            break;
        }
    }

    for candidate in DURATION_CANDIDATES {
        if snapshot
            .query_text(candidate)
            .is_some_and(|text| looks_like_timestamp(&text))
        {
            selectors.duration = Some(candidate.to_string());
            break;
        }
    }

    if snapshot.has_media_element() {
        selectors.video = Some("video".to_string());
    }

    selectors
}

fn looks_like_timestamp(text: &str) -> bool {
    text.as_bytes()
        .windows(3)
        .any(|w| w[0].is_ascii_digit() && w[1] == b':' && w[2].is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stream_detect_config::PathManager;
    use stream_detect_models::ServiceOrigin;

    fn engine_at(dir: &tempfile::TempDir) -> DiscoveryEngine {
        let paths = PathManager::rooted_at(dir.path());
        let registry = Arc::new(ServiceRegistry::new(&paths, DiscoveryTuning::default()));
        DiscoveryEngine::new(registry, &DetectorConfig::default())
    }

    #[test]
    fn test_url_pattern_candidates_path_fragments() {
        assert_eq!(
            url_pattern_candidates("https://example-stream.tv/watch/42"),
            vec!["/watch/"]
        );
        assert_eq!(
            url_pattern_candidates("https://site.tv/show/1/episode/2"),
            vec!["/show/", "/episode/"]
        );
        assert!(url_pattern_candidates("https://site.tv/about").is_empty());
    }

    #[test]
    fn test_url_pattern_candidates_special_shapes() {
        assert_eq!(
            url_pattern_candidates("https://site.tv/v/abc123"),
            vec!["/v/"]
        );
        // Bare "/v/" with no token does not qualify
        assert!(url_pattern_candidates("https://site.tv/v/").is_empty());
        assert_eq!(
            url_pattern_candidates("https://youtube.com/watch?v=dQw4w9WgXcQ"),
            vec!["/watch?v="]
        );
        assert!(url_pattern_candidates("not a url").is_empty());
    }

    #[test]
    fn test_probe_selectors_first_qualifying_wins() {
        let snapshot = PageSnapshot::parse(
            "<html><body>\
             <h1>Hi</h1>\
             <div class=\"title\">Pilot Episode</div>\
             <span class=\"duration\">42:10</span>\
             <video></video>\
             </body></html>",
            vec![],
        );

        let selectors = probe_selectors(&snapshot);
        // h1 text "Hi" is too short to qualify; .title wins
        assert_eq!(selectors.title.as_deref(), Some(".title"));
        assert_eq!(selectors.duration.as_deref(), Some(".duration"));
        assert_eq!(selectors.video.as_deref(), Some("video"));
    }

    #[test]
    fn test_probe_selectors_requires_timestamp_shape() {
        let snapshot = PageSnapshot::parse(
            "<html><body><span class=\"duration\">two hours</span></body></html>",
            vec![],
        );
        assert!(probe_selectors(&snapshot).duration.is_none());
    }

    #[tokio::test]
    async fn test_learn_twice_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_at(&dir);

        let observation = PageObservation::new(
            "https://example-stream.tv/watch/42",
            "<html><body><h1>Pilot Episode</h1><video></video></body></html>",
            vec![],
        );

        engine
            .learn_from_page(&observation, DiscoveryMetadata::default())
            .await
            .unwrap()
            .unwrap();
        let record = engine
            .learn_from_page(&observation, DiscoveryMetadata::default())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(record.domain, "example-stream.tv");
        assert_eq!(record.name, "Example Stream");
        assert_eq!(record.patterns, vec!["/watch/"]);
        assert_eq!(record.selectors.title.as_deref(), Some("h1"));
        assert_eq!(record.selectors.video.as_deref(), Some("video"));
        match record.origin {
            ServiceOrigin::Discovered {
                movie_count,
                confidence,
                ..
            } => {
                assert_eq!(movie_count, 2);
                assert!((confidence - 0.8).abs() < 1e-9);
            }
            ServiceOrigin::Known { .. } => panic!("expected a discovered record"),
        }
    }

    #[tokio::test]
    async fn test_hints_override_derived_selectors() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_at(&dir);

        let observation = PageObservation::new(
            "https://example-stream.tv/watch/42",
            "<html><body><h1>Pilot Episode</h1></body></html>",
            vec![],
        );

        let record = engine
            .learn_from_page(
                &observation,
                DiscoveryMetadata {
                    name: Some("Example+".to_string()),
                    category: Some(ServiceCategory::Freemium),
                    selectors: SelectorSet {
                        title: Some(".player-title".to_string()),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(record.name, "Example+");
        assert_eq!(record.category, ServiceCategory::Freemium);
        assert_eq!(record.selectors.title.as_deref(), Some(".player-title"));
    }

    #[tokio::test]
    async fn test_malformed_url_learns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_at(&dir);

        let observation = PageObservation::new("not a url", "<html></html>", vec![]);
        assert!(engine
            .learn_from_page(&observation, DiscoveryMetadata::default())
            .await
            .unwrap()
            .is_none());
    }
}
