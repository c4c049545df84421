use stream_detect_config::{DetectorConfig, ScoreWeights};
use stream_detect_models::{MovieContext, ServiceRecord};
use tracing::trace;

use crate::error::StoreError;
use crate::page::{PageObservation, PageSnapshot};
use crate::resolver::DomainResolver;

/// Fallback title queries, tried in order when the service's own title
/// selector yields nothing.
pub const GENERIC_TITLE_SELECTORS: [&str; 6] = [
    "h1",
    "[data-testid*=\"title\"]",
    ".title",
    ".video-title",
    ".movie-title",
    ".show-title",
];

/// Scores a page observation against a resolved service record.
/// Signals are additive: URL pattern, media element presence, title,
/// and duration each contribute their configured weight, and the page
/// counts as movie content only when the accumulated confidence clears
/// the threshold.
pub struct PageClassifier {
    weights: ScoreWeights,
}

impl PageClassifier {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            weights: config.scoring.clone(),
        }
    }

    /// Full detection path: resolve the domain to a service, then
    /// classify. An unresolved domain yields `Ok(None)` - no
    /// classification is attempted, and discovery is a separate,
    /// explicit follow-up.
    pub async fn detect(
        &self,
        resolver: &mut DomainResolver,
        observation: &PageObservation,
    ) -> Result<Option<MovieContext>, StoreError> {
        let Some(service) = resolver.service_info(&observation.url).await? else {
            return Ok(None);
        };
        Ok(self.classify(&service, observation))
    }

    /// Score an observation against a known service. Returns `None`
    /// (absence, not a zero-confidence record) when the page does not
    /// qualify.
    pub fn classify(
        &self,
        service: &ServiceRecord,
        observation: &PageObservation,
    ) -> Option<MovieContext> {
        let snapshot = PageSnapshot::from_observation(observation);
        self.classify_snapshot(service, &observation.url, &snapshot)
    }

    pub fn classify_snapshot(
        &self,
        service: &ServiceRecord,
        url: &str,
        snapshot: &PageSnapshot,
    ) -> Option<MovieContext> {
        let mut context = MovieContext {
            url: url.to_string(),
            domain: service.domain.clone(),
            service_name: service.name.clone(),
            category: service.category,
            title: None,
            is_movie_page: false,
            confidence: 0.0,
            current_time: 0.0,
            duration: 0.0,
        };

        if service.patterns.iter().any(|p| url.contains(p.as_str())) {
            context.is_movie_page = true;
            context.confidence += self.weights.pattern_match;
        }

        if snapshot.has_media_element() {
            context.is_movie_page = true;
            context.confidence += self.weights.video_present;
            if let Some(media) = snapshot.first_media() {
                context.current_time = media.current_time;
                context.duration = media.duration;
            }
        }

        if let Some(selector) = service.selectors.title.as_deref() {
            if let Some(title) = snapshot.query_text(selector) {
                context.title = Some(title);
                context.confidence += self.weights.service_title;
                context.is_movie_page = true;
            }
        }

        if context.title.is_none() {
            for selector in GENERIC_TITLE_SELECTORS {
                if let Some(title) = snapshot.query_text(selector) {
                    context.title = Some(title);
                    context.confidence += self.weights.generic_title;
                    // A visible title strongly suggests a content page
                    context.is_movie_page = true;
                    break;
                }
            }
        }

        // Only consult the duration selector if the media element did
        // not already provide one
        if context.duration == 0.0 {
            if let Some(selector) = service.selectors.duration.as_deref() {
                if let Some(text) = snapshot.query_text(selector) {
                    let seconds = parse_duration_text(&text);
                    if seconds > 0.0 {
                        context.duration = seconds;
                        context.confidence += self.weights.duration_text;
                        context.is_movie_page = true;
                    }
                }
            }
        }

        trace!(
            url,
            confidence = context.confidence,
            is_movie_page = context.is_movie_page,
            title = ?context.title,
            "Page scored"
        );

        if context.is_movie_page && context.confidence > self.weights.movie_threshold {
            Some(context)
        } else {
            None
        }
    }
}

/// Parse on-screen duration text. Accepts `H:MM:SS`, `MM:SS`, or a
/// bare number, which is interpreted as minutes by convention. Anything
/// else parses to 0 (unknown).
pub fn parse_duration_text(text: &str) -> f64 {
    let parts: Vec<&str> = text.trim().split(':').collect();
    let numbers: Option<Vec<f64>> = parts
        .iter()
        .map(|p| p.trim().parse::<f64>().ok().filter(|n| *n >= 0.0))
        .collect();

    match numbers.as_deref() {
        Some([h, m, s]) => h * 3600.0 + m * 60.0 + s,
        Some([m, s]) => m * 60.0 + s,
        Some([minutes]) => minutes * 60.0,
        _ => 0.0,
    }
}

/// Render seconds as `H:MM:SS` or `M:SS`; unknown durations show as
/// "N/A".
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "N/A".to_string();
    }
    let total = seconds as u64;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stream_detect_models::{SelectorSet, ServiceCategory, ServiceOrigin};

    use crate::page::MediaState;

    fn netflix() -> ServiceRecord {
        ServiceRecord {
            domain: "netflix.com".to_string(),
            name: "Netflix".to_string(),
            category: ServiceCategory::Premium,
            patterns: vec!["/watch/".to_string(), "/title/".to_string()],
            selectors: SelectorSet {
                title: Some("[data-uia=\"video-title\"], .video-title, h1".to_string()),
                duration: Some("[data-uia=\"video-duration\"]".to_string()),
                progress: None,
                video: None,
            },
            origin: ServiceOrigin::Known {
                added_date: Utc::now(),
            },
        }
    }

    fn classifier() -> PageClassifier {
        PageClassifier::new(&stream_detect_config::DetectorConfig::default())
    }

    #[test]
    fn test_full_signal_page_scores_high() {
        let observation = PageObservation::new(
            "https://netflix.com/watch/12345",
            "<html><body><h1 data-uia=\"video-title\">Example Movie</h1><video></video></body></html>",
            vec![MediaState::new(10.0, 3600.0)],
        );

        let context = classifier().classify(&netflix(), &observation).unwrap();
        assert!(context.is_movie_page);
        // pattern 0.4 + video 0.3 + service title 0.2
        assert!((context.confidence - 0.9).abs() < 1e-9);
        assert_eq!(context.title.as_deref(), Some("Example Movie"));
        assert_eq!(context.duration, 3600.0);
        assert_eq!(context.current_time, 10.0);
    }

    #[test]
    fn test_generic_title_fallback_scores_lower() {
        let mut service = netflix();
        service.selectors.title = None;

        let observation = PageObservation::new(
            "https://netflix.com/watch/12345",
            "<html><body><h1>Example Movie</h1></body></html>",
            vec![],
        );

        let context = classifier().classify(&service, &observation).unwrap();
        // pattern 0.4 + generic title 0.1
        assert!((context.confidence - 0.5).abs() < 1e-9);
        assert_eq!(context.title.as_deref(), Some("Example Movie"));
    }

    #[test]
    fn test_below_threshold_yields_none() {
        // No pattern match, no media, no title: nothing to score
        let observation = PageObservation::new(
            "https://netflix.com/browse",
            "<html><body><p>Browse our catalog</p></body></html>",
            vec![],
        );
        assert!(classifier().classify(&netflix(), &observation).is_none());
    }

    #[test]
    fn test_video_alone_does_not_clear_threshold() {
        // 0.3 is not strictly greater than the 0.3 threshold
        let observation = PageObservation::new(
            "https://netflix.com/browse",
            "<html><body><video></video></body></html>",
            vec![],
        );
        assert!(classifier().classify(&netflix(), &observation).is_none());
    }

    #[test]
    fn test_duration_selector_used_when_media_has_none() {
        let observation = PageObservation::new(
            "https://netflix.com/watch/99",
            "<html><body><span data-uia=\"video-duration\">1:02:03</span></body></html>",
            vec![],
        );

        let context = classifier().classify(&netflix(), &observation).unwrap();
        assert_eq!(context.duration, 3723.0);
        // pattern 0.4 + duration 0.1
        assert!((context.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_duration_selector_skipped_when_media_reports_duration() {
        let observation = PageObservation::new(
            "https://netflix.com/watch/99",
            "<html><body><span data-uia=\"video-duration\">1:02:03</span><video></video></body></html>",
            vec![MediaState::new(0.0, 1800.0)],
        );

        let context = classifier().classify(&netflix(), &observation).unwrap();
        assert_eq!(context.duration, 1800.0);
    }

    #[test]
    fn test_live_stream_duration_is_unknown_not_error() {
        let observation = PageObservation::new(
            "https://netflix.com/watch/99",
            "<html><body><h1 data-uia=\"video-title\">Live Event</h1></body></html>",
            vec![MediaState::new(42.0, f64::INFINITY)],
        );

        let context = classifier().classify(&netflix(), &observation).unwrap();
        assert_eq!(context.duration, 0.0);
        assert_eq!(context.current_time, 42.0);
    }

    #[test]
    fn test_parse_duration_text_formats() {
        assert_eq!(parse_duration_text("1:02:03"), 3723.0);
        assert_eq!(parse_duration_text("5:30"), 330.0);
        // Bare numbers are minutes, not seconds
        assert_eq!(parse_duration_text("10"), 600.0);
        assert_eq!(parse_duration_text("  2:00  "), 120.0);
        assert_eq!(parse_duration_text("soon"), 0.0);
        assert_eq!(parse_duration_text(""), 0.0);
        assert_eq!(parse_duration_text("1:2:3:4"), 0.0);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(3723.0), "1:02:03");
        assert_eq!(format_duration(330.0), "5:30");
        assert_eq!(format_duration(0.0), "N/A");
        assert_eq!(format_duration(f64::NAN), "N/A");
    }
}
