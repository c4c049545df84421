use scraper::{Html, Selector};
use tracing::debug;

/// Playback state of one media element, as reported by the host.
/// Durations that are NaN or infinite (live/unbounded streams) are
/// normalized to 0, meaning "unknown", not an error.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MediaState {
    pub current_time: f64,
    pub duration: f64,
}

impl MediaState {
    pub fn new(current_time: f64, duration: f64) -> Self {
        Self {
            current_time: if current_time.is_finite() { current_time } else { 0.0 },
            duration: if duration.is_finite() { duration } else { 0.0 },
        }
    }
}

/// Raw page capture handed in by the host on each re-evaluation: the
/// current URL, the serialized DOM, and playback state for any media
/// elements. Plain data, cheap to move between tasks.
#[derive(Debug, Clone, Default)]
pub struct PageObservation {
    pub url: String,
    pub html: String,
    pub media: Vec<MediaState>,
}

impl PageObservation {
    pub fn new(url: impl Into<String>, html: impl Into<String>, media: Vec<MediaState>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            media,
        }
    }
}

/// Parsed view of an observation. Holds the DOM tree, so it is built
/// late and dropped early; it never crosses an await point.
pub struct PageSnapshot {
    document: Html,
    media: Vec<MediaState>,
}

impl PageSnapshot {
    pub fn parse(html: &str, media: Vec<MediaState>) -> Self {
        Self {
            document: Html::parse_document(html),
            media: media
                .into_iter()
                .map(|m| MediaState::new(m.current_time, m.duration))
                .collect(),
        }
    }

    pub fn from_observation(observation: &PageObservation) -> Self {
        Self::parse(&observation.html, observation.media.clone())
    }

    /// Text of the first element matching `selector` with non-empty
    /// content, whitespace-normalized. Selector strings may be
    /// comma-separated lists. An unparseable selector or an empty
    /// result is "signal absent", never an error.
    pub fn query_text(&self, selector: &str) -> Option<String> {
        let parsed = match Selector::parse(selector) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(selector, "Unparseable selector: {:?}", e);
                return None;
            }
        };

        for element in self.document.select(&parsed) {
            let text = element
                .text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            if !text.is_empty() {
                return Some(text);
            }
        }
        None
    }

    pub fn has_element(&self, selector: &str) -> bool {
        match Selector::parse(selector) {
            Ok(parsed) => self.document.select(&parsed).next().is_some(),
            Err(e) => {
                debug!(selector, "Unparseable selector: {:?}", e);
                false
            }
        }
    }

    /// True when the host reported playback state or the DOM itself
    /// contains a `<video>` element.
    pub fn has_media_element(&self) -> bool {
        !self.media.is_empty() || self.has_element("video")
    }

    pub fn media(&self) -> &[MediaState] {
        &self.media
    }

    /// The first media element is assumed to be the main player.
    pub fn first_media(&self) -> Option<MediaState> {
        self.media.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_state_normalizes_non_finite_durations() {
        let live = MediaState::new(12.0, f64::INFINITY);
        assert_eq!(live.duration, 0.0);
        assert_eq!(live.current_time, 12.0);

        let broken = MediaState::new(f64::NAN, f64::NAN);
        assert_eq!(broken.current_time, 0.0);
        assert_eq!(broken.duration, 0.0);
    }

    #[test]
    fn test_query_text_first_non_empty_match() {
        let snapshot = PageSnapshot::parse(
            "<html><body><h1></h1><h1>  Example\n  Movie </h1></body></html>",
            vec![],
        );
        assert_eq!(snapshot.query_text("h1").as_deref(), Some("Example Movie"));
        assert_eq!(snapshot.query_text(".missing"), None);
    }

    #[test]
    fn test_query_text_supports_selector_lists() {
        let snapshot = PageSnapshot::parse(
            "<html><body><div class=\"video-title\">Pilot</div></body></html>",
            vec![],
        );
        assert_eq!(
            snapshot.query_text("[data-uia=\"video-title\"], .video-title, h1").as_deref(),
            Some("Pilot")
        );
    }

    #[test]
    fn test_bad_selector_is_signal_absent() {
        let snapshot = PageSnapshot::parse("<html><body><p>x</p></body></html>", vec![]);
        assert_eq!(snapshot.query_text("p[[["), None);
        assert!(!snapshot.has_element("p[[["));
    }

    #[test]
    fn test_has_media_element_from_dom_or_host_state() {
        let dom_only = PageSnapshot::parse("<html><body><video></video></body></html>", vec![]);
        assert!(dom_only.has_media_element());
        assert_eq!(dom_only.first_media(), None);

        let host_only =
            PageSnapshot::parse("<html><body></body></html>", vec![MediaState::new(5.0, 100.0)]);
        assert!(host_only.has_media_element());
        assert_eq!(host_only.first_media().unwrap().duration, 100.0);

        let neither = PageSnapshot::parse("<html><body></body></html>", vec![]);
        assert!(!neither.has_media_element());
    }
}
