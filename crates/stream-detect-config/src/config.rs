use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// All tunable detection constants. Every field has a serde default so
/// a partial (or missing) config file yields a working setup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectorConfig {
    /// Maximum age of a cached domain verdict before it must be
    /// revalidated against the registry.
    #[serde(default = "default_freshness_window_ms")]
    pub freshness_window_ms: u64,

    /// How often the host should re-evaluate the page.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long the "movie detected" overlay stays visible.
    #[serde(default = "default_overlay_duration_ms")]
    pub overlay_duration_ms: u64,

    /// Watch entries older than this are eligible for purge.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    #[serde(default)]
    pub scoring: ScoreWeights,

    #[serde(default)]
    pub discovery: DiscoveryTuning,
}

/// Additive confidence weights for page classification. Heuristic
/// signals for UI emphasis and discovery gating, not probabilities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreWeights {
    /// URL contains one of the service's registered patterns.
    #[serde(default = "default_pattern_weight")]
    pub pattern_match: f64,

    /// At least one media element is present on the page.
    #[serde(default = "default_video_weight")]
    pub video_present: f64,

    /// Title resolved via the service's own title selector.
    #[serde(default = "default_service_title_weight")]
    pub service_title: f64,

    /// Title resolved via the generic fallback selector list.
    #[serde(default = "default_generic_title_weight")]
    pub generic_title: f64,

    /// Duration resolved from the service's duration selector.
    #[serde(default = "default_duration_weight")]
    pub duration_text: f64,

    /// Accumulated confidence must exceed this to count as a movie page.
    #[serde(default = "default_movie_threshold")]
    pub movie_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryTuning {
    /// Initial confidence for a freshly learned service.
    #[serde(default = "default_seed_confidence")]
    pub seed_confidence: f64,

    /// Confidence gained per repeat sighting, saturating at 1.0.
    #[serde(default = "default_repeat_increment")]
    pub repeat_increment: f64,

    /// Discovered records below this confidence may be purged once stale.
    #[serde(default = "default_purge_floor")]
    pub purge_floor: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            freshness_window_ms: default_freshness_window_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            overlay_duration_ms: default_overlay_duration_ms(),
            retention_days: default_retention_days(),
            scoring: ScoreWeights::default(),
            discovery: DiscoveryTuning::default(),
        }
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            pattern_match: default_pattern_weight(),
            video_present: default_video_weight(),
            service_title: default_service_title_weight(),
            generic_title: default_generic_title_weight(),
            duration_text: default_duration_weight(),
            movie_threshold: default_movie_threshold(),
        }
    }
}

impl Default for DiscoveryTuning {
    fn default() -> Self {
        Self {
            seed_confidence: default_seed_confidence(),
            repeat_increment: default_repeat_increment(),
            purge_floor: default_purge_floor(),
        }
    }
}

impl DetectorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

fn default_freshness_window_ms() -> u64 {
    300_000 // 5 minutes
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

fn default_overlay_duration_ms() -> u64 {
    5_000
}

fn default_retention_days() -> i64 {
    90
}

fn default_pattern_weight() -> f64 {
    0.4
}

fn default_video_weight() -> f64 {
    0.3
}

fn default_service_title_weight() -> f64 {
    0.2
}

fn default_generic_title_weight() -> f64 {
    0.1
}

fn default_duration_weight() -> f64 {
    0.1
}

fn default_movie_threshold() -> f64 {
    0.3
}

fn default_seed_confidence() -> f64 {
    0.7
}

fn default_repeat_increment() -> f64 {
    0.1
}

fn default_purge_floor() -> f64 {
    0.3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_constants() {
        let config = DetectorConfig::default();
        assert_eq!(config.freshness_window_ms, 300_000);
        assert_eq!(config.poll_interval_ms, 3_000);
        assert_eq!(config.retention_days, 90);
        assert_eq!(config.scoring.pattern_match, 0.4);
        assert_eq!(config.scoring.movie_threshold, 0.3);
        assert_eq!(config.discovery.seed_confidence, 0.7);
        assert_eq!(config.discovery.repeat_increment, 0.1);
        assert_eq!(config.discovery.purge_floor, 0.3);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "poll_interval_ms = 1000\n[scoring]\npattern_match = 0.5\n")
            .unwrap();

        let config = DetectorConfig::load(&path).unwrap();
        assert_eq!(config.poll_interval_ms, 1_000);
        assert_eq!(config.scoring.pattern_match, 0.5);
        // Untouched fields keep their defaults
        assert_eq!(config.scoring.video_present, 0.3);
        assert_eq!(config.freshness_window_ms, 300_000);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = DetectorConfig::load_or_default(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, DetectorConfig::default());
    }
}
