use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceRecord {
    pub domain: String, // Normalized (no leading "www.") - primary key
    pub name: String,
    pub category: ServiceCategory,
    #[serde(default)]
    pub patterns: Vec<String>, // URL substrings that mark content pages
    #[serde(default)]
    pub selectors: SelectorSet,
    #[serde(flatten)]
    pub origin: ServiceOrigin,
}

impl ServiceRecord {
    pub fn is_known(&self) -> bool {
        matches!(self.origin, ServiceOrigin::Known { .. })
    }

    /// Discovery confidence in [0, 1]. `None` for catalog records.
    pub fn confidence(&self) -> Option<f64> {
        match self.origin {
            ServiceOrigin::Known { .. } => None,
            ServiceOrigin::Discovered { confidence, .. } => Some(confidence),
        }
    }
}

/// How a service entered the registry. Known records come from the
/// built-in catalog; Discovered records are learned from live pages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ServiceOrigin {
    Known {
        added_date: DateTime<Utc>,
    },
    Discovered {
        first_detected: DateTime<Utc>,
        last_seen: DateTime<Utc>,
        movie_count: u32,
        confidence: f64,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ServiceCategory {
    Premium,
    Free,
    Freemium,
    Anime,
    Unknown,
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceCategory::Premium => "premium",
            ServiceCategory::Free => "free",
            ServiceCategory::Freemium => "freemium",
            ServiceCategory::Anime => "anime",
            ServiceCategory::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// DOM query strings per semantic role. Queries may be comma-separated
/// CSS selector lists, tried as a group.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SelectorSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
}

impl SelectorSet {
    /// Shallow merge: roles present in `other` overwrite this set's.
    pub fn merge_from(&mut self, other: &SelectorSet) {
        if other.title.is_some() {
            self.title = other.title.clone();
        }
        if other.duration.is_some() {
            self.duration = other.duration.clone();
        }
        if other.progress.is_some() {
            self.progress = other.progress.clone();
        }
        if other.video.is_some() {
            self.video = other.video.clone();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.duration.is_none()
            && self.progress.is_none()
            && self.video.is_none()
    }
}
