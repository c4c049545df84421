use serde::{Deserialize, Serialize};

use crate::service::ServiceCategory;

/// Live classification result for the current page. Ephemeral: rebuilt
/// on every re-evaluation, never persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieContext {
    pub url: String,
    pub domain: String,
    pub service_name: String,
    pub category: ServiceCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub is_movie_page: bool,
    pub confidence: f64,
    pub current_time: f64,
    pub duration: f64,
}

impl MovieContext {
    /// Same logical sighting: URL and title both unchanged.
    pub fn same_sighting(&self, other: &MovieContext) -> bool {
        self.url == other.url && self.title == other.title
    }
}
