use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observed watch session. Append-only: duplicate sightings create
/// new entries rather than mutating old ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentCacheEntry {
    pub id: String, // service name + title hash + timestamp
    pub domain: String,
    pub title: String,
    pub url: String,
    pub duration: f64, // Seconds; 0 when unknown
    pub current_time: f64,
    pub last_watched: DateTime<Utc>,
    pub watch_count: u32,
}
