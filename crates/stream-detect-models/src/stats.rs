use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::service::ServiceCategory;

/// Per-service usage rollup. Every registered service appears, even
/// with zero watches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceUsage {
    pub domain: String,
    pub name: String,
    pub category: ServiceCategory,
    pub content_count: usize,
    pub total_watch_time: f64, // Seconds
    pub last_used: Option<DateTime<Utc>>,
}
