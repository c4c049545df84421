use serde::{Deserialize, Serialize};

use crate::content::ContentCacheEntry;
use crate::preference::UserPreference;
use crate::service::ServiceRecord;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceList {
    pub known: Vec<ServiceRecord>,
    pub discovered: Vec<ServiceRecord>,
    pub total: usize,
}

/// Full read-only dump of the registry for backup/analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportSnapshot {
    pub timestamp: String, // ISO-8601
    pub version: u32,
    pub services: ServiceList,
    pub content: Vec<ContentCacheEntry>,
    pub preferences: Vec<UserPreference>,
}
