pub mod content;
pub mod context;
pub mod export;
pub mod preference;
pub mod service;
pub mod stats;

pub use content::ContentCacheEntry;
pub use context::MovieContext;
pub use export::{ExportSnapshot, ServiceList};
pub use preference::UserPreference;
pub use service::{SelectorSet, ServiceCategory, ServiceOrigin, ServiceRecord};
pub use stats::ServiceUsage;
