pub mod catalog;
pub mod classifier;
pub mod discovery;
pub mod domain;
pub mod error;
pub mod monitor;
pub mod page;
pub mod resolver;
pub mod session;
pub mod store;

pub use classifier::{format_duration, parse_duration_text, PageClassifier};
pub use discovery::{DiscoveryEngine, DiscoveryMetadata};
pub use error::StoreError;
pub use monitor::{DetectionEvent, MonitorHandle, PageMonitor, SnapshotSource};
pub use page::{MediaState, PageObservation, PageSnapshot};
pub use resolver::DomainResolver;
pub use session::{SessionCoordinator, SessionKey, SessionStore};
pub use store::ServiceRegistry;
