pub mod config;
pub mod paths;

pub use config::{DetectorConfig, DiscoveryTuning, ScoreWeights};
pub use paths::{container_base_path, PathManager};
