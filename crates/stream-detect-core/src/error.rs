use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the service registry. Classification paths
/// treat lookup failures as "signal absent" and never abort the
/// polling loop; writes the user depends on surface these directly.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store is not open yet")]
    Unavailable,

    #[error("duplicate key '{key}' in {table}")]
    WriteConflict { table: &'static str, key: String },

    #[error("failed to access store file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {table} table")]
    Serialize {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("store bootstrap failed: {0}")]
    InitializationFailure(String),
}
