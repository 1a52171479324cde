use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize collection: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Only raised under `RecoveryPolicy::Strict`.
    #[error("collection at {location} is unreadable: {reason}")]
    Corrupt { location: String, reason: String },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to read document {path:?}: {source}")]
    DocumentRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse document {path:?}: {source}")]
    DocumentParse {
        path: PathBuf,
        source: lopdf::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}
