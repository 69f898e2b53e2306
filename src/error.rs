use std::path::PathBuf;

use thiserror::Error;

/// Persistence failures. Everything else in the crate reports expected
/// absence through `Option`/`bool`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to open database: {0}")]
    OpenFailed(String),

    #[error("failed to execute SQL: {0}")]
    ExecuteFailed(String),

    #[error("failed to query database: {0}")]
    QueryFailed(String),

    #[error("background writer is not running")]
    WriterStopped,
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StoreError::Json {
            path: path.into(),
            source,
        }
    }
}

/// Rejections raised while turning configuration into crate definitions.
#[derive(Debug, Error)]
pub enum CrateError {
    #[error("invalid crate id '{0}': only lowercase letters, digits and underscores are allowed")]
    InvalidId(String),

    #[error("invalid crate config '{id}': {}", problems.join("; "))]
    InvalidConfig { id: String, problems: Vec<String> },

    #[error("crate '{0}' already exists")]
    Duplicate(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnimationError {
    #[error("crate '{0}' has no rewards to reveal")]
    EmptyRewardTable(String),
}
