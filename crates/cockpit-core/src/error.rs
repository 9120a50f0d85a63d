//! Error taxonomy for cockpit core operations.

use std::path::PathBuf;

/// Errors produced by the core components.
#[derive(Debug, thiserror::Error)]
pub enum CockpitError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("version control error: {0}")]
    Vcs(String),

    #[error("push rejected: token is missing the `{scope}` scope; recreate it with `repo` and `{scope}` scopes")]
    Permission { scope: String },

    #[error("push rejected: {0}")]
    PushRejected(String),

    #[error("invalid file pattern: {0}")]
    Pattern(String),

    #[error("completion request failed with status {status}: {body}")]
    Completion { status: u16, body: String },

    #[error("http error: {0}")]
    Http(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CockpitError {
    /// Wrap an io error together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CockpitError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for CockpitError {
    fn from(err: reqwest::Error) -> Self {
        CockpitError::Http(err.to_string())
    }
}

/// Result type for cockpit core operations.
pub type Result<T> = std::result::Result<T, CockpitError>;
