use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NotesError>;

/// Errors raised while turning a notes document into grouped JSON.
#[derive(Debug, Error)]
pub enum NotesError {
    /// Input could not be read or output could not be written
    #[error("file access error at {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The extraction service failed (network, authentication, quota, bad response)
    #[error("extraction service error: {0}")]
    Service(String),

    /// A record returned by the service does not have the expected shape
    #[error("malformed extraction record: {0}")]
    DataShape(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("crawler error: {0}")]
    Crawler(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NotesError {
    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        NotesError::FileAccess {
            path: path.into(),
            source,
        }
    }

    pub fn missing_field(field: &str, index: usize) -> Self {
        NotesError::DataShape(format!("extraction {} is missing field '{}'", index, field))
    }
}

impl From<reqwest::Error> for NotesError {
    fn from(err: reqwest::Error) -> Self {
        NotesError::Service(err.to_string())
    }
}
