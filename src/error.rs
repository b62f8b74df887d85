//! Error types for meshgen

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// meshgen errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("node names '{first}' and '{second}' both sanitize to '{sanitized}'")]
    NameCollision {
        first: String,
        second: String,
        sanitized: String,
    },

    #[error("link id {id} is declared more than once")]
    DuplicateLinkId { id: u64 },

    #[error("invalid catalog: {message}")]
    InvalidCatalog { message: String },
}

impl Error {
    pub fn invalid_catalog(message: impl Into<String>) -> Self {
        Error::InvalidCatalog {
            message: message.into(),
        }
    }
}
