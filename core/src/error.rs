use thiserror::Error;

/// Opaque failure reported by the remote note service.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct RemoteError(pub String);

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Malformed tree: {0}")]
    MalformedTree(String),

    #[error("Cannot read source {source_name}: {message}")]
    SourceRead { source_name: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Remote call failed: {0}")]
    Remote(#[from] RemoteError),
}

impl Error {
    pub(crate) fn source_read(source_name: &str, message: impl ToString) -> Self {
        Error::SourceRead {
            source_name: source_name.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
