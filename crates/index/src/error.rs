use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vector index request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("vector index request timed out: {0}")]
    Timeout(String),

    #[error("vector index API error: {status}: {body}")]
    Api { status: u16, body: String },

    #[error("collection '{0}' does not exist")]
    CollectionNotFound(String),

    #[error("collection '{0}' already exists")]
    AlreadyExists(String),

    #[error("vector dimension mismatch for collection '{collection}': expected {expected}, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    #[error("collection '{collection}' could not be prepared: {reason}")]
    Lifecycle { collection: String, reason: String },

    #[error("failed to parse vector index response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for IndexError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            IndexError::Timeout(err.to_string())
        } else {
            IndexError::Http(err)
        }
    }
}
