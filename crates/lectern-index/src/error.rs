//! Error types for lectern-index.

/// Errors raised by index backends.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Transport failure talking to the index service.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success HTTP status.
    #[error("index returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The GraphQL endpoint answered with an `errors` array.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// Some objects of a batch write were rejected.
    #[error("{failed} of {total} objects rejected: {first}")]
    BatchRejected {
        failed: usize,
        total: usize,
        first: String,
    },

    /// The chunk class has not been created (or was dropped).
    #[error("class {0} does not exist")]
    MissingClass(String),

    /// Still throttled after all retries.
    #[error("rate limited")]
    RateLimited,

    #[error("{0}")]
    Other(String),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
