use thiserror::Error;

/// Errors returned by the bundling relay client.
#[derive(Debug, Error)]
pub enum RelayClientError {
    /// The relay returned a non-success status code.
    #[error("relay returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated for display.
        body: String,
    },
    /// The relay response could not be decoded.
    #[error("invalid relay response: {0}")]
    Decode(#[from] serde_json::Error),
    /// HTTP transport error.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// The referenced bundle is unknown to the relay.
    #[error("unknown bundle {0}")]
    UnknownBundle(String),
}
