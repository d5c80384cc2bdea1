use thiserror::Error;

/// Errors returned by LLM provider backends.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend rejected the request or failed server-side.
    #[error("provider error: {0}")]
    Provider(String),

    /// The backend signaled throttling (HTTP 429).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The response parsed but violated the expected schema or value ranges.
    #[error("validation error for {context}: {reason}")]
    Validation { context: String, reason: String },

    /// The backend refused to answer the request (safety filter).
    #[error("content filtered: {0}")]
    ContentFiltered(String),
}
