//! Error types for sibyl-llm

use thiserror::Error;

/// LLM error type
#[derive(Debug, Error)]
pub enum Error {
    /// Client not configured
    #[error("client not configured: {0}")]
    NotConfigured(String),

    /// Upstream API error (5xx-equivalent)
    #[error("api error: {0}")]
    Api(String),

    /// Rate limit exceeded
    #[error("rate limit exceeded")]
    RateLimited,

    /// Response could not be decoded or is missing expected content
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Request exceeded its deadline
    #[error("timeout after {0}ms")]
    Timeout(u64),
}

impl Error {
    /// Whether a failed call is worth retrying.
    ///
    /// Timeouts, rate limits, network failures, and malformed-but-retryable
    /// output are transient; a misconfigured client is not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_)
                | Error::RateLimited
                | Error::Network(_)
                | Error::Api(_)
                | Error::InvalidResponse(_)
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::Timeout(5000).is_transient());
        assert!(Error::RateLimited.is_transient());
        assert!(Error::Network("reset".into()).is_transient());
        assert!(Error::InvalidResponse("truncated json".into()).is_transient());
        assert!(!Error::NotConfigured("missing api key".into()).is_transient());
    }
}
