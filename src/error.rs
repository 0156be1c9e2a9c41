//! Error types for the coin feed

use thiserror::Error;

/// Errors that can occur when fetching the market list from a source
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport failed: no usable response was received
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// A response arrived but its status indicates failure
    #[error("Provider API error: HTTP {status}: {body}")]
    ApiError { status: u16, body: String },

    /// The response body is not a JSON array of coins
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Creates an ApiError
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            body: body.into(),
        }
    }

    /// Creates an InvalidResponse error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// True when no response was received at all
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::NetworkError(_))
    }

    /// True when the source answered with HTTP 429
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::ApiError { status: 429, .. })
    }
}
