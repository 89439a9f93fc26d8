//! Error types.
//!
//! Transport faults on the push side are not errors: they surface as a
//! [`CloseReason`](crate::source::CloseReason) in the connection status and are
//! recovered by failing over to polling.

use thiserror::Error;

/// Errors from one poll of the state endpoint.
///
/// The poll cadence acts as the retry, so these are logged and dropped.
#[derive(Debug, Error)]
pub enum PollError {
    /// The endpoint answered with a non-success status.
    #[error("state endpoint returned status {0}")]
    Status(u16),

    /// The response body was not a state snapshot.
    #[error("failed to decode state: {0}")]
    Decode(String),

    /// Could not reach the endpoint.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for the response.
    #[error("request timed out")]
    Timeout,

    /// Any other HTTP client failure.
    #[error("HTTP request failed: {0}")]
    Http(String),
}

impl From<reqwest::Error> for PollError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PollError::Timeout
        } else if err.is_connect() {
            PollError::Connection(err.to_string())
        } else if err.is_decode() {
            PollError::Decode(err.to_string())
        } else {
            PollError::Http(err.to_string())
        }
    }
}

/// Invalid console settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reconnect schedule must contain at least one delay")]
    EmptyReconnectSchedule,

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("stale threshold must be at least 250ms")]
    StaleTooShort,

    #[error("{name} warning threshold exceeds its critical threshold")]
    ThresholdOrder { name: &'static str },

    #[error("invalid base URL '{0}': expected http:// or https://")]
    BaseUrl(String),

    #[error("invalid duration '{value}': {reason}")]
    Duration { value: String, reason: String },
}
