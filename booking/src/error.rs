//! Error types for the booking flow.

use marquee_runtime::StoreError;
use thiserror::Error;

/// Errors returned by a [`BookingApi`](crate::api::BookingApi)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never got a response (connection refused, DNS, TLS, ...)
    #[error("Request failed: {0}")]
    Transport(String),

    /// The request did not finish within the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// The resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The bearer token was missing or refused
    #[error("Unauthorized")]
    Unauthorized,

    /// The server refused the request and said why
    ///
    /// `message` is the `message` field of the error body when the server
    /// sent one, which is what the customer should see.
    #[error("{message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Human-readable reason from the server
        message: String,
    },

    /// The response body did not match the expected shape
    #[error("Response parsing failed: {0}")]
    Decode(String),
}

impl ApiError {
    /// Message suitable for a toast
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } => message.clone(),
            Self::NotFound(_) => "This showtime is no longer available".to_string(),
            Self::Unauthorized => "Please sign in to continue".to_string(),
            Self::Transport(_) | Self::Timeout => {
                "Could not reach the server, please try again".to_string()
            },
            Self::Decode(_) => "The server sent an unexpected response".to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Errors reading or writing booking snapshots
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Filesystem failure
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded or decoded
    #[error("Snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A flat booking record that does not describe any wizard step
///
/// Returned when a patch or a restored snapshot would, for example, put
/// seats on a booking that has no showtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Inconsistent booking: {0}")]
pub struct InvalidBookingData(pub String);

/// Invalid configuration value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid value {value:?} for {variable}: {reason}")]
pub struct ConfigError {
    /// Environment variable name
    pub variable: &'static str,
    /// Offending value
    pub value: String,
    /// What was wrong with it
    pub reason: String,
}

/// Errors surfaced by [`BookingFlow`](crate::flow::BookingFlow)
#[derive(Debug, Error)]
pub enum FlowError {
    /// The underlying store refused the action or timed out waiting for a reply
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The persisted booking could not be read
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// The step ended in a failure the customer has been told about
    #[error("{0}")]
    Rejected(String),
}
