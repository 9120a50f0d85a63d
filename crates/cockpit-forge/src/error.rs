//! Error types for hosting platform access

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the REST gateways and the run poller
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("remote API returned {status}: {body}")]
    RemoteApi { status: u16, body: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("polling cancelled")]
    Cancelled,

    #[error("run still not completed after {attempts} polls")]
    PollExhausted { attempts: u32 },

    #[error("run still not completed after {elapsed:?}")]
    PollTimeout { elapsed: Duration },
}

impl ForgeError {
    /// Whether the failure came from the remote service rather than from us.
    pub fn is_remote(&self) -> bool {
        matches!(self, ForgeError::RemoteApi { .. } | ForgeError::Transport(_))
    }
}

/// Result type for forge operations
pub type Result<T> = std::result::Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_shows_status_and_body() {
        let err = ForgeError::RemoteApi {
            status: 422,
            body: "{\"message\":\"Validation Failed\"}".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "remote API returned 422: {\"message\":\"Validation Failed\"}"
        );
        assert!(err.is_remote());
    }

    #[test]
    fn poll_bounds_are_not_remote_failures() {
        assert!(!ForgeError::PollExhausted { attempts: 3 }.is_remote());
        assert!(!ForgeError::Cancelled.is_remote());
        assert_eq!(
            ForgeError::PollTimeout {
                elapsed: Duration::from_secs(30)
            }
            .to_string(),
            "run still not completed after 30s"
        );
    }
}
