//! Failure taxonomy for display fetches.
//!
//! Everything the fetcher can run into ends up as one of these variants;
//! the render layer turns them into operator-facing error screens.

use thiserror::Error;

/// Errors produced while fetching the display snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    /// The device key is not bound to any display.
    #[error(
        "No display found for device key \"{device_key}\". \
         Create a display in the dashboard and assign this device key to it."
    )]
    NotFound { device_key: String },

    /// The API could not be reached at all (connect failure, timeout).
    #[error("Cannot reach the signage server: {0}")]
    Unreachable(String),

    /// The API answered with a non-success status.
    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },

    /// The API answered 200 but the body was not a usable display.
    #[error("Malformed display response: {0}")]
    Malformed(String),
}

/// What the fetcher should do after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Arm the exponential backoff retry timer.
    Backoff,
    /// Wait for the next poll or an operator retry.
    None,
}

impl PlayerError {
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            PlayerError::Unreachable(_) => RetryPolicy::Backoff,
            _ => RetryPolicy::None,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            PlayerError::NotFound { .. } => Some(404),
            PlayerError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_key_and_instructs_creation() {
        let err = PlayerError::NotFound {
            device_key: "abc123".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("Create a display"));
        assert_eq!(err.retry_policy(), RetryPolicy::None);
    }

    #[test]
    fn only_unreachable_backs_off() {
        assert_eq!(
            PlayerError::Unreachable("refused".into()).retry_policy(),
            RetryPolicy::Backoff
        );
        assert_eq!(
            PlayerError::Server {
                status: 500,
                message: "boom".into()
            }
            .retry_policy(),
            RetryPolicy::None
        );
        assert_eq!(
            PlayerError::Malformed("x".into()).retry_policy(),
            RetryPolicy::None
        );
    }
}
