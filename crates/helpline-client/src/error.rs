//! Error types for gateway and session operations.

use thiserror::Error;

/// A result type using `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while talking to the HelplineOS API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be sent or the response could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Api {
        /// HTTP status code.
        status: u16,
        /// The server-provided `detail` text, if any.
        detail: Option<String>,
    },

    /// The API rejected the session credentials. The session has been cleared.
    #[error("session expired or invalid")]
    Unauthorized {
        /// The server-provided `detail` text, if any.
        detail: Option<String>,
    },

    /// An authenticated request was attempted without a session.
    #[error("not logged in")]
    NotAuthenticated,

    /// The response body did not have the expected shape.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Reading or writing the persisted session failed.
    #[error("session storage error: {0}")]
    SessionStore(String),

    /// The client configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// HTTP status code, for errors that carry one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Unauthorized { .. } => Some(401),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` if the session was rejected or is missing.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::NotAuthenticated)
    }

    /// Returns `true` if the API reported that the resource does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }

    /// Text to show the user: the server detail when present, else `fallback`.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Api {
                detail: Some(detail),
                ..
            } => detail.clone(),
            Self::Unauthorized { .. } | Self::NotAuthenticated => {
                "Your session has expired. Please log in again.".to_string()
            }
            _ => fallback.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_prefers_server_detail() {
        let err = ClientError::Api {
            status: 400,
            detail: Some("Contact with this phone number already exists".into()),
        };
        assert_eq!(
            err.user_message("Failed to create contact"),
            "Contact with this phone number already exists"
        );
    }

    #[test]
    fn user_message_falls_back() {
        let err = ClientError::Api {
            status: 500,
            detail: None,
        };
        assert_eq!(err.user_message("Failed to log call"), "Failed to log call");
        assert_eq!(
            ClientError::Parse("eof".into()).user_message("Failed to log call"),
            "Failed to log call"
        );
    }

    #[test]
    fn status_codes() {
        assert_eq!(ClientError::Unauthorized { detail: None }.status(), Some(401));
        assert_eq!(
            ClientError::Api {
                status: 404,
                detail: None
            }
            .status(),
            Some(404)
        );
        assert_eq!(ClientError::NotAuthenticated.status(), None);
    }

    #[test]
    fn classification() {
        assert!(ClientError::NotAuthenticated.is_unauthorized());
        assert!(ClientError::Api {
            status: 404,
            detail: None
        }
        .is_not_found());
        assert!(!ClientError::Config("x".into()).is_unauthorized());
    }

    #[test]
    fn display_includes_detail() {
        let err = ClientError::Api {
            status: 400,
            detail: Some("Email already registered".into()),
        };
        assert_eq!(err.to_string(), "API error (400): Email already registered");
    }
}
