//! Error types for the console flows.

use helpline_client::{ClientError, SessionContext};
use helpline_core::{allows, Action};
use thiserror::Error;

use crate::resolution::ResolutionPhase;

/// A result type using `FlowError`.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors surfaced by the console flows.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Input was rejected before any request was made.
    #[error("{0}")]
    Validation(String),

    /// The signed-in role may not perform this action.
    #[error("not permitted: {0}")]
    Forbidden(Action),

    /// No user is signed in.
    #[error("not logged in")]
    NotAuthenticated,

    /// A submission is already in flight.
    #[error("a submission is already in progress")]
    Busy,

    /// The contact resolution state machine refused a transition.
    #[error("invalid resolution transition: cannot go from {from} to {to}")]
    InvalidTransition {
        /// The current phase.
        from: ResolutionPhase,
        /// The requested phase.
        to: ResolutionPhase,
    },

    /// A remote request failed. `message` is ready to show to the user.
    #[error("{message}")]
    Remote {
        /// Server detail or the action's fallback text.
        message: String,
        /// HTTP status, when the API answered.
        status: Option<u16>,
    },

    /// A client-side failure not tied to a remote action.
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl FlowError {
    /// Wrap a gateway failure, keeping the server detail or using `fallback`.
    #[must_use]
    pub fn remote(err: &ClientError, fallback: &str) -> Self {
        Self::Remote {
            message: err.user_message(fallback),
            status: err.status(),
        }
    }

    /// Shorthand for a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Returns `true` if the failure means the user must log in again.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::NotAuthenticated => true,
            Self::Remote { status, .. } => *status == Some(401),
            Self::Client(e) => e.is_unauthorized(),
            _ => false,
        }
    }

    /// A displayable copy for re-raising a failure held behind a shared reference.
    #[must_use]
    pub fn to_remote(&self) -> Self {
        match self {
            Self::Remote { message, status } => Self::Remote {
                message: message.clone(),
                status: *status,
            },
            other => Self::Remote {
                message: other.to_string(),
                status: None,
            },
        }
    }

    /// Returns `true` if no request was issued.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Forbidden(_)
                | Self::NotAuthenticated
                | Self::Busy
                | Self::InvalidTransition { .. }
        )
    }
}

/// Check the signed-in role may perform `action`.
pub(crate) fn require(session: &SessionContext, action: Action) -> Result<()> {
    let role = session.role().ok_or(FlowError::NotAuthenticated)?;
    if allows(role, action) {
        Ok(())
    } else {
        Err(FlowError::Forbidden(action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_uses_detail_or_fallback() {
        let with_detail = ClientError::Api {
            status: 400,
            detail: Some("Cannot change your own role".into()),
        };
        let err = FlowError::remote(&with_detail, "Failed to update user");
        assert_eq!(err.to_string(), "Cannot change your own role");

        let without = ClientError::Api {
            status: 500,
            detail: None,
        };
        let err = FlowError::remote(&without, "Failed to log call");
        assert_eq!(err.to_string(), "Failed to log call");
        assert!(!err.is_local());
    }

    #[test]
    fn unauthorized_classification() {
        let expired = ClientError::Unauthorized { detail: None };
        assert!(FlowError::remote(&expired, "x").is_unauthorized());
        assert!(FlowError::NotAuthenticated.is_unauthorized());
        assert!(!FlowError::Busy.is_unauthorized());
    }

    #[test]
    fn local_errors() {
        assert!(FlowError::validation("Caller number is required").is_local());
        assert!(FlowError::Forbidden(Action::ManageUsers).is_local());
        assert_eq!(
            FlowError::Forbidden(Action::ExportCalls).to_string(),
            format!("not permitted: {}", Action::ExportCalls)
        );
    }
}
