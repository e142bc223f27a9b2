//! Contact resolution state machine for the call logging flow.
//!
//! # State Machine
//!
//! ```text
//!   ┌─────────┐  lookup   ┌───────────┐  match    ┌─────────┐
//!   │ Unknown │──────────▶│ Searching │──────────▶│  Found  │
//!   └─────────┘           └─────┬─────┘           └────┬────┘
//!        ▲                      │ no match             │
//!        │   request failed     ▼                      │
//!        ├──────────────── ┌──────────┐                │
//!        │                 │ NotFound │                │
//!        │                 └────┬─────┘                │
//!        │  caller number edited│                      │
//!        └──────────────────────┴──────────────────────┘
//! ```
//!
//! `Found` and `NotFound` may also go back to `Searching` when the agent
//! repeats the lookup.

use std::fmt;

use helpline_core::Contact;

use crate::error::{FlowError, Result};

/// Phase of contact resolution, without the resolved data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionPhase {
    /// No lookup has been made for the current caller number.
    Unknown,
    /// A lookup is in flight.
    Searching,
    /// A contact matched.
    Found,
    /// No contact has this phone number.
    NotFound,
}

impl fmt::Display for ResolutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Searching => "searching",
            Self::Found => "found",
            Self::NotFound => "not_found",
        };
        f.write_str(name)
    }
}

/// Resolution state carrying the matched contact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ContactResolution {
    /// No lookup yet.
    #[default]
    Unknown,
    /// Lookup in flight.
    Searching,
    /// The caller is this contact. Its profile is read-only in the flow.
    Found(Contact),
    /// No match; new-contact details may be supplied.
    NotFound,
}

impl ContactResolution {
    /// The phase of this state.
    #[must_use]
    pub const fn phase(&self) -> ResolutionPhase {
        match self {
            Self::Unknown => ResolutionPhase::Unknown,
            Self::Searching => ResolutionPhase::Searching,
            Self::Found(_) => ResolutionPhase::Found,
            Self::NotFound => ResolutionPhase::NotFound,
        }
    }

    /// The matched contact, if any.
    #[must_use]
    pub const fn contact(&self) -> Option<&Contact> {
        match self {
            Self::Found(contact) => Some(contact),
            _ => None,
        }
    }

    /// Move to `next`, checking the transition table.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::InvalidTransition` if the move is not allowed; the
    /// state is left unchanged.
    pub fn advance(&mut self, next: Self) -> Result<()> {
        validate_transition(self.phase(), next.phase())?;
        *self = next;
        Ok(())
    }
}

/// Validates a transition and returns the target phase if valid.
///
/// # Errors
///
/// Returns `FlowError::InvalidTransition` if the transition is not allowed.
pub fn validate_transition(from: ResolutionPhase, to: ResolutionPhase) -> Result<ResolutionPhase> {
    if is_valid_transition(from, to) {
        Ok(to)
    } else {
        Err(FlowError::InvalidTransition { from, to })
    }
}

/// Check if a transition is allowed by the state machine.
#[must_use]
pub const fn is_valid_transition(from: ResolutionPhase, to: ResolutionPhase) -> bool {
    use ResolutionPhase::{Found, NotFound, Searching, Unknown};

    matches!(
        (from, to),
        (Unknown | Found | NotFound, Searching)
            | (Searching, Found | NotFound | Unknown)
            | (Found | NotFound, Unknown)
    )
}
