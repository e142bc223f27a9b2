//! Core types and capability rules for the HelplineOS console.
//!
//! This crate provides the foundational types shared by the gateway client
//! and the console flows:
//!
//! - **Identifiers**: opaque, path-safe IDs for contacts, calls, users and telephony events
//! - **Entities**: contacts, call records, telephony events, user accounts
//! - **Capabilities**: the role table consulted by [`allows`]
//! - **Error types**: common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use helpline_core::{allows, parse_tags, Action, ContactId, Role};
//!
//! let contact_id: ContactId = "42".parse().unwrap();
//! assert_eq!(contact_id.as_str(), "42");
//!
//! assert!(allows(Role::Agent, Action::LogCall));
//! assert!(!allows(Role::Agent, Action::ManageUsers));
//!
//! let tags = parse_tags("vip, billing");
//! assert_eq!(tags.len(), 2);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod call;
pub mod contact;
pub mod error;
pub mod ids;
pub mod roles;
pub mod telephony;
pub mod user;

pub use call::{
    format_duration, parse_duration, CallFilter, CallPatch, CallRecord, CallStats, CallStatus,
    CallType, NewCall, Priority,
};
pub use contact::{
    format_tags, non_blank, parse_tags, Contact, ContactFilter, ContactPatch, NewContact,
    PhoneLookup,
};
pub use error::{CoreError, Result};
pub use ids::{CallEventId, CallId, ContactId, IdError, UserId};
pub use roles::{allows, Action, Role, UserStatus};
pub use telephony::CallEvent;
pub use user::{
    AdminStats, AuthResponse, Credentials, MessageResponse, NewUser, PasswordReset, Registration,
    User, UserFilter, UserPatch, MIN_PASSWORD_LEN,
};
