//! Identifier types for HelplineOS resources.
//!
//! The remote API mints identifiers and the console treats them as opaque
//! tokens. They are validated only so that they can be embedded safely in
//! request paths and query strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bound on identifier length accepted from users or the server.
pub const MAX_ID_LEN: usize = 128;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse an identifier, rejecting values that are unsafe in a URL path.
            ///
            /// # Errors
            ///
            /// Returns an error if the value is empty, too long, or contains
            /// whitespace, `/`, `?`, `#` or `&`.
            pub fn parse(value: impl Into<String>) -> Result<Self, IdError> {
                let value = value.into();
                validate(&value)?;
                Ok(Self(value))
            }

            /// Return the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

opaque_id!(
    /// Durable reference to a caller contact.
    ContactId
);

opaque_id!(
    /// Identifier of a logged call record.
    CallId
);

opaque_id!(
    /// Identifier of a console user account (admin, supervisor or agent).
    UserId
);

opaque_id!(
    /// Identifier of a telephony event emitted by the PBX integration.
    ///
    /// Used as the correlation reference when a call record is created in
    /// response to an inbound call.
    CallEventId
);

fn validate(value: &str) -> Result<(), IdError> {
    if value.is_empty() {
        return Err(IdError::Empty);
    }
    if value.len() > MAX_ID_LEN {
        return Err(IdError::TooLong {
            max: MAX_ID_LEN,
            got: value.len(),
        });
    }
    if let Some(c) = value
        .chars()
        .find(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '&'))
    {
        return Err(IdError::InvalidCharacter(c));
    }
    Ok(())
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The identifier is empty.
    #[error("identifier is empty")]
    Empty,

    /// The identifier exceeds the maximum length.
    #[error("identifier too long: max {max} characters, got {got}")]
    TooLong {
        /// The maximum accepted length.
        max: usize,
        /// The actual length.
        got: usize,
    },

    /// The identifier contains a character that cannot appear in a path segment.
    #[error("identifier contains invalid character {0:?}")]
    InvalidCharacter(char),
}
