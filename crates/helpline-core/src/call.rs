//! Call records and their classification enums.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contact::push_non_blank;
use crate::error::CoreError;
use crate::ids::{CallId, ContactId, UserId};

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal, default = $default:ident,
        { $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            /// Every variant, in display order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// Wire representation.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(CoreError::UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

wire_enum!(
    /// What the caller wanted.
    CallType, "call type", default = Inquiry,
    {
        /// General question.
        Inquiry => "inquiry",
        /// Complaint about a product or service.
        Complaint => "complaint",
        /// Support request.
        Support => "support",
    }
);

wire_enum!(
    /// Urgency assigned by the agent.
    Priority, "priority", default = Normal,
    {
        /// Can wait.
        Low => "low",
        /// Default urgency.
        Normal => "normal",
        /// Needs attention soon.
        High => "high",
        /// Needs attention now.
        Urgent => "urgent",
    }
);

wire_enum!(
    /// Handling state of a call.
    CallStatus, "call status", default = Completed,
    {
        /// Still being handled.
        InProgress => "in_progress",
        /// Resolved.
        Completed => "completed",
        /// Requires a follow-up.
        FollowUp => "follow_up",
    }
);

/// A logged call as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Call ID.
    pub id: CallId,
    /// Number the call came from. Never changes after creation.
    pub caller_number: String,
    /// Contact the call is attached to.
    #[serde(default)]
    pub contact_id: Option<ContactId>,
    /// Contact name at the time the call was logged.
    #[serde(default)]
    pub contact_name: Option<String>,
    /// Agent who logged the call.
    pub agent_id: UserId,
    /// Agent display name.
    #[serde(default)]
    pub agent_name: String,
    /// Duration in seconds.
    pub duration: u32,
    /// Call classification.
    pub call_type: CallType,
    /// Urgency.
    pub priority: Priority,
    /// Handling state.
    pub status: CallStatus,
    /// Agent notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// How the call was resolved.
    #[serde(default)]
    pub resolution_notes: Option<String>,
    /// When the call was logged.
    pub timestamp: DateTime<Utc>,
    /// PBX call id, when created from a telephony event.
    #[serde(default)]
    pub freepbx_call_id: Option<String>,
}

/// Payload for `POST /calls`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCall {
    /// Number the call came from.
    pub caller_number: String,
    /// Duration in seconds.
    pub duration: u32,
    /// Call classification.
    pub call_type: CallType,
    /// Urgency.
    pub priority: Priority,
    /// Handling state.
    pub status: CallStatus,
    /// Agent notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// How the call was resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_notes: Option<String>,
    /// Known contact. `None` asks the server to find or create one by number.
    pub contact_id: Option<ContactId>,
}

/// Partial update of a call. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallPatch {
    /// New duration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    /// New notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// New classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_type: Option<CallType>,
    /// New urgency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// New handling state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CallStatus>,
    /// New resolution notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_notes: Option<String>,
}

impl CallPatch {
    /// Returns `true` if no field would be changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.duration.is_none()
            && self.notes.is_none()
            && self.call_type.is_none()
            && self.priority.is_none()
            && self.status.is_none()
            && self.resolution_notes.is_none()
    }
}

/// Server-side filter for call lists and exports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallFilter {
    /// Free-text match across caller number, contact name and notes.
    pub search: Option<String>,
    /// Exact classification.
    pub call_type: Option<CallType>,
    /// Exact urgency.
    pub priority: Option<Priority>,
    /// Exact handling state.
    pub status: Option<CallStatus>,
    /// Inclusive lower bound on the timestamp (ISO date or datetime).
    pub date_from: Option<String>,
    /// Inclusive upper bound on the timestamp (ISO date or datetime).
    pub date_to: Option<String>,
}

impl CallFilter {
    /// Query-string pairs for the list endpoint.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push_non_blank(&mut pairs, "search", self.search.as_deref());
        pairs.extend(self.export_pairs());
        pairs
    }

    /// Query-string pairs for the CSV export, which ignores free-text search.
    #[must_use]
    pub fn export_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(t) = self.call_type {
            pairs.push(("call_type", t.as_str().to_string()));
        }
        if let Some(p) = self.priority {
            pairs.push(("priority", p.as_str().to_string()));
        }
        if let Some(s) = self.status {
            pairs.push(("status", s.as_str().to_string()));
        }
        push_non_blank(&mut pairs, "date_from", self.date_from.as_deref());
        push_non_blank(&mut pairs, "date_to", self.date_to.as_deref());
        pairs
    }
}

/// Aggregate call statistics from `GET /calls/stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallStats {
    /// All calls ever logged.
    pub total_calls: u64,
    /// Calls logged since midnight UTC.
    pub calls_today: u64,
    /// Calls logged since Monday midnight UTC.
    pub calls_this_week: u64,
    /// Counts keyed by call type wire name.
    #[serde(default)]
    pub calls_by_type: BTreeMap<String, u64>,
    /// Counts keyed by priority wire name.
    #[serde(default)]
    pub calls_by_priority: BTreeMap<String, u64>,
    /// Counts keyed by status wire name.
    #[serde(default)]
    pub calls_by_status: BTreeMap<String, u64>,
    /// Mean duration in seconds.
    #[serde(default)]
    pub avg_duration: f64,
}

/// Parse a manually entered duration.
///
/// Accepts plain seconds (`"125"`) or minutes and seconds (`"2:05"`).
/// Blank input is zero.
///
/// # Errors
///
/// Returns `CoreError::InvalidDuration` for anything else.
pub fn parse_duration(input: &str) -> Result<u32, CoreError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(0);
    }

    let invalid = || CoreError::InvalidDuration(input.to_string());

    match input.split_once(':') {
        None => input.parse::<u32>().map_err(|_| invalid()),
        Some((mins, secs)) => {
            let mins: u32 = mins.parse().map_err(|_| invalid())?;
            let secs: u32 = secs.parse().map_err(|_| invalid())?;
            if secs >= 60 {
                return Err(invalid());
            }
            mins.checked_mul(60)
                .and_then(|m| m.checked_add(secs))
                .ok_or_else(invalid)
        }
    }
}

/// Format seconds as `m:ss`.
#[must_use]
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
