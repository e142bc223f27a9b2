//! Telephony events recorded by the PBX integration.

use serde::{Deserialize, Serialize};

use crate::ids::{CallEventId, ContactId, UserId};

/// An inbound call signalled by the PBX.
///
/// The console consumes each event once: it pre-fills the call logging
/// screen and is acknowledged after the resulting call record is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEvent {
    /// Event ID, used as the correlation reference.
    pub id: CallEventId,
    /// Normalized caller number.
    #[serde(rename = "caller_number")]
    pub phone_number: String,
    /// Contact the server matched by phone number, if any.
    #[serde(rename = "contact_id", default)]
    pub suggested_contact_id: Option<ContactId>,
    /// Whether a matching contact existed when the event arrived.
    #[serde(default)]
    pub contact_exists: bool,
    /// Whether an agent has already handled this event.
    #[serde(default)]
    pub processed: bool,
    /// PBX-side call id.
    #[serde(default)]
    pub freepbx_call_id: Option<String>,
    /// Agent the call was routed to.
    #[serde(default)]
    pub agent_id: Option<UserId>,
    /// PBX extension that answered.
    #[serde(default)]
    pub agent_extension: Option<String>,
    /// PBX event kind (`call_answered`, `call_started`, ...).
    #[serde(default)]
    pub event_type: String,
    /// Console route to open for this event.
    #[serde(default)]
    pub redirect_url: String,
    /// Event time as reported by the PBX, not normalized.
    #[serde(default)]
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_webhook_record() {
        let event: CallEvent = serde_json::from_value(serde_json::json!({
            "id": "900",
            "freepbx_call_id": "1700000000.42",
            "caller_number": "+15559876543",
            "agent_id": null,
            "agent_extension": "201",
            "contact_id": "42",
            "contact_exists": true,
            "event_type": "call_answered",
            "direction": "inbound",
            "redirect_url": "/calls/new?contact=42&phone=+15559876543&callEventId=900",
            "timestamp": "2025-03-01T10:00:00+00:00",
            "created_at": "2025-03-01T10:00:00+00:00",
            "processed": false
        }))
        .unwrap();

        assert_eq!(event.id.as_str(), "900");
        assert_eq!(event.phone_number, "+15559876543");
        assert_eq!(event.suggested_contact_id.unwrap().as_str(), "42");
        assert!(!event.processed);
    }
}
