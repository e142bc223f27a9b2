//! Caller contacts.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ContactId;

/// A caller contact as returned by the API.
///
/// The phone number is the lookup key; the id is the durable reference once
/// the contact exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Contact ID.
    pub id: ContactId,
    /// Phone number, unique per contact.
    pub phone_number: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Postal address.
    #[serde(default)]
    pub address: Option<String>,
    /// Company the caller belongs to.
    #[serde(default)]
    pub company: Option<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Contact {
    /// Name to show for this contact, falling back to the phone number.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.phone_number)
    }
}

/// Payload for creating a contact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContact {
    /// Phone number (required).
    pub phone_number: String,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Postal address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Company.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

/// Partial update of a contact. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPatch {
    /// New phone number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// New postal address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// New company.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Replacement tag set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
}

impl ContactPatch {
    /// Returns `true` if no field would be changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phone_number.is_none()
            && self.name.is_none()
            && self.email.is_none()
            && self.address.is_none()
            && self.company.is_none()
            && self.tags.is_none()
    }
}

/// Result of `GET /contacts/by-phone/{number}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneLookup {
    /// Whether a contact with the phone number exists.
    pub found: bool,
    /// The contact, when found.
    #[serde(default)]
    pub contact: Option<Contact>,
}

impl PhoneLookup {
    /// Collapse the wire shape into an option.
    #[must_use]
    pub fn into_contact(self) -> Option<Contact> {
        if self.found {
            self.contact
        } else {
            None
        }
    }
}

/// Server-side filter for the contact list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactFilter {
    /// Free-text match across name, phone, email and company.
    pub search: Option<String>,
    /// Exact tag match.
    pub tag: Option<String>,
}

impl ContactFilter {
    /// Filter by free text only.
    #[must_use]
    pub fn search(text: impl Into<String>) -> Self {
        Self {
            search: Some(text.into()),
            tag: None,
        }
    }

    /// Query-string pairs for this filter, skipping blank values.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push_non_blank(&mut pairs, "search", self.search.as_deref());
        push_non_blank(&mut pairs, "tag", self.tag.as_deref());
        pairs
    }
}

pub(crate) fn push_non_blank(
    pairs: &mut Vec<(&'static str, String)>,
    key: &'static str,
    value: Option<&str>,
) {
    if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
        pairs.push((key, v.to_string()));
    }
}

/// Split a comma-delimited tag field into a tag set.
///
/// Entries are trimmed; empty entries are dropped and duplicates collapse.
#[must_use]
pub fn parse_tags(input: &str) -> BTreeSet<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Join a tag set back into the editable text form.
#[must_use]
pub fn format_tags(tags: &BTreeSet<String>) -> String {
    tags.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Normalize an optional text input: trimmed, `None` when blank.
#[must_use]
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}
