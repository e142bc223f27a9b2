//! Entry parameters for the call logging and contact creation screens.
//!
//! The telephony webhook hands the console a redirect such as
//! `/calls/new?contact=42&phone=+15551234567&callEventId=900` or
//! `/contacts/new?phone=+15551234567&callEventId=900`. This module turns
//! those into typed entries.

use helpline_core::{CallEvent, CallEventId, ContactId};
use url::Url;

use crate::error::{FlowError, Result};
use crate::nav::Route;

/// Origin used to resolve relative redirect paths.
const CONSOLE_ORIGIN: &str = "http://console.invalid/";

/// Parameters of a telephony-redirected entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectEntry {
    /// Caller number; locked in the form.
    pub phone: String,
    /// Contact the server matched, if any.
    pub contact_id: Option<ContactId>,
    /// Telephony event to acknowledge after logging.
    pub call_event_id: Option<CallEventId>,
}

impl RedirectEntry {
    /// Entry for a known phone number.
    pub fn new(phone: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            contact_id: None,
            call_event_id: None,
        }
    }

    /// Attach a contact ID.
    #[must_use]
    pub fn with_contact(mut self, contact_id: ContactId) -> Self {
        self.contact_id = Some(contact_id);
        self
    }

    /// Attach a telephony event ID.
    #[must_use]
    pub fn with_call_event(mut self, call_event_id: CallEventId) -> Self {
        self.call_event_id = Some(call_event_id);
        self
    }

    /// Parse `phone`, `contact` and `callEventId` from a query string.
    ///
    /// A leading `?` is ignored. Empty values count as absent.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Validation` if `phone` is missing or an ID is malformed.
    pub fn from_query(query: &str) -> Result<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);
        // Caller numbers arrive unencoded; keep a literal '+' instead of reading it as a space.
        let query = query.replace('+', "%2B");

        let mut phone = None;
        let mut contact_id = None;
        let mut call_event_id = None;

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "phone" => phone = Some(value.to_string()),
                "contact" => {
                    contact_id = Some(ContactId::parse(value).map_err(|e| {
                        FlowError::validation(format!("invalid contact reference: {e}"))
                    })?);
                }
                "callEventId" => {
                    call_event_id = Some(CallEventId::parse(value).map_err(|e| {
                        FlowError::validation(format!("invalid call event reference: {e}"))
                    })?);
                }
                _ => {}
            }
        }

        let phone =
            phone.ok_or_else(|| FlowError::validation("redirect is missing a phone number"))?;
        Ok(Self {
            phone,
            contact_id,
            call_event_id,
        })
    }

    /// Entry for a pending telephony event.
    #[must_use]
    pub fn from_event(event: &CallEvent) -> Self {
        Self {
            phone: event.phone_number.clone(),
            contact_id: event.suggested_contact_id.clone(),
            call_event_id: Some(event.id.clone()),
        }
    }
}

/// A parsed redirect: where to go and with what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// `Route::NewCall` or `Route::NewContact`.
    pub route: Route,
    /// Entry parameters.
    pub entry: RedirectEntry,
}

impl Redirect {
    /// Parse a redirect path or absolute URL.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Validation` if the URL is malformed, does not point
    /// at the call or contact creation screens, or lacks a phone number.
    pub fn parse(input: &str) -> Result<Self> {
        let base = Url::parse(CONSOLE_ORIGIN)
            .map_err(|e| FlowError::validation(format!("invalid console origin: {e}")))?;
        let url = base
            .join(input.trim())
            .map_err(|e| FlowError::validation(format!("invalid redirect '{input}': {e}")))?;

        let route = match Route::from_path(url.path()) {
            Some(route @ (Route::NewCall | Route::NewContact)) => route,
            _ => {
                return Err(FlowError::validation(format!(
                    "redirect must target /calls/new or /contacts/new, got '{}'",
                    url.path()
                )))
            }
        };

        let entry = RedirectEntry::from_query(url.query().unwrap_or_default())?;
        Ok(Self { route, entry })
    }

    /// The redirect a telephony event points at.
    ///
    /// Uses the event's own `redirect_url` when it parses, else derives one
    /// from the event fields.
    #[must_use]
    pub fn for_event(event: &CallEvent) -> Self {
        if let Ok(redirect) = Self::parse(&event.redirect_url) {
            return redirect;
        }
        let entry = RedirectEntry::from_event(event);
        let route = if entry.contact_id.is_some() {
            Route::NewCall
        } else {
            Route::NewContact
        };
        Self { route, entry }
    }

    /// Render back to a console path with an encoded query.
    #[must_use]
    pub fn to_path(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if let Some(contact) = &self.entry.contact_id {
            query.append_pair("contact", contact.as_str());
        }
        query.append_pair("phone", &self.entry.phone);
        if let Some(event) = &self.entry.call_event_id {
            query.append_pair("callEventId", event.as_str());
        }
        format!("{}?{}", self.route.path(), query.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpline_client::mock::fixtures;

    #[test]
    fn parses_call_redirect() {
        let redirect =
            Redirect::parse("/calls/new?contact=42&phone=+15559876543&callEventId=900").unwrap();
        assert_eq!(redirect.route, Route::NewCall);
        assert_eq!(redirect.entry.phone, "+15559876543");
        assert_eq!(redirect.entry.contact_id.unwrap().as_str(), "42");
        assert_eq!(redirect.entry.call_event_id.unwrap().as_str(), "900");
    }

    #[test]
    fn parses_contact_redirect_from_absolute_url() {
        let redirect =
            Redirect::parse("https://helpline.example.org/contacts/new?phone=%2B15550000000&callEventId=ev-1")
                .unwrap();
        assert_eq!(redirect.route, Route::NewContact);
        assert_eq!(redirect.entry.phone, "+15550000000");
        assert!(redirect.entry.contact_id.is_none());
    }

    #[test]
    fn empty_values_are_absent() {
        let entry = RedirectEntry::from_query("?phone=5551234&contact=&callEventId=").unwrap();
        assert_eq!(entry.phone, "5551234");
        assert!(entry.contact_id.is_none());
        assert!(entry.call_event_id.is_none());
    }

    #[test]
    fn phone_is_required() {
        assert!(matches!(
            RedirectEntry::from_query("contact=42"),
            Err(FlowError::Validation(_))
        ));
        assert!(matches!(
            RedirectEntry::from_query("phone=%20%20"),
            Err(FlowError::Validation(_))
        ));
    }

    #[test]
    fn rejects_other_routes() {
        assert!(Redirect::parse("/admin?phone=1").is_err());
        assert!(Redirect::parse("/calls?phone=1").is_err());
    }

    #[test]
    fn event_without_contact_goes_to_contact_creation() {
        let mut event = fixtures::event("900", "+15551234567", None);
        event.redirect_url = String::new();
        let redirect = Redirect::for_event(&event);
        assert_eq!(redirect.route, Route::NewContact);
        assert_eq!(redirect.entry.call_event_id.unwrap().as_str(), "900");
    }

    #[test]
    fn path_round_trips_through_parse() {
        let redirect = Redirect {
            route: Route::NewCall,
            entry: RedirectEntry::new("+15551234567")
                .with_contact(ContactId::parse("42").unwrap())
                .with_call_event(CallEventId::parse("900").unwrap()),
        };
        let path = redirect.to_path();
        assert_eq!(path, "/calls/new?contact=42&phone=%2B15551234567&callEventId=900");
        assert_eq!(Redirect::parse(&path).unwrap(), redirect);
    }
}
