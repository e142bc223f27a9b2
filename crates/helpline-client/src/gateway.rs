//! The `Gateway` trait: every remote operation the console performs.
//!
//! Flows depend on `Arc<dyn Gateway>` so they can run against the HTTP
//! implementation or an in-memory double.

use async_trait::async_trait;
use helpline_core::{
    AdminStats, AuthResponse, CallEvent, CallEventId, CallFilter, CallId, CallPatch, CallRecord,
    CallStats, Contact, ContactFilter, ContactId, ContactPatch, Credentials, NewCall, NewContact,
    NewUser, PasswordReset, PhoneLookup, Registration, User, UserFilter, UserId, UserPatch,
};

use crate::error::Result;

/// Remote operations against the HelplineOS API.
///
/// Authenticated operations carry the current session token; a rejected
/// token surfaces as `ClientError::Unauthorized` after the session has been
/// expired.
#[async_trait]
pub trait Gateway: Send + Sync {
    // =========================================================================
    // Authentication
    // =========================================================================

    /// Exchange credentials for a token.
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse>;

    /// Create an agent account and sign it in.
    async fn register(&self, registration: &Registration) -> Result<AuthResponse>;

    /// Fetch the profile behind the current token.
    async fn me(&self) -> Result<User>;

    // =========================================================================
    // Contacts
    // =========================================================================

    /// List contacts matching `filter`.
    async fn list_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>>;

    /// Fetch one contact.
    async fn get_contact(&self, id: &ContactId) -> Result<Contact>;

    /// Look a contact up by exact phone number.
    async fn find_contact_by_phone(&self, phone_number: &str) -> Result<PhoneLookup>;

    /// Create a contact.
    async fn create_contact(&self, contact: &NewContact) -> Result<Contact>;

    /// Apply a partial update to a contact.
    async fn update_contact(&self, id: &ContactId, patch: &ContactPatch) -> Result<Contact>;

    /// Delete a contact.
    async fn delete_contact(&self, id: &ContactId) -> Result<()>;

    // =========================================================================
    // Calls
    // =========================================================================

    /// Create a call record.
    ///
    /// The server resolves or creates the contact from the caller number when
    /// `call.contact_id` is absent, and links `call_event` when given.
    async fn create_call(
        &self,
        call: &NewCall,
        call_event: Option<&CallEventId>,
    ) -> Result<CallRecord>;

    /// List calls matching `filter`, newest first.
    async fn list_calls(&self, filter: &CallFilter) -> Result<Vec<CallRecord>>;

    /// Fetch one call record.
    async fn get_call(&self, id: &CallId) -> Result<CallRecord>;

    /// Apply a partial update to a call record.
    async fn update_call(&self, id: &CallId, patch: &CallPatch) -> Result<CallRecord>;

    /// Aggregated call counts.
    async fn call_stats(&self) -> Result<CallStats>;

    /// Export calls matching `filter` as CSV bytes.
    async fn export_calls_csv(&self, filter: &CallFilter) -> Result<Vec<u8>>;

    // =========================================================================
    // Telephony events
    // =========================================================================

    /// Unprocessed telephony events.
    async fn pending_events(&self) -> Result<Vec<CallEvent>>;

    /// Fetch one telephony event.
    async fn get_event(&self, id: &CallEventId) -> Result<CallEvent>;

    /// Acknowledge a telephony event.
    async fn mark_event_processed(&self, id: &CallEventId) -> Result<()>;

    // =========================================================================
    // Administration
    // =========================================================================

    /// List accounts matching `filter`.
    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>>;

    /// Fetch one account.
    async fn get_user(&self, id: &UserId) -> Result<User>;

    /// Create an account.
    async fn create_user(&self, user: &NewUser) -> Result<User>;

    /// Apply a partial update to an account.
    async fn update_user(&self, id: &UserId, patch: &UserPatch) -> Result<User>;

    /// Delete an account.
    async fn delete_user(&self, id: &UserId) -> Result<()>;

    /// Set a new password on an account.
    async fn reset_password(&self, id: &UserId, reset: &PasswordReset) -> Result<()>;

    /// System-wide counts.
    async fn admin_stats(&self) -> Result<AdminStats>;
}
