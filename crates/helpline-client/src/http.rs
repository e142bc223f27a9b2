//! HTTP implementation of [`Gateway`].
//!
//! Every authenticated request carries `Authorization: Bearer <token>` from
//! the shared [`SessionContext`]. A 401 on such a request expires the
//! session before the error is returned, so whichever flow hit it, the
//! console ends up back at the login screen.

use async_trait::async_trait;
use helpline_core::{
    AdminStats, AuthResponse, CallEvent, CallEventId, CallFilter, CallId, CallPatch, CallRecord,
    CallStats, Contact, ContactFilter, ContactId, ContactPatch, Credentials, NewCall, NewContact,
    NewUser, PasswordReset, PhoneLookup, Registration, User, UserFilter, UserId, UserPatch,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::gateway::Gateway;
use crate::session::SessionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    Required,
    Anonymous,
}

/// Gateway that talks to the API over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    session: SessionContext,
}

impl HttpGateway {
    /// Create a gateway from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the API URL is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: &ClientConfig, session: SessionContext) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url()?,
            session,
        })
    }

    /// Create a gateway for `base_url` with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the URL is invalid.
    pub fn with_base_url(base_url: impl Into<String>, session: SessionContext) -> Result<Self> {
        Self::new(&ClientConfig::default().with_api_url(base_url), session)
    }

    /// The session this gateway authenticates with.
    #[must_use]
    pub const fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Build an endpoint URL by appending percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Base URLs are validated at construction, so segments are always available.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, request: RequestBuilder, auth: Auth) -> Result<Response> {
        let request = match auth {
            Auth::Required => {
                let token = self.session.token().ok_or(ClientError::NotAuthenticated)?;
                request.bearer_auth(token)
            }
            Auth::Anonymous => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = Self::handle_error(response).await;
        tracing::debug!(status = status.as_u16(), detail = ?detail, "API request failed");

        if status == StatusCode::UNAUTHORIZED && auth == Auth::Required {
            self.session.expire();
            return Err(ClientError::Unauthorized { detail });
        }
        Err(ClientError::Api {
            status: status.as_u16(),
            detail,
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder, auth: Auth) -> Result<T> {
        let response = self.send(request, auth).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<()> {
        self.send(request, Auth::Required).await?;
        Ok(())
    }

    /// Read the `detail` field from an error response, if there is one.
    async fn handle_error(response: Response) -> Option<String> {
        let body: Value = response.json().await.ok()?;
        error_detail(&body)
    }
}

/// Extract a displayable message from an API error body.
///
/// Handles both `{"detail": "text"}` and validation errors of the form
/// `{"detail": [{"msg": "text", ...}]}`.
fn error_detail(body: &Value) -> Option<String> {
    match body.get("detail")? {
        Value::String(text) => Some(text.clone()),
        Value::Array(items) => items
            .iter()
            .find_map(|item| item.get("msg").and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    // =========================================================================
    // Authentication
    // =========================================================================

    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse> {
        let url = self.endpoint(&["auth", "login"]);
        self.fetch(self.client.post(url).json(credentials), Auth::Anonymous)
            .await
    }

    async fn register(&self, registration: &Registration) -> Result<AuthResponse> {
        let url = self.endpoint(&["auth", "register"]);
        self.fetch(self.client.post(url).json(registration), Auth::Anonymous)
            .await
    }

    async fn me(&self) -> Result<User> {
        let url = self.endpoint(&["auth", "me"]);
        self.fetch(self.client.get(url), Auth::Required).await
    }

    // =========================================================================
    // Contacts
    // =========================================================================

    async fn list_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>> {
        let url = self.endpoint(&["contacts"]);
        let request = self.client.get(url).query(&filter.query_pairs());
        self.fetch(request, Auth::Required).await
    }

    async fn get_contact(&self, id: &ContactId) -> Result<Contact> {
        let url = self.endpoint(&["contacts", id.as_str()]);
        self.fetch(self.client.get(url), Auth::Required).await
    }

    async fn find_contact_by_phone(&self, phone_number: &str) -> Result<PhoneLookup> {
        let url = self.endpoint(&["contacts", "by-phone", phone_number]);
        self.fetch(self.client.get(url), Auth::Required).await
    }

    async fn create_contact(&self, contact: &NewContact) -> Result<Contact> {
        let url = self.endpoint(&["contacts"]);
        let created: Contact = self
            .fetch(self.client.post(url).json(contact), Auth::Required)
            .await?;
        tracing::debug!(contact_id = %created.id, "Created contact");
        Ok(created)
    }

    async fn update_contact(&self, id: &ContactId, patch: &ContactPatch) -> Result<Contact> {
        let url = self.endpoint(&["contacts", id.as_str()]);
        self.fetch(self.client.put(url).json(patch), Auth::Required)
            .await
    }

    async fn delete_contact(&self, id: &ContactId) -> Result<()> {
        let url = self.endpoint(&["contacts", id.as_str()]);
        self.execute(self.client.delete(url)).await
    }

    // =========================================================================
    // Calls
    // =========================================================================

    async fn create_call(
        &self,
        call: &NewCall,
        call_event: Option<&CallEventId>,
    ) -> Result<CallRecord> {
        let url = self.endpoint(&["calls"]);
        let mut request = self.client.post(url).json(call);
        if let Some(event_id) = call_event {
            request = request.query(&[("call_event_id", event_id.as_str())]);
        }
        let created: CallRecord = self.fetch(request, Auth::Required).await?;
        tracing::debug!(call_id = %created.id, "Created call record");
        Ok(created)
    }

    async fn list_calls(&self, filter: &CallFilter) -> Result<Vec<CallRecord>> {
        let url = self.endpoint(&["calls"]);
        let request = self.client.get(url).query(&filter.query_pairs());
        self.fetch(request, Auth::Required).await
    }

    async fn get_call(&self, id: &CallId) -> Result<CallRecord> {
        let url = self.endpoint(&["calls", id.as_str()]);
        self.fetch(self.client.get(url), Auth::Required).await
    }

    async fn update_call(&self, id: &CallId, patch: &CallPatch) -> Result<CallRecord> {
        let url = self.endpoint(&["calls", id.as_str()]);
        self.fetch(self.client.put(url).json(patch), Auth::Required)
            .await
    }

    async fn call_stats(&self) -> Result<CallStats> {
        let url = self.endpoint(&["calls", "stats"]);
        self.fetch(self.client.get(url), Auth::Required).await
    }

    async fn export_calls_csv(&self, filter: &CallFilter) -> Result<Vec<u8>> {
        let url = self.endpoint(&["calls", "export", "csv"]);
        let request = self.client.get(url).query(&filter.export_pairs());
        let response = self.send(request, Auth::Required).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    // =========================================================================
    // Telephony events
    // =========================================================================

    async fn pending_events(&self) -> Result<Vec<CallEvent>> {
        let url = self.endpoint(&["freepbx", "pending-calls"]);
        self.fetch(self.client.get(url), Auth::Required).await
    }

    async fn get_event(&self, id: &CallEventId) -> Result<CallEvent> {
        let url = self.endpoint(&["freepbx", "call-events", id.as_str()]);
        self.fetch(self.client.get(url), Auth::Required).await
    }

    async fn mark_event_processed(&self, id: &CallEventId) -> Result<()> {
        let url = self.endpoint(&["freepbx", "call-events", id.as_str(), "mark-processed"]);
        self.execute(self.client.put(url)).await?;
        tracing::debug!(call_event_id = %id, "Marked call event processed");
        Ok(())
    }

    // =========================================================================
    // Administration
    // =========================================================================

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>> {
        let url = self.endpoint(&["admin", "users"]);
        let request = self.client.get(url).query(&filter.query_pairs());
        self.fetch(request, Auth::Required).await
    }

    async fn get_user(&self, id: &UserId) -> Result<User> {
        let url = self.endpoint(&["admin", "users", id.as_str()]);
        self.fetch(self.client.get(url), Auth::Required).await
    }

    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let url = self.endpoint(&["admin", "users"]);
        self.fetch(self.client.post(url).json(user), Auth::Required)
            .await
    }

    async fn update_user(&self, id: &UserId, patch: &UserPatch) -> Result<User> {
        let url = self.endpoint(&["admin", "users", id.as_str()]);
        self.fetch(self.client.put(url).json(patch), Auth::Required)
            .await
    }

    async fn delete_user(&self, id: &UserId) -> Result<()> {
        let url = self.endpoint(&["admin", "users", id.as_str()]);
        self.execute(self.client.delete(url)).await
    }

    async fn reset_password(&self, id: &UserId, reset: &PasswordReset) -> Result<()> {
        let url = self.endpoint(&["admin", "users", id.as_str(), "reset-password"]);
        self.execute(self.client.post(url).json(reset)).await
    }

    async fn admin_stats(&self) -> Result<AdminStats> {
        let url = self.endpoint(&["admin", "stats"]);
        self.fetch(self.client.get(url), Auth::Required).await
    }
}
