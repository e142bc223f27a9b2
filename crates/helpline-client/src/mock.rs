//! In-memory [`Gateway`] that records every request.
//!
//! Behaves like the API for the operations the console uses (find-or-create
//! of contacts on call creation, duplicate checks, event linking) and lets
//! tests inject failures and latency per operation.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use helpline_core::{
    AdminStats, AuthResponse, CallEvent, CallEventId, CallFilter, CallId, CallPatch, CallRecord,
    CallStats, Contact, ContactFilter, ContactId, ContactPatch, Credentials, NewCall, NewContact,
    NewUser, PasswordReset, PhoneLookup, Registration, Role, User, UserFilter, UserId, UserPatch,
    UserStatus, MIN_PASSWORD_LEN,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::gateway::Gateway;
use crate::session::SessionContext;

/// Gateway operations, used to inspect recorded requests and to target
/// injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Op {
    Login,
    Register,
    Me,
    ListContacts,
    GetContact,
    FindContactByPhone,
    CreateContact,
    UpdateContact,
    DeleteContact,
    CreateCall,
    ListCalls,
    GetCall,
    UpdateCall,
    CallStats,
    ExportCalls,
    PendingEvents,
    GetEvent,
    MarkEventProcessed,
    ListUsers,
    GetUser,
    CreateUser,
    UpdateUser,
    DeleteUser,
    ResetPassword,
    AdminStats,
}

/// One request seen by the [`RecordingGateway`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// The operation.
    pub op: Op,
    /// Path target (an ID, phone number or search text), if any.
    pub target: Option<String>,
    /// Serialized request payload, or `Value::Null`.
    pub body: Value,
}

#[derive(Debug, Clone)]
struct Failure {
    status: u16,
    detail: Option<String>,
}

#[derive(Default)]
struct State {
    contacts: Vec<Contact>,
    calls: Vec<CallRecord>,
    events: Vec<CallEvent>,
    users: Vec<User>,
    passwords: HashMap<String, String>,
    requests: Vec<RecordedRequest>,
    queued_failures: HashMap<Op, VecDeque<Failure>>,
    sticky_failures: HashMap<Op, Failure>,
    op_delays: HashMap<Op, Duration>,
    search_delays: HashMap<String, Duration>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

/// Recording in-memory gateway for tests.
#[derive(Default)]
pub struct RecordingGateway {
    state: Mutex<State>,
    acting_user: Mutex<Option<User>>,
    session: Mutex<Option<SessionContext>>,
}

impl RecordingGateway {
    /// Create an empty gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------------

    /// Add a contact.
    pub fn add_contact(&self, contact: Contact) {
        self.state.lock().contacts.push(contact);
    }

    /// Add a telephony event.
    pub fn add_event(&self, event: CallEvent) {
        self.state.lock().events.push(event);
    }

    /// Add a call record.
    pub fn add_call(&self, call: CallRecord) {
        self.state.lock().calls.push(call);
    }

    /// Add an account that can log in with `password`.
    pub fn add_user(&self, user: User, password: &str) {
        let mut state = self.state.lock();
        state
            .passwords
            .insert(user.email.clone(), password.to_string());
        state.users.push(user);
    }

    /// Set the user on whose behalf authenticated requests are made.
    pub fn act_as(&self, user: User) {
        *self.acting_user.lock() = Some(user);
    }

    /// Expire `session` whenever an injected 401 is returned.
    pub fn attach_session(&self, session: SessionContext) {
        *self.session.lock() = Some(session);
    }

    // ------------------------------------------------------------------------
    // Behaviour
    // ------------------------------------------------------------------------

    /// Fail the next call to `op` with `status` and an optional detail.
    pub fn fail_next(&self, op: Op, status: u16, detail: Option<&str>) {
        self.state
            .lock()
            .queued_failures
            .entry(op)
            .or_default()
            .push_back(Failure {
                status,
                detail: detail.map(str::to_string),
            });
    }

    /// Fail every call to `op` until [`Self::clear_failures`].
    pub fn fail_always(&self, op: Op, status: u16, detail: Option<&str>) {
        self.state.lock().sticky_failures.insert(
            op,
            Failure {
                status,
                detail: detail.map(str::to_string),
            },
        );
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.queued_failures.clear();
        state.sticky_failures.clear();
    }

    /// Delay every call to `op`.
    pub fn delay(&self, op: Op, delay: Duration) {
        self.state.lock().op_delays.insert(op, delay);
    }

    /// Delay contact and user searches for exactly `text`.
    pub fn delay_search(&self, text: &str, delay: Duration) {
        self.state
            .lock()
            .search_delays
            .insert(text.to_string(), delay);
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    /// All recorded requests, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Recorded requests for `op`, oldest first.
    #[must_use]
    pub fn requests_for(&self, op: Op) -> Vec<RecordedRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.op == op)
            .cloned()
            .collect()
    }

    /// Number of requests made for `op`.
    #[must_use]
    pub fn count(&self, op: Op) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.op == op)
            .count()
    }

    /// Current contacts.
    #[must_use]
    pub fn contacts(&self) -> Vec<Contact> {
        self.state.lock().contacts.clone()
    }

    /// Current call records, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<CallRecord> {
        self.state.lock().calls.clone()
    }

    /// Current telephony events.
    #[must_use]
    pub fn events(&self) -> Vec<CallEvent> {
        self.state.lock().events.clone()
    }

    /// Current accounts.
    #[must_use]
    pub fn users(&self) -> Vec<User> {
        self.state.lock().users.clone()
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    async fn begin(
        &self,
        op: Op,
        target: Option<&str>,
        body: Value,
    ) -> Result<()> {
        let (delay, failure) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            state.requests.push(RecordedRequest {
                op,
                target: target.map(str::to_string),
                body,
            });

            let queued = state
                .queued_failures
                .get_mut(&op)
                .and_then(VecDeque::pop_front);
            let failure = queued.or_else(|| state.sticky_failures.get(&op).cloned());

            let search_delay = match op {
                Op::ListContacts | Op::ListUsers => {
                    target.and_then(|t| state.search_delays.get(t).copied())
                }
                _ => None,
            };
            let delay = search_delay.or_else(|| state.op_delays.get(&op).copied());
            (delay, failure)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match failure {
            None => Ok(()),
            Some(Failure { status: 401, detail }) => {
                if let Some(session) = self.session.lock().clone() {
                    session.expire();
                }
                Err(ClientError::Unauthorized { detail })
            }
            Some(Failure { status, detail }) => Err(ClientError::Api { status, detail }),
        }
    }

    fn acting_user(&self) -> Result<User> {
        self.acting_user
            .lock()
            .clone()
            .ok_or(ClientError::NotAuthenticated)
    }

    fn acting_user_id(&self) -> Option<UserId> {
        self.acting_user.lock().as_ref().map(|u| u.id.clone())
    }
}

fn not_found(what: &str) -> ClientError {
    ClientError::Api {
        status: 404,
        detail: Some(format!("{what} not found")),
    }
}

fn bad_request(detail: &str) -> ClientError {
    ClientError::Api {
        status: 400,
        detail: Some(detail.to_string()),
    }
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(needle))
}

fn search_text(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

fn to_body<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[async_trait]
impl Gateway for RecordingGateway {
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse> {
        self.begin(Op::Login, Some(credentials.email.as_str()), Value::Null).await?;
        let user = {
            let mut state = self.state.lock();
            let valid = state
                .passwords
                .get(&credentials.email)
                .is_some_and(|p| *p == credentials.password);
            let user = state
                .users
                .iter_mut()
                .find(|u| u.email == credentials.email)
                .filter(|_| valid)
                .ok_or_else(|| ClientError::Api {
                    status: 401,
                    detail: Some("Invalid email or password".into()),
                })?;
            if user.status == UserStatus::Inactive {
                return Err(ClientError::Api {
                    status: 403,
                    detail: Some("Account is deactivated. Contact administrator.".into()),
                });
            }
            user.last_login = Some(Utc::now());
            user.clone()
        };
        self.act_as(user.clone());
        Ok(AuthResponse {
            access_token: format!("token-{}", user.id),
            token_type: "bearer".into(),
            user,
        })
    }

    async fn register(&self, registration: &Registration) -> Result<AuthResponse> {
        self.begin(Op::Register, Some(registration.email.as_str()), Value::Null)
            .await?;
        let user = {
            let mut state = self.state.lock();
            if state.users.iter().any(|u| u.email == registration.email) {
                return Err(bad_request("Email already registered"));
            }
            let id = UserId::parse(state.next_id("user"))
                .map_err(|e| ClientError::Parse(e.to_string()))?;
            let user = User {
                id,
                name: registration.name.clone(),
                email: registration.email.clone(),
                role: Role::Agent,
                status: UserStatus::Active,
                last_login: None,
                created_at: Utc::now(),
            };
            state
                .passwords
                .insert(user.email.clone(), registration.password.clone());
            state.users.push(user.clone());
            user
        };
        self.act_as(user.clone());
        Ok(AuthResponse {
            access_token: format!("token-{}", user.id),
            token_type: "bearer".into(),
            user,
        })
    }

    async fn me(&self) -> Result<User> {
        self.begin(Op::Me, None, Value::Null).await?;
        self.acting_user()
    }

    async fn list_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>> {
        self.begin(Op::ListContacts, filter.search.as_deref(), Value::Null)
            .await?;
        let search = search_text(filter.search.as_deref());
        let tag = filter.tag.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let state = self.state.lock();
        Ok(state
            .contacts
            .iter()
            .filter(|c| {
                search.as_deref().map_or(true, |s| {
                    contains_ci(c.name.as_deref(), s)
                        || contains_ci(Some(c.phone_number.as_str()), s)
                        || contains_ci(c.email.as_deref(), s)
                        || contains_ci(c.company.as_deref(), s)
                })
            })
            .filter(|c| tag.map_or(true, |t| c.tags.contains(t)))
            .cloned()
            .collect())
    }

    async fn get_contact(&self, id: &ContactId) -> Result<Contact> {
        self.begin(Op::GetContact, Some(id.as_str()), Value::Null).await?;
        self.state
            .lock()
            .contacts
            .iter()
            .find(|c| &c.id == id)
            .cloned()
            .ok_or_else(|| not_found("Contact"))
    }

    async fn find_contact_by_phone(&self, phone_number: &str) -> Result<PhoneLookup> {
        self.begin(Op::FindContactByPhone, Some(phone_number), Value::Null)
            .await?;
        let contact = self
            .state
            .lock()
            .contacts
            .iter()
            .find(|c| c.phone_number == phone_number)
            .cloned();
        Ok(PhoneLookup {
            found: contact.is_some(),
            contact,
        })
    }

    async fn create_contact(&self, contact: &NewContact) -> Result<Contact> {
        self.begin(Op::CreateContact, None, to_body(contact)).await?;
        let mut state = self.state.lock();
        if state
            .contacts
            .iter()
            .any(|c| c.phone_number == contact.phone_number)
        {
            return Err(bad_request("Contact with this phone number already exists"));
        }
        let id = ContactId::parse(state.next_id("contact"))
            .map_err(|e| ClientError::Parse(e.to_string()))?;
        let now = Utc::now();
        let created = Contact {
            id,
            phone_number: contact.phone_number.clone(),
            name: contact.name.clone(),
            email: contact.email.clone(),
            address: contact.address.clone(),
            company: contact.company.clone(),
            tags: contact.tags.clone(),
            created_at: now,
            updated_at: Some(now),
        };
        state.contacts.push(created.clone());
        Ok(created)
    }

    async fn update_contact(&self, id: &ContactId, patch: &ContactPatch) -> Result<Contact> {
        self.begin(Op::UpdateContact, Some(id.as_str()), to_body(patch))
            .await?;
        let mut state = self.state.lock();
        let contact = state
            .contacts
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| not_found("Contact"))?;
        if let Some(phone) = &patch.phone_number {
            contact.phone_number.clone_from(phone);
        }
        if patch.name.is_some() {
            contact.name.clone_from(&patch.name);
        }
        if patch.email.is_some() {
            contact.email.clone_from(&patch.email);
        }
        if patch.address.is_some() {
            contact.address.clone_from(&patch.address);
        }
        if patch.company.is_some() {
            contact.company.clone_from(&patch.company);
        }
        if let Some(tags) = &patch.tags {
            contact.tags.clone_from(tags);
        }
        contact.updated_at = Some(Utc::now());
        Ok(contact.clone())
    }

    async fn delete_contact(&self, id: &ContactId) -> Result<()> {
        self.begin(Op::DeleteContact, Some(id.as_str()), Value::Null)
            .await?;
        let mut state = self.state.lock();
        let before = state.contacts.len();
        state.contacts.retain(|c| &c.id != id);
        if state.contacts.len() == before {
            return Err(not_found("Contact"));
        }
        Ok(())
    }

    async fn create_call(
        &self,
        call: &NewCall,
        call_event: Option<&CallEventId>,
    ) -> Result<CallRecord> {
        self.begin(Op::CreateCall, call_event.map(CallEventId::as_str), to_body(call))
            .await?;
        let agent = self.acting_user()?;
        let mut state = self.state.lock();

        let existing = call
            .contact_id
            .as_ref()
            .and_then(|id| state.contacts.iter().find(|c| &c.id == id))
            .or_else(|| {
                state
                    .contacts
                    .iter()
                    .find(|c| c.phone_number == call.caller_number)
            })
            .cloned();
        let contact = if let Some(contact) = existing {
            contact
        } else {
            let id = ContactId::parse(state.next_id("contact"))
                .map_err(|e| ClientError::Parse(e.to_string()))?;
            let now = Utc::now();
            let created = Contact {
                id,
                phone_number: call.caller_number.clone(),
                name: None,
                email: None,
                address: None,
                company: None,
                tags: BTreeSet::new(),
                created_at: now,
                updated_at: Some(now),
            };
            state.contacts.push(created.clone());
            created
        };

        let id = CallId::parse(state.next_id("call"))
            .map_err(|e| ClientError::Parse(e.to_string()))?;
        let mut record = CallRecord {
            id,
            caller_number: call.caller_number.clone(),
            contact_id: Some(contact.id.clone()),
            contact_name: contact.name.clone(),
            agent_id: agent.id,
            agent_name: agent.name,
            duration: call.duration,
            call_type: call.call_type,
            priority: call.priority,
            status: call.status,
            notes: call.notes.clone(),
            resolution_notes: call.resolution_notes.clone(),
            timestamp: Utc::now(),
            freepbx_call_id: None,
        };

        if let Some(event_id) = call_event {
            if let Some(event) = state.events.iter_mut().find(|e| &e.id == event_id) {
                record.freepbx_call_id.clone_from(&event.freepbx_call_id);
                event.processed = true;
            }
        }

        state.calls.push(record.clone());
        Ok(record)
    }

    async fn list_calls(&self, filter: &CallFilter) -> Result<Vec<CallRecord>> {
        self.begin(Op::ListCalls, filter.search.as_deref(), Value::Null)
            .await?;
        let search = search_text(filter.search.as_deref());
        let state = self.state.lock();
        Ok(state
            .calls
            .iter()
            .rev()
            .filter(|c| {
                search.as_deref().map_or(true, |s| {
                    contains_ci(Some(c.caller_number.as_str()), s)
                        || contains_ci(c.contact_name.as_deref(), s)
                        || contains_ci(c.notes.as_deref(), s)
                })
            })
            .filter(|c| filter.call_type.map_or(true, |t| c.call_type == t))
            .filter(|c| filter.priority.map_or(true, |p| c.priority == p))
            .filter(|c| filter.status.map_or(true, |s| c.status == s))
            .cloned()
            .collect())
    }

    async fn get_call(&self, id: &CallId) -> Result<CallRecord> {
        self.begin(Op::GetCall, Some(id.as_str()), Value::Null).await?;
        self.state
            .lock()
            .calls
            .iter()
            .find(|c| &c.id == id)
            .cloned()
            .ok_or_else(|| not_found("Call"))
    }

    async fn update_call(&self, id: &CallId, patch: &CallPatch) -> Result<CallRecord> {
        self.begin(Op::UpdateCall, Some(id.as_str()), to_body(patch))
            .await?;
        let mut state = self.state.lock();
        let call = state
            .calls
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| not_found("Call"))?;
        if let Some(duration) = patch.duration {
            call.duration = duration;
        }
        if patch.notes.is_some() {
            call.notes.clone_from(&patch.notes);
        }
        if let Some(call_type) = patch.call_type {
            call.call_type = call_type;
        }
        if let Some(priority) = patch.priority {
            call.priority = priority;
        }
        if let Some(status) = patch.status {
            call.status = status;
        }
        if patch.resolution_notes.is_some() {
            call.resolution_notes.clone_from(&patch.resolution_notes);
        }
        Ok(call.clone())
    }

    async fn call_stats(&self) -> Result<CallStats> {
        self.begin(Op::CallStats, None, Value::Null).await?;
        let state = self.state.lock();
        let now = Utc::now();
        let today = now.date_naive();
        let week_ago = now - ChronoDuration::days(7);

        let mut stats = CallStats {
            total_calls: state.calls.len() as u64,
            ..CallStats::default()
        };
        let mut total_duration = 0u64;
        for call in &state.calls {
            if call.timestamp.date_naive() == today {
                stats.calls_today += 1;
            }
            if call.timestamp >= week_ago {
                stats.calls_this_week += 1;
            }
            *stats
                .calls_by_type
                .entry(call.call_type.as_str().to_string())
                .or_default() += 1;
            *stats
                .calls_by_priority
                .entry(call.priority.as_str().to_string())
                .or_default() += 1;
            *stats
                .calls_by_status
                .entry(call.status.as_str().to_string())
                .or_default() += 1;
            total_duration += u64::from(call.duration);
        }
        if !state.calls.is_empty() {
            #[allow(clippy::cast_precision_loss)]
            let avg = total_duration as f64 / state.calls.len() as f64;
            stats.avg_duration = avg;
        }
        Ok(stats)
    }

    async fn export_calls_csv(&self, filter: &CallFilter) -> Result<Vec<u8>> {
        self.begin(Op::ExportCalls, None, Value::Null).await?;
        let state = self.state.lock();
        let mut out = String::from(
            "ID,Caller Number,Contact Name,Agent,Duration (s),Call Type,Priority,Status,Notes,Resolution Notes,Timestamp\n",
        );
        for call in state
            .calls
            .iter()
            .rev()
            .filter(|c| filter.call_type.map_or(true, |t| c.call_type == t))
            .filter(|c| filter.priority.map_or(true, |p| c.priority == p))
            .filter(|c| filter.status.map_or(true, |s| c.status == s))
        {
            let _ = writeln!(
                out,
                "{},{},{},{},{},{},{},{},{},{},{}",
                csv_field(call.id.as_str()),
                csv_field(&call.caller_number),
                csv_field(call.contact_name.as_deref().unwrap_or("")),
                csv_field(&call.agent_name),
                call.duration,
                call.call_type,
                call.priority,
                call.status,
                csv_field(call.notes.as_deref().unwrap_or("")),
                csv_field(call.resolution_notes.as_deref().unwrap_or("")),
                call.timestamp.to_rfc3339(),
            );
        }
        Ok(out.into_bytes())
    }

    async fn pending_events(&self) -> Result<Vec<CallEvent>> {
        self.begin(Op::PendingEvents, None, Value::Null).await?;
        let agent = self.acting_user()?;
        let state = self.state.lock();
        Ok(state
            .events
            .iter()
            .rev()
            .filter(|e| !e.processed)
            .filter(|e| {
                agent.role != Role::Agent || e.agent_id.as_ref().map_or(true, |a| *a == agent.id)
            })
            .take(10)
            .cloned()
            .collect())
    }

    async fn get_event(&self, id: &CallEventId) -> Result<CallEvent> {
        self.begin(Op::GetEvent, Some(id.as_str()), Value::Null).await?;
        self.state
            .lock()
            .events
            .iter()
            .find(|e| &e.id == id)
            .cloned()
            .ok_or_else(|| not_found("Call event"))
    }

    async fn mark_event_processed(&self, id: &CallEventId) -> Result<()> {
        self.begin(Op::MarkEventProcessed, Some(id.as_str()), Value::Null)
            .await?;
        let mut state = self.state.lock();
        let event = state
            .events
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| not_found("Call event"))?;
        event.processed = true;
        Ok(())
    }

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>> {
        self.begin(Op::ListUsers, filter.search.as_deref(), Value::Null)
            .await?;
        let search = search_text(filter.search.as_deref());
        let state = self.state.lock();
        Ok(state
            .users
            .iter()
            .filter(|u| {
                search.as_deref().map_or(true, |s| {
                    contains_ci(Some(u.name.as_str()), s) || contains_ci(Some(u.email.as_str()), s)
                })
            })
            .filter(|u| filter.role.map_or(true, |r| u.role == r))
            .filter(|u| filter.status.map_or(true, |st| u.status == st))
            .cloned()
            .collect())
    }

    async fn get_user(&self, id: &UserId) -> Result<User> {
        self.begin(Op::GetUser, Some(id.as_str()), Value::Null).await?;
        self.state
            .lock()
            .users
            .iter()
            .find(|u| &u.id == id)
            .cloned()
            .ok_or_else(|| not_found("User"))
    }

    async fn create_user(&self, user: &NewUser) -> Result<User> {
        #[derive(Serialize)]
        struct Redacted<'a> {
            email: &'a str,
            name: &'a str,
            role: Role,
        }
        let body = Redacted {
            email: &user.email,
            name: &user.name,
            role: user.role,
        };
        self.begin(Op::CreateUser, None, to_body(&body)).await?;

        let mut state = self.state.lock();
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(bad_request("Email already registered"));
        }
        let id =
            UserId::parse(state.next_id("user")).map_err(|e| ClientError::Parse(e.to_string()))?;
        let created = User {
            id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            status: UserStatus::Active,
            last_login: None,
            created_at: Utc::now(),
        };
        state
            .passwords
            .insert(user.email.clone(), user.password.clone());
        state.users.push(created.clone());
        Ok(created)
    }

    async fn update_user(&self, id: &UserId, patch: &UserPatch) -> Result<User> {
        self.begin(Op::UpdateUser, Some(id.as_str()), to_body(patch))
            .await?;
        let acting = self.acting_user_id();
        let mut state = self.state.lock();
        let user = state
            .users
            .iter_mut()
            .find(|u| &u.id == id)
            .ok_or_else(|| not_found("User"))?;
        if acting.as_ref() == Some(id) {
            if patch.role.is_some_and(|r| r != user.role) {
                return Err(bad_request("Cannot change your own role"));
            }
            if patch.status == Some(UserStatus::Inactive) {
                return Err(bad_request("Cannot deactivate your own account"));
            }
        }
        if let Some(name) = &patch.name {
            user.name.clone_from(name);
        }
        if let Some(email) = &patch.email {
            user.email.clone_from(email);
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(status) = patch.status {
            user.status = status;
        }
        Ok(user.clone())
    }

    async fn delete_user(&self, id: &UserId) -> Result<()> {
        self.begin(Op::DeleteUser, Some(id.as_str()), Value::Null).await?;
        if self.acting_user_id().as_ref() == Some(id) {
            return Err(bad_request("Cannot delete your own account"));
        }
        let mut state = self.state.lock();
        let before = state.users.len();
        state.users.retain(|u| &u.id != id);
        if state.users.len() == before {
            return Err(not_found("User"));
        }
        Ok(())
    }

    async fn reset_password(&self, id: &UserId, reset: &PasswordReset) -> Result<()> {
        self.begin(Op::ResetPassword, Some(id.as_str()), Value::Null)
            .await?;
        if reset.new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(bad_request("Password must be at least 6 characters"));
        }
        let mut state = self.state.lock();
        let email = state
            .users
            .iter()
            .find(|u| &u.id == id)
            .map(|u| u.email.clone())
            .ok_or_else(|| not_found("User"))?;
        state.passwords.insert(email, reset.new_password.clone());
        Ok(())
    }

    async fn admin_stats(&self) -> Result<AdminStats> {
        self.begin(Op::AdminStats, None, Value::Null).await?;
        let state = self.state.lock();
        let week_ago = Utc::now() - ChronoDuration::days(7);

        let mut stats = AdminStats::default();
        stats.users.total = state.users.len() as u64;
        stats.users.active = state
            .users
            .iter()
            .filter(|u| u.status == UserStatus::Active)
            .count() as u64;
        for role in Role::ALL {
            let count = state.users.iter().filter(|u| u.role == role).count() as u64;
            stats.users.by_role.insert(role.as_str().to_string(), count);
        }
        stats.contacts.total = state.contacts.len() as u64;
        stats.calls.total = state.calls.len() as u64;
        stats.calls.last_7_days = state
            .calls
            .iter()
            .filter(|c| c.timestamp >= week_ago)
            .count() as u64;
        Ok(stats)
    }
}

/// Builders for realistic test entities.
pub mod fixtures {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use helpline_core::{
        CallEvent, CallEventId, Contact, ContactId, Role, User, UserId, UserStatus,
    };

    /// A contact with a name and no other details.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a valid identifier.
    #[must_use]
    pub fn contact(id: &str, phone_number: &str, name: Option<&str>) -> Contact {
        Contact {
            id: ContactId::parse(id).expect("fixture contact id"),
            phone_number: phone_number.to_string(),
            name: name.map(str::to_string),
            email: None,
            address: None,
            company: None,
            tags: BTreeSet::new(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// An active account.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a valid identifier.
    #[must_use]
    pub fn user(id: &str, name: &str, role: Role) -> User {
        User {
            id: UserId::parse(id).expect("fixture user id"),
            name: name.to_string(),
            email: format!("{}@helpline.test", name.to_lowercase().replace(' ', ".")),
            role,
            status: UserStatus::Active,
            last_login: None,
            created_at: Utc::now(),
        }
    }

    /// An unprocessed inbound call event.
    ///
    /// # Panics
    ///
    /// Panics if an id is not a valid identifier.
    #[must_use]
    pub fn event(id: &str, phone_number: &str, contact_id: Option<&str>) -> CallEvent {
        let suggested_contact_id =
            contact_id.map(|c| ContactId::parse(c).expect("fixture contact id"));
        let redirect_url = match &suggested_contact_id {
            Some(c) => format!("/calls/new?contact={c}&phone={phone_number}&callEventId={id}"),
            None => format!("/contacts/new?phone={phone_number}&callEventId={id}"),
        };
        CallEvent {
            id: CallEventId::parse(id).expect("fixture event id"),
            phone_number: phone_number.to_string(),
            contact_exists: suggested_contact_id.is_some(),
            suggested_contact_id,
            processed: false,
            freepbx_call_id: Some(format!("pbx-{id}")),
            agent_id: None,
            agent_extension: None,
            event_type: "call_answered".to_string(),
            redirect_url,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpline_core::{CallType, Priority};

    fn gateway() -> RecordingGateway {
        let gw = RecordingGateway::new();
        gw.act_as(fixtures::user("u-1", "Ana Agent", Role::Agent));
        gw
    }

    #[tokio::test]
    async fn create_call_finds_contact_by_phone() {
        let gw = gateway();
        gw.add_contact(fixtures::contact("42", "+15551234567", Some("Jane Caller")));

        let record = gw
            .create_call(
                &NewCall {
                    caller_number: "+15551234567".into(),
                    ..NewCall::default()
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(record.contact_id.unwrap().as_str(), "42");
        assert_eq!(record.contact_name.as_deref(), Some("Jane Caller"));
        assert_eq!(gw.contacts().len(), 1);
    }

    #[tokio::test]
    async fn create_call_auto_creates_contact() {
        let gw = gateway();
        let record = gw
            .create_call(
                &NewCall {
                    caller_number: "+15550000000".into(),
                    call_type: CallType::Complaint,
                    priority: Priority::Urgent,
                    ..NewCall::default()
                },
                None,
            )
            .await
            .unwrap();

        let contacts = gw.contacts();
        assert_eq!(contacts.len(), 1);
        assert_eq!(Some(&contacts[0].id), record.contact_id.as_ref());
        assert!(contacts[0].name.is_none());
    }

    #[tokio::test]
    async fn create_call_links_event() {
        let gw = gateway();
        gw.add_event(fixtures::event("900", "+15551234567", None));
        let event_id = CallEventId::parse("900").unwrap();

        let record = gw
            .create_call(
                &NewCall {
                    caller_number: "+15551234567".into(),
                    ..NewCall::default()
                },
                Some(&event_id),
            )
            .await
            .unwrap();

        assert_eq!(record.freepbx_call_id.as_deref(), Some("pbx-900"));
        assert!(gw.events()[0].processed);
        assert_eq!(
            gw.requests_for(Op::CreateCall)[0].target.as_deref(),
            Some("900")
        );
    }

    #[tokio::test]
    async fn queued_failure_applies_once() {
        let gw = gateway();
        gw.fail_next(Op::CallStats, 500, None);

        assert!(matches!(
            gw.call_stats().await,
            Err(ClientError::Api { status: 500, .. })
        ));
        assert!(gw.call_stats().await.is_ok());
        assert_eq!(gw.count(Op::CallStats), 2);
    }

    #[tokio::test]
    async fn injected_unauthorized_expires_attached_session() {
        let gw = gateway();
        let session = SessionContext::signed_in(crate::session::Session {
            token: "tok".into(),
            user: fixtures::user("u-1", "Ana Agent", Role::Agent),
        });
        gw.attach_session(session.clone());
        gw.fail_next(Op::ListCalls, 401, None);

        let err = gw.list_calls(&CallFilter::default()).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn duplicate_phone_is_rejected() {
        let gw = gateway();
        gw.add_contact(fixtures::contact("42", "+15551234567", None));
        let err = gw
            .create_contact(&NewContact {
                phone_number: "+15551234567".into(),
                ..NewContact::default()
            })
            .await
            .unwrap_err();
        assert_eq!(
            err.user_message("x"),
            "Contact with this phone number already exists"
        );
    }

    #[tokio::test]
    async fn stats_aggregate_calls() {
        let gw = gateway();
        for (duration, priority) in [(60, Priority::High), (120, Priority::High), (0, Priority::Low)] {
            gw.create_call(
                &NewCall {
                    caller_number: "+15551234567".into(),
                    duration,
                    priority,
                    ..NewCall::default()
                },
                None,
            )
            .await
            .unwrap();
        }

        let stats = gw.call_stats().await.unwrap();
        assert_eq!(stats.total_calls, 3);
        assert_eq!(stats.calls_today, 3);
        assert_eq!(stats.calls_by_priority["high"], 2);
        assert!((stats.avg_duration - 60.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn export_quotes_fields() {
        let gw = gateway();
        gw.create_call(
            &NewCall {
                caller_number: "+15551234567".into(),
                notes: Some("said \"hi\", hung up".into()),
                ..NewCall::default()
            },
            None,
        )
        .await
        .unwrap();

        let csv = String::from_utf8(gw.export_calls_csv(&CallFilter::default()).await.unwrap())
            .unwrap();
        assert!(csv.starts_with("ID,Caller Number,Contact Name,Agent,Duration (s)"));
        assert!(csv.contains("\"said \"\"hi\"\", hung up\""));
    }
}
