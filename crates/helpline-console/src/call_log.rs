//! Call logging with contact resolution and telephony-event correlation.
//!
//! A [`CallLogFlow`] is built in one of two modes that never change:
//!
//! - **Manual**: the agent types a caller number and looks it up.
//! - **Redirected**: a telephony redirect pre-fills and locks the caller
//!   number, starts the stopwatch and resolves the suggested contact.
//!
//! [`CallLogFlow::submit`] creates the call record, optionally saves new
//! contact details, and acknowledges the telephony event. Only the call
//! creation decides success; the follow-ups are best effort.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use helpline_client::{Gateway, SessionContext};
use helpline_core::{
    non_blank, parse_duration, Action, CallEventId, CallRecord, CallStatus, CallType,
    Contact, ContactId, ContactPatch, NewCall, PhoneLookup, Priority,
};
use parking_lot::Mutex;

use crate::entry::RedirectEntry;
use crate::error::{require, FlowError, Result};
use crate::nav::Route;
use crate::resolution::{ContactResolution, ResolutionPhase};
use crate::stopwatch::Stopwatch;

/// Fallback shown when call creation fails without a server message.
pub const LOG_CALL_FALLBACK: &str = "Failed to log call";

/// How the flow was entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryMode {
    /// Agent-driven entry.
    Manual,
    /// Entered from a telephony redirect.
    Redirected(RedirectEntry),
}

impl EntryMode {
    /// The telephony event to acknowledge, if any.
    #[must_use]
    pub const fn call_event_id(&self) -> Option<&CallEventId> {
        match self {
            Self::Manual => None,
            Self::Redirected(entry) => entry.call_event_id.as_ref(),
        }
    }
}

/// Editable call details.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallForm {
    /// Call type.
    pub call_type: CallType,
    /// Priority.
    pub priority: Priority,
    /// Status.
    pub status: CallStatus,
    /// Free-text notes.
    pub notes: String,
    /// Resolution notes.
    pub resolution_notes: String,
}

/// Optional details for a caller with no contact record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewContactDetails {
    /// Name.
    pub name: String,
    /// Email.
    pub email: String,
    /// Company.
    pub company: String,
    /// Address.
    pub address: String,
}

impl NewContactDetails {
    /// Returns `true` if every field is blank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        [&self.name, &self.email, &self.company, &self.address]
            .iter()
            .all(|v| v.trim().is_empty())
    }

    /// Patch carrying only the supplied fields.
    #[must_use]
    pub fn to_patch(&self) -> ContactPatch {
        ContactPatch {
            name: non_blank(Some(self.name.as_str())),
            email: non_blank(Some(self.email.as_str())),
            company: non_blank(Some(self.company.as_str())),
            address: non_blank(Some(self.address.as_str())),
            ..ContactPatch::default()
        }
    }
}

/// Result of a successful submission.
#[derive(Debug, Clone)]
pub struct CallLogged {
    /// The created record.
    pub call: CallRecord,
    /// Message if saving the new contact details failed.
    pub contact_update_error: Option<String>,
    /// Whether the telephony event was acknowledged; `None` without an event.
    pub event_acknowledged: Option<bool>,
    /// Where the console goes next.
    pub next: Route,
}

#[derive(Debug, Default)]
struct State {
    caller_number: String,
    resolution: ContactResolution,
    lookup_generation: u64,
    stopwatch: Stopwatch,
    manual_duration: String,
    form: CallForm,
    new_contact: NewContactDetails,
    last_error: Option<String>,
}

impl State {
    fn final_duration(&self) -> Result<u32> {
        let elapsed = self.stopwatch.elapsed_secs();
        if elapsed > 0 {
            return Ok(u32::try_from(elapsed).unwrap_or(u32::MAX));
        }
        parse_duration(&self.manual_duration)
            .map_err(|e| FlowError::validation(format!("Invalid duration: {e}")))
    }
}

/// Clears the in-flight flag when a submission ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| FlowError::Busy)?;
        Ok(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The call logging screen.
pub struct CallLogFlow {
    gateway: Arc<dyn Gateway>,
    session: SessionContext,
    mode: EntryMode,
    state: Mutex<State>,
    submitting: AtomicBool,
}

impl std::fmt::Debug for CallLogFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallLogFlow")
            .field("mode", &self.mode)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl CallLogFlow {
    /// Open the screen for manual entry.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::NotAuthenticated` or `FlowError::Forbidden` if the
    /// session may not log calls.
    pub fn manual(gateway: Arc<dyn Gateway>, session: SessionContext) -> Result<Self> {
        require(&session, Action::LogCall)?;
        Ok(Self {
            gateway,
            session,
            mode: EntryMode::Manual,
            state: Mutex::new(State::default()),
            submitting: AtomicBool::new(false),
        })
    }

    /// Open the screen from a telephony redirect.
    ///
    /// The caller number is locked and the stopwatch starts. When the
    /// redirect names a contact, it is resolved by ID, falling back to the
    /// phone number if the ID no longer exists; otherwise the number is
    /// looked up. A failed resolution leaves the flow usable in the
    /// `Unknown` phase.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::NotAuthenticated` or `FlowError::Forbidden` if the
    /// session may not log calls.
    pub async fn redirected(
        gateway: Arc<dyn Gateway>,
        session: SessionContext,
        entry: RedirectEntry,
    ) -> Result<Self> {
        require(&session, Action::LogCall)?;
        let contact_id = entry.contact_id.clone();
        let mut state = State {
            caller_number: entry.phone.trim().to_string(),
            ..State::default()
        };
        state.stopwatch.start();

        tracing::info!(
            caller_number = %state.caller_number,
            call_event_id = ?entry.call_event_id,
            "Call logging opened from telephony redirect"
        );

        let flow = Self {
            gateway,
            session,
            mode: EntryMode::Redirected(entry),
            state: Mutex::new(state),
            submitting: AtomicBool::new(false),
        };

        if let Some(id) = contact_id {
            if let Err(e) = flow.resolve_by_id(&id).await {
                tracing::warn!(contact_id = %id, error = %e, "Could not resolve redirected contact");
            }
        } else if !flow.caller_number().is_empty() {
            if let Err(e) = flow.lookup().await {
                tracing::warn!(error = %e, "Could not look up redirected caller");
            }
        }
        Ok(flow)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// How the flow was entered.
    #[must_use]
    pub const fn mode(&self) -> &EntryMode {
        &self.mode
    }

    /// Returns `true` if the caller number cannot be edited.
    #[must_use]
    pub const fn is_caller_number_locked(&self) -> bool {
        matches!(self.mode, EntryMode::Redirected(_))
    }

    /// The caller number.
    #[must_use]
    pub fn caller_number(&self) -> String {
        self.state.lock().caller_number.clone()
    }

    /// Current resolution state.
    #[must_use]
    pub fn resolution(&self) -> ContactResolution {
        self.state.lock().resolution.clone()
    }

    /// Current resolution phase.
    #[must_use]
    pub fn phase(&self) -> ResolutionPhase {
        self.state.lock().resolution.phase()
    }

    /// The resolved contact's profile, read-only.
    #[must_use]
    pub fn contact(&self) -> Option<Contact> {
        self.state.lock().resolution.contact().cloned()
    }

    /// Current call details.
    #[must_use]
    pub fn form(&self) -> CallForm {
        self.state.lock().form.clone()
    }

    /// Current new-contact details.
    #[must_use]
    pub fn new_contact_details(&self) -> NewContactDetails {
        self.state.lock().new_contact.clone()
    }

    /// The manual duration text.
    #[must_use]
    pub fn manual_duration(&self) -> String {
        self.state.lock().manual_duration.clone()
    }

    /// The last submission error, kept until the next successful submit.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    /// Returns `true` while a submission is in flight.
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    /// Returns `true` if submitting is currently possible.
    #[must_use]
    pub fn can_submit(&self) -> bool {
        let state = self.state.lock();
        !self.is_submitting()
            && !state.stopwatch.is_running()
            && !state.caller_number.trim().is_empty()
    }

    // =========================================================================
    // Caller number and resolution
    // =========================================================================

    /// Change the caller number, resetting resolution to `Unknown`.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Validation` in redirected mode, where the number
    /// is locked.
    pub fn set_caller_number(&self, number: &str) -> Result<()> {
        if self.is_caller_number_locked() {
            return Err(FlowError::validation(
                "Caller number is set by the incoming call and cannot be changed",
            ));
        }
        let mut state = self.state.lock();
        if state.caller_number == number {
            return Ok(());
        }
        state.caller_number = number.to_string();
        state.lookup_generation += 1;
        state.resolution = ContactResolution::Unknown;
        state.new_contact = NewContactDetails::default();
        Ok(())
    }

    /// Look the caller number up.
    ///
    /// Ends in `Found` or `NotFound`. A failed request returns to `Unknown`.
    /// If the caller number changes while the lookup is in flight, the
    /// result is discarded.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Validation` if the caller number is empty,
    /// `FlowError::InvalidTransition` if a lookup is already running, or
    /// `FlowError::Remote` if the request failed.
    pub async fn lookup(&self) -> Result<ResolutionPhase> {
        let (phone, generation) = self.begin_lookup()?;
        let outcome = self.gateway.find_contact_by_phone(&phone).await;
        self.finish_lookup(generation, outcome.map(PhoneLookup::into_contact))
    }

    async fn resolve_by_id(&self, id: &ContactId) -> Result<ResolutionPhase> {
        let (phone, generation) = self.begin_lookup()?;
        let outcome = match self.gateway.get_contact(id).await {
            Ok(contact) => Ok(Some(contact)),
            Err(e) if e.is_not_found() => {
                tracing::debug!(contact_id = %id, "Redirected contact missing, looking up by phone");
                self.gateway
                    .find_contact_by_phone(&phone)
                    .await
                    .map(PhoneLookup::into_contact)
            }
            Err(e) => Err(e),
        };
        self.finish_lookup(generation, outcome)
    }

    fn begin_lookup(&self) -> Result<(String, u64)> {
        let mut state = self.state.lock();
        let phone = state.caller_number.trim().to_string();
        if phone.is_empty() {
            return Err(FlowError::validation("Enter a phone number to search"));
        }
        state.resolution.advance(ContactResolution::Searching)?;
        Ok((phone, state.lookup_generation))
    }

    fn finish_lookup(
        &self,
        generation: u64,
        outcome: helpline_client::Result<Option<Contact>>,
    ) -> Result<ResolutionPhase> {
        let mut state = self.state.lock();
        if state.lookup_generation != generation {
            tracing::debug!("Caller number changed during lookup, discarding result");
            return Ok(state.resolution.phase());
        }
        match outcome {
            Ok(Some(contact)) => {
                tracing::debug!(contact_id = %contact.id, "Caller resolved");
                state.resolution.advance(ContactResolution::Found(contact))?;
            }
            Ok(None) => {
                state.resolution.advance(ContactResolution::NotFound)?;
            }
            Err(e) => {
                state.resolution.advance(ContactResolution::Unknown)?;
                return Err(FlowError::remote(&e, "Failed to look up contact"));
            }
        }
        Ok(state.resolution.phase())
    }

    // =========================================================================
    // Duration
    // =========================================================================

    /// Start the stopwatch. Clears any manual duration.
    pub fn start_stopwatch(&self) {
        let mut state = self.state.lock();
        state.manual_duration.clear();
        state.stopwatch.start();
    }

    /// Stop the stopwatch, keeping its value.
    pub fn stop_stopwatch(&self) {
        self.state.lock().stopwatch.stop();
    }

    /// Stop the stopwatch and return it to zero.
    pub fn reset_stopwatch(&self) {
        self.state.lock().stopwatch.reset();
    }

    /// Seconds on the stopwatch.
    #[must_use]
    pub fn elapsed_secs(&self) -> u64 {
        self.state.lock().stopwatch.elapsed_secs()
    }

    /// Returns `true` while the stopwatch runs.
    #[must_use]
    pub fn is_stopwatch_running(&self) -> bool {
        self.state.lock().stopwatch.is_running()
    }

    /// Returns `true` if a duration may be typed in.
    #[must_use]
    pub fn manual_duration_enabled(&self) -> bool {
        self.state.lock().stopwatch.is_idle()
    }

    /// Set the duration by hand, as seconds or `m:ss`.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Validation` if the stopwatch is running or
    /// non-zero, or the text is not a valid duration.
    pub fn set_manual_duration(&self, text: &str) -> Result<()> {
        let mut state = self.state.lock();
        if !state.stopwatch.is_idle() {
            return Err(FlowError::validation(
                "Duration comes from the timer; reset it to enter a duration by hand",
            ));
        }
        parse_duration(text).map_err(|e| FlowError::validation(format!("Invalid duration: {e}")))?;
        state.manual_duration = text.trim().to_string();
        Ok(())
    }

    /// The duration that would be submitted now.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Validation` if the manual duration is invalid.
    pub fn final_duration(&self) -> Result<u32> {
        self.state.lock().final_duration()
    }

    // =========================================================================
    // Details
    // =========================================================================

    /// Edit the call details.
    pub fn edit_form(&self, edit: impl FnOnce(&mut CallForm)) {
        edit(&mut self.state.lock().form);
    }

    /// Supply details for a caller with no contact record.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Validation` unless resolution is `NotFound`.
    pub fn set_new_contact_details(&self, details: NewContactDetails) -> Result<()> {
        let mut state = self.state.lock();
        if state.resolution.phase() != ResolutionPhase::NotFound {
            return Err(FlowError::validation(
                "New contact details apply only when no contact matches",
            ));
        }
        state.new_contact = details;
        Ok(())
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Log the call.
    ///
    /// On failure of the call creation every form value is kept and the
    /// error is also available from [`Self::last_error`].
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Busy` while another submission is in flight,
    /// `FlowError::Validation` for local input problems, or
    /// `FlowError::Remote` if the call record could not be created.
    pub async fn submit(&self) -> Result<CallLogged> {
        let _in_flight = InFlight::acquire(&self.submitting)?;
        require(&self.session, Action::LogCall)?;

        let (request, contact_details) = {
            let state = self.state.lock();
            let caller_number = state.caller_number.trim().to_string();
            if caller_number.is_empty() {
                return Err(FlowError::validation("Caller number is required"));
            }
            if state.stopwatch.is_running() {
                return Err(FlowError::validation("Stop the timer before saving the call"));
            }
            let duration = state.final_duration()?;

            let request = NewCall {
                caller_number,
                duration,
                call_type: state.form.call_type,
                priority: state.form.priority,
                status: state.form.status,
                notes: non_blank(Some(state.form.notes.as_str())),
                resolution_notes: non_blank(Some(state.form.resolution_notes.as_str())),
                contact_id: state.resolution.contact().map(|c| c.id.clone()),
            };
            let contact_details = (state.resolution.phase() == ResolutionPhase::NotFound
                && !state.new_contact.is_empty())
            .then(|| state.new_contact.to_patch());
            (request, contact_details)
        };
        let call_event_id = self.mode.call_event_id();

        let call = match self.gateway.create_call(&request, call_event_id).await {
            Ok(call) => call,
            Err(e) => {
                let err = FlowError::remote(&e, LOG_CALL_FALLBACK);
                tracing::warn!(
                    caller_number = %request.caller_number,
                    error = %e,
                    "Failed to log call"
                );
                self.state.lock().last_error = Some(err.to_string());
                return Err(err);
            }
        };
        tracing::info!(
            call_id = %call.id,
            caller_number = %call.caller_number,
            duration = call.duration,
            "Call logged"
        );

        let mut contact_update_error = None;
        if let Some(patch) = contact_details {
            match &call.contact_id {
                Some(contact_id) => {
                    if let Err(e) = self.gateway.update_contact(contact_id, &patch).await {
                        tracing::warn!(contact_id = %contact_id, error = %e, "Failed to save contact details");
                        contact_update_error = Some(e.user_message("Failed to save contact details"));
                    }
                }
                None => {
                    tracing::warn!(call_id = %call.id, "Call has no contact; contact details not saved");
                }
            }
        }

        let event_acknowledged = match call_event_id {
            Some(event_id) => match self.gateway.mark_event_processed(event_id).await {
                Ok(()) => Some(true),
                Err(e) => {
                    tracing::warn!(call_event_id = %event_id, error = %e, "Failed to mark call event processed");
                    Some(false)
                }
            },
            None => None,
        };

        {
            let mut state = self.state.lock();
            state.stopwatch.stop();
            state.last_error = None;
        }

        Ok(CallLogged {
            call,
            contact_update_error,
            event_acknowledged,
            next: Route::Calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpline_client::mock::fixtures;
    use helpline_client::{Op, RecordingGateway, Session};
    use helpline_core::Role;

    fn setup() -> (Arc<RecordingGateway>, SessionContext) {
        let agent = fixtures::user("u-1", "Ana Agent", Role::Agent);
        let gateway = Arc::new(RecordingGateway::new());
        gateway.act_as(agent.clone());
        let session = SessionContext::signed_in(Session {
            token: "tok".into(),
            user: agent,
        });
        gateway.attach_session(session.clone());
        (gateway, session)
    }

    fn manual_flow(gateway: &Arc<RecordingGateway>, session: &SessionContext) -> CallLogFlow {
        CallLogFlow::manual(gateway.clone(), session.clone()).unwrap()
    }

    #[tokio::test]
    async fn empty_caller_number_is_rejected_locally() {
        let (gateway, session) = setup();
        let flow = manual_flow(&gateway, &session);

        let err = flow.submit().await.unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
        assert!(gateway.requests().is_empty());
    }

    #[tokio::test]
    async fn lookup_found_then_edit_resets() {
        let (gateway, session) = setup();
        gateway.add_contact(fixtures::contact("42", "+15551234567", Some("Jane Caller")));
        let flow = manual_flow(&gateway, &session);

        flow.set_caller_number("+15551234567").unwrap();
        assert_eq!(flow.lookup().await.unwrap(), ResolutionPhase::Found);
        assert_eq!(flow.contact().unwrap().display_name(), "Jane Caller");

        flow.set_caller_number("+15550000000").unwrap();
        assert_eq!(flow.phase(), ResolutionPhase::Unknown);
        assert!(flow.contact().is_none());
    }

    #[tokio::test]
    async fn repeated_lookups_agree() {
        let (gateway, session) = setup();
        let flow = manual_flow(&gateway, &session);
        flow.set_caller_number("+15550000000").unwrap();

        assert_eq!(flow.lookup().await.unwrap(), ResolutionPhase::NotFound);
        assert_eq!(flow.lookup().await.unwrap(), ResolutionPhase::NotFound);
        assert_eq!(gateway.count(Op::FindContactByPhone), 2);
    }

    #[tokio::test]
    async fn failed_lookup_returns_to_unknown() {
        let (gateway, session) = setup();
        gateway.fail_next(Op::FindContactByPhone, 500, None);
        let flow = manual_flow(&gateway, &session);
        flow.set_caller_number("+15550000000").unwrap();

        let err = flow.lookup().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to look up contact");
        assert_eq!(flow.phase(), ResolutionPhase::Unknown);
    }

    #[tokio::test]
    async fn call_is_logged_after_failed_lookup() {
        let (gateway, session) = setup();
        gateway.fail_next(Op::FindContactByPhone, 503, None);
        let flow = manual_flow(&gateway, &session);
        flow.set_caller_number("+15550000000").unwrap();

        assert!(flow.lookup().await.is_err());
        let logged = flow.submit().await.unwrap();
        assert!(logged.call.contact_id.is_some());
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn lookup_requires_number() {
        let (gateway, session) = setup();
        let flow = manual_flow(&gateway, &session);
        assert!(matches!(
            flow.lookup().await,
            Err(FlowError::Validation(_))
        ));
        assert_eq!(gateway.count(Op::FindContactByPhone), 0);
    }

    #[tokio::test]
    async fn new_contact_details_need_not_found() {
        let (gateway, session) = setup();
        let flow = manual_flow(&gateway, &session);
        let details = NewContactDetails {
            name: "Jane".into(),
            ..NewContactDetails::default()
        };
        assert!(flow.set_new_contact_details(details.clone()).is_err());

        flow.set_caller_number("+15550000000").unwrap();
        flow.lookup().await.unwrap();
        flow.set_new_contact_details(details).unwrap();
    }

    #[tokio::test]
    async fn manual_duration_parses_minutes() {
        let (gateway, session) = setup();
        let flow = manual_flow(&gateway, &session);
        flow.set_caller_number("+15550000000").unwrap();
        flow.set_manual_duration("2:05").unwrap();
        assert_eq!(flow.final_duration().unwrap(), 125);

        assert!(flow.set_manual_duration("1:75").is_err());
        assert_eq!(flow.manual_duration(), "2:05");

        let logged = flow.submit().await.unwrap();
        assert_eq!(logged.call.duration, 125);
        assert_eq!(logged.next, Route::Calls);
        assert_eq!(logged.event_acknowledged, None);
    }

    #[tokio::test(start_paused = true)]
    async fn stopwatch_and_manual_duration_are_exclusive() {
        let (gateway, session) = setup();
        let flow = manual_flow(&gateway, &session);
        flow.set_caller_number("+15550000000").unwrap();

        flow.start_stopwatch();
        assert!(!flow.manual_duration_enabled());
        assert!(flow.set_manual_duration("30").is_err());

        tokio::time::sleep(std::time::Duration::from_millis(3500)).await;
        flow.stop_stopwatch();
        assert!(flow.set_manual_duration("30").is_err());
        assert_eq!(flow.final_duration().unwrap(), 3);

        flow.reset_stopwatch();
        assert!(flow.manual_duration_enabled());
        flow.set_manual_duration("30").unwrap();
        assert_eq!(flow.final_duration().unwrap(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn running_stopwatch_blocks_submit() {
        let (gateway, session) = setup();
        let flow = manual_flow(&gateway, &session);
        flow.set_caller_number("+15550000000").unwrap();
        flow.start_stopwatch();

        assert!(!flow.can_submit());
        assert!(matches!(flow.submit().await, Err(FlowError::Validation(_))));
        assert_eq!(gateway.count(Op::CreateCall), 0);
    }

    #[tokio::test]
    async fn locked_number_in_redirected_mode() {
        let (gateway, session) = setup();
        let flow = CallLogFlow::redirected(
            gateway.clone(),
            session,
            RedirectEntry::new("+15551234567"),
        )
        .await
        .unwrap();

        assert!(flow.is_caller_number_locked());
        assert!(flow.is_stopwatch_running());
        assert!(flow.set_caller_number("+15550000000").is_err());
        assert_eq!(flow.caller_number(), "+15551234567");
        assert_eq!(flow.phase(), ResolutionPhase::NotFound);
    }

    #[tokio::test]
    async fn redirect_without_contact_takes_new_contact_details() {
        let (gateway, session) = setup();
        let entry = RedirectEntry::new("+15559990000")
            .with_call_event(CallEventId::parse("9").unwrap());
        let flow = CallLogFlow::redirected(gateway.clone(), session, entry)
            .await
            .unwrap();

        assert_eq!(flow.phase(), ResolutionPhase::NotFound);
        assert_eq!(gateway.count(Op::GetContact), 0);
        assert_eq!(gateway.count(Op::FindContactByPhone), 1);

        flow.set_new_contact_details(NewContactDetails {
            name: "Jane Newcaller".into(),
            ..NewContactDetails::default()
        })
        .unwrap();
        flow.reset_stopwatch();
        let logged = flow.submit().await.unwrap();

        let updates = gateway.requests_for(Op::UpdateContact);
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].target.as_deref(),
            logged.call.contact_id.as_ref().map(ContactId::as_str)
        );
        assert_eq!(updates[0].body["name"], serde_json::json!("Jane Newcaller"));
    }

    #[tokio::test]
    async fn redirect_lookup_failure_leaves_flow_usable() {
        let (gateway, session) = setup();
        gateway.fail_next(Op::FindContactByPhone, 503, None);
        let entry = RedirectEntry::new("+15559990001");
        let flow = CallLogFlow::redirected(gateway.clone(), session, entry)
            .await
            .unwrap();

        assert_eq!(flow.phase(), ResolutionPhase::Unknown);
        flow.reset_stopwatch();
        assert!(flow.submit().await.is_ok());
    }

    #[tokio::test]
    async fn redirected_missing_contact_falls_back_to_phone() {
        let (gateway, session) = setup();
        gateway.add_contact(fixtures::contact("77", "+15551234567", Some("Jane Caller")));
        let entry = RedirectEntry::new("+15551234567").with_contact(ContactId::parse("42").unwrap());

        let flow = CallLogFlow::redirected(gateway.clone(), session, entry)
            .await
            .unwrap();

        assert_eq!(flow.phase(), ResolutionPhase::Found);
        assert_eq!(flow.contact().unwrap().id.as_str(), "77");
        assert_eq!(gateway.count(Op::GetContact), 1);
        assert_eq!(gateway.count(Op::FindContactByPhone), 1);
    }

    #[tokio::test]
    async fn concurrent_submit_is_refused() {
        let (gateway, session) = setup();
        gateway.delay(Op::CreateCall, std::time::Duration::from_millis(200));
        let flow = Arc::new(manual_flow(&gateway, &session));
        flow.set_caller_number("+15550000000").unwrap();

        let first = {
            let flow = Arc::clone(&flow);
            tokio::spawn(async move { flow.submit().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(flow.is_submitting());
        assert!(matches!(flow.submit().await, Err(FlowError::Busy)));

        first.await.unwrap().unwrap();
        assert!(!flow.is_submitting());
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn supervisor_can_log_but_signed_out_cannot() {
        let (gateway, _) = setup();
        let supervisor = SessionContext::signed_in(Session {
            token: "tok".into(),
            user: fixtures::user("u-2", "Sam Supervisor", Role::Supervisor),
        });
        assert!(CallLogFlow::manual(gateway.clone(), supervisor).is_ok());

        let (signed_out, _writer) =
            SessionContext::new(Arc::new(helpline_client::MemorySessionStore::new()));
        assert!(matches!(
            CallLogFlow::manual(gateway, signed_out),
            Err(FlowError::NotAuthenticated)
        ));
    }
}
