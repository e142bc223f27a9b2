//! End-to-end call logging scenarios against the recording gateway and a
//! wiremock-backed HTTP gateway.

use std::sync::Arc;
use std::time::Duration;

use helpline_client::mock::fixtures;
use helpline_client::{
    HttpGateway, MemorySessionStore, Op, RecordingGateway, Session, SessionContext, SessionEvent,
};
use helpline_console::{
    CallLogFlow, ContactDirectory, ContactForm, FlowError, NavigationShell, NewContactDetails,
    Redirect, RedirectEntry, ResolutionPhase, Route,
};
use helpline_core::{CallEventId, CallStatus, ContactId, Priority, Role};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn agent_session(gateway: &RecordingGateway) -> SessionContext {
    let agent = fixtures::user("u-1", "Ana Agent", Role::Agent);
    gateway.act_as(agent.clone());
    let session = SessionContext::signed_in(Session {
        token: "token-u-1".into(),
        user: agent,
    });
    gateway.attach_session(session.clone());
    session
}

#[tokio::test]
async fn new_phone_number_auto_creates_contact() {
    let gateway = Arc::new(RecordingGateway::new());
    let session = agent_session(&gateway);
    let flow = CallLogFlow::manual(gateway.clone(), session).unwrap();

    flow.set_caller_number("+15550001111").unwrap();
    assert_eq!(flow.lookup().await.unwrap(), ResolutionPhase::NotFound);
    flow.set_manual_duration("45").unwrap();
    flow.edit_form(|form| form.notes = "Asked about opening hours".into());

    let logged = flow.submit().await.unwrap();

    let contacts = gateway.contacts();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].phone_number, "+15550001111");
    assert_eq!(logged.call.contact_id.as_ref(), Some(&contacts[0].id));
    assert_eq!(logged.call.duration, 45);
    assert_eq!(logged.next, Route::Calls);
    // No optional details were given, so the contact is left alone.
    assert_eq!(gateway.count(Op::UpdateContact), 0);
    assert_eq!(gateway.count(Op::MarkEventProcessed), 0);
}

#[tokio::test]
async fn found_contact_is_reused() {
    let gateway = Arc::new(RecordingGateway::new());
    gateway.add_contact(fixtures::contact("42", "+15551234567", Some("Jane Caller")));
    let session = agent_session(&gateway);
    let flow = CallLogFlow::manual(gateway.clone(), session).unwrap();

    flow.set_caller_number("+15551234567").unwrap();
    assert_eq!(flow.lookup().await.unwrap(), ResolutionPhase::Found);
    let logged = flow.submit().await.unwrap();

    assert_eq!(logged.call.contact_id.unwrap().as_str(), "42");
    assert_eq!(gateway.contacts().len(), 1);
    let body = &gateway.requests_for(Op::CreateCall)[0].body;
    assert_eq!(body["contact_id"], json!("42"));
}

#[tokio::test(start_paused = true)]
async fn redirected_entry_times_call_and_acknowledges_event() {
    let gateway = Arc::new(RecordingGateway::new());
    gateway.add_contact(fixtures::contact("42", "+15559876543", Some("Jane Caller")));
    gateway.add_event(fixtures::event("900", "+15559876543", Some("42")));
    let session = agent_session(&gateway);

    let redirect =
        Redirect::parse("/calls/new?contact=42&phone=+15559876543&callEventId=900").unwrap();
    assert_eq!(redirect.route, Route::NewCall);
    let flow = CallLogFlow::redirected(gateway.clone(), session, redirect.entry)
        .await
        .unwrap();

    assert!(flow.is_caller_number_locked());
    assert!(flow.is_stopwatch_running());
    assert_eq!(flow.contact().unwrap().display_name(), "Jane Caller");

    tokio::time::sleep(Duration::from_millis(30_500)).await;
    flow.stop_stopwatch();
    flow.edit_form(|form| {
        form.priority = Priority::High;
        form.status = CallStatus::FollowUp;
    });

    let logged = flow.submit().await.unwrap();
    assert_eq!(logged.call.duration, 30);
    assert_eq!(logged.call.contact_id.unwrap().as_str(), "42");
    assert_eq!(logged.call.priority, Priority::High);
    assert_eq!(logged.event_acknowledged, Some(true));

    assert_eq!(gateway.contacts().len(), 1);
    let create = &gateway.requests_for(Op::CreateCall)[0];
    assert_eq!(create.target.as_deref(), Some("900"));
    let acks = gateway.requests_for(Op::MarkEventProcessed);
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].target.as_deref(), Some("900"));
    assert!(gateway.events()[0].processed);
}

#[tokio::test]
async fn create_call_failure_keeps_the_form() {
    let gateway = Arc::new(RecordingGateway::new());
    gateway.fail_next(Op::CreateCall, 500, None);
    let session = agent_session(&gateway);
    let flow = CallLogFlow::manual(gateway.clone(), session).unwrap();

    flow.set_caller_number("+15550002222").unwrap();
    flow.set_manual_duration("1:30").unwrap();
    flow.edit_form(|form| {
        form.notes = "Billing dispute".into();
        form.priority = Priority::Urgent;
    });

    let err = flow.submit().await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to log call");
    assert_eq!(flow.last_error().as_deref(), Some("Failed to log call"));
    assert_eq!(flow.caller_number(), "+15550002222");
    assert_eq!(flow.manual_duration(), "1:30");
    assert_eq!(flow.form().notes, "Billing dispute");
    assert_eq!(flow.form().priority, Priority::Urgent);
    assert!(gateway.calls().is_empty());

    // The agent retries without re-entering anything.
    let logged = flow.submit().await.unwrap();
    assert_eq!(logged.call.duration, 90);
    assert!(flow.last_error().is_none());
}

#[tokio::test]
async fn create_call_failure_shows_server_detail() {
    let gateway = Arc::new(RecordingGateway::new());
    gateway.fail_next(Op::CreateCall, 422, Some("caller_number is invalid"));
    let session = agent_session(&gateway);
    let flow = CallLogFlow::manual(gateway.clone(), session).unwrap();
    flow.set_caller_number("abc").unwrap();

    let err = flow.submit().await.unwrap_err();
    assert_eq!(err.to_string(), "caller_number is invalid");
}

#[tokio::test]
async fn new_contact_details_update_the_returned_contact_once() {
    let gateway = Arc::new(RecordingGateway::new());
    let session = agent_session(&gateway);
    let flow = CallLogFlow::manual(gateway.clone(), session).unwrap();

    flow.set_caller_number("+15550003333").unwrap();
    flow.lookup().await.unwrap();
    flow.set_new_contact_details(NewContactDetails {
        name: "Jane Newcaller".into(),
        company: "Acme".into(),
        ..NewContactDetails::default()
    })
    .unwrap();

    let logged = flow.submit().await.unwrap();
    assert!(logged.contact_update_error.is_none());

    let updates = gateway.requests_for(Op::UpdateContact);
    assert_eq!(updates.len(), 1);
    let contact_id = logged.call.contact_id.unwrap();
    assert_eq!(updates[0].target.as_deref(), Some(contact_id.as_str()));
    assert_eq!(updates[0].body["name"], json!("Jane Newcaller"));
    assert!(updates[0].body.get("email").is_none());

    let contact = gateway
        .contacts()
        .into_iter()
        .find(|c| c.id == contact_id)
        .unwrap();
    assert_eq!(contact.company.as_deref(), Some("Acme"));
}

#[tokio::test]
async fn contact_update_failure_does_not_undo_the_call() {
    let gateway = Arc::new(RecordingGateway::new());
    gateway.fail_next(Op::UpdateContact, 500, None);
    let session = agent_session(&gateway);
    let flow = CallLogFlow::manual(gateway.clone(), session).unwrap();

    flow.set_caller_number("+15550004444").unwrap();
    flow.lookup().await.unwrap();
    flow.set_new_contact_details(NewContactDetails {
        name: "Jane".into(),
        ..NewContactDetails::default()
    })
    .unwrap();

    let logged = flow.submit().await.unwrap();
    assert_eq!(
        logged.contact_update_error.as_deref(),
        Some("Failed to save contact details")
    );
    assert_eq!(gateway.calls().len(), 1);
    assert_eq!(logged.next, Route::Calls);
}

#[tokio::test]
async fn event_acknowledgement_failure_is_swallowed() {
    let gateway = Arc::new(RecordingGateway::new());
    gateway.add_event(fixtures::event("901", "+15550005555", None));
    gateway.fail_always(Op::MarkEventProcessed, 500, None);
    let session = agent_session(&gateway);

    let entry = RedirectEntry::new("+15550005555")
        .with_call_event(CallEventId::parse("901").unwrap());
    let flow = CallLogFlow::redirected(gateway.clone(), session, entry)
        .await
        .unwrap();
    flow.reset_stopwatch();

    let logged = flow.submit().await.unwrap();
    assert_eq!(logged.event_acknowledged, Some(false));
    assert_eq!(logged.next, Route::Calls);
    // One attempt, never retried.
    assert_eq!(gateway.count(Op::MarkEventProcessed), 1);
    assert_eq!(gateway.calls().len(), 1);
}

#[tokio::test]
async fn new_contact_redirect_saves_details_before_logging() {
    let gateway = Arc::new(RecordingGateway::new());
    gateway.add_event(fixtures::event("902", "+15550008888", None));
    let session = agent_session(&gateway);

    let redirect = Redirect::parse("/contacts/new?phone=+15550008888&callEventId=902").unwrap();
    assert_eq!(redirect.route, Route::NewContact);
    let directory =
        ContactDirectory::new(gateway.clone(), session.clone(), Duration::from_millis(300)).unwrap();
    let form = ContactForm {
        name: "Jane Newcaller".into(),
        email: "jane@example.com".into(),
        ..ContactForm::default()
    };
    let (contact, next) = directory.create_from_redirect(&redirect.entry, &form).await.unwrap();
    assert_eq!(next.route, Route::NewCall);

    let flow = CallLogFlow::redirected(gateway.clone(), session, next.entry)
        .await
        .unwrap();
    assert_eq!(flow.phase(), ResolutionPhase::Found);
    flow.reset_stopwatch();
    let logged = flow.submit().await.unwrap();

    assert_eq!(logged.call.contact_id.as_ref(), Some(&contact.id));
    assert_eq!(logged.event_acknowledged, Some(true));
    let contacts = gateway.contacts();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].email.as_deref(), Some("jane@example.com"));
    assert_eq!(gateway.count(Op::UpdateContact), 0);
}

#[tokio::test]
async fn redirect_with_unknown_contact_id_falls_back_to_phone() {
    let gateway = Arc::new(RecordingGateway::new());
    let session = agent_session(&gateway);
    let entry = RedirectEntry::new("+15550006666").with_contact(ContactId::parse("gone").unwrap());

    let flow = CallLogFlow::redirected(gateway.clone(), session, entry)
        .await
        .unwrap();
    assert_eq!(flow.phase(), ResolutionPhase::NotFound);
}

#[tokio::test]
async fn expired_token_mid_session_clears_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/contacts/by-phone/+15550007777"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"found": false})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/calls"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Could not validate credentials"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemorySessionStore::with_session(Session {
        token: "stale-token".into(),
        user: fixtures::user("u-1", "Ana Agent", Role::Agent),
    }));
    let (session, writer) = SessionContext::new(store);
    writer.restore();
    let mut shell = NavigationShell::new(session.clone());
    assert_eq!(shell.navigate(Route::NewCall), Route::NewCall);

    let gateway =
        Arc::new(HttpGateway::with_base_url(format!("{}/api", server.uri()), session.clone()).unwrap());
    let flow = CallLogFlow::manual(gateway, session.clone()).unwrap();
    flow.set_caller_number("+15550007777").unwrap();
    assert_eq!(flow.lookup().await.unwrap(), ResolutionPhase::NotFound);

    let err = flow.submit().await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(
        err.to_string(),
        "Your session has expired. Please log in again."
    );
    assert!(!session.is_authenticated());
    assert_eq!(*session.subscribe().borrow(), SessionEvent::Expired);
    assert_eq!(shell.poll(), Some(Route::Login));

    // Signed out: the flow refuses before touching the network.
    assert!(matches!(flow.submit().await, Err(FlowError::NotAuthenticated)));
}
