//! The authenticated session shared by every flow.
//!
//! A single [`SessionWriter`] (owned by the session holder) establishes and
//! clears the session. Every other component gets a cloneable
//! [`SessionContext`] that can read the current user and token, subscribe to
//! changes, and mark the session expired when the API rejects it.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use helpline_core::{Role, User};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{ClientError, Result};

/// An authenticated user together with their bearer token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token sent on every authenticated request.
    pub token: String,
    /// The signed-in user.
    pub user: User,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

/// Last change observed on the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// No sign-in has happened yet in this process.
    Initial,
    /// A user signed in or a cached session was accepted.
    SignedIn(User),
    /// The user logged out.
    SignedOut,
    /// The API rejected the session; the user must log in again.
    Expired,
}

// ============================================================================
// Persistence
// ============================================================================

/// Durable storage for the session between runs.
pub trait SessionStore: Send + Sync {
    /// Load the persisted session, if any.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::SessionStore` if the storage is unreadable.
    fn load(&self) -> Result<Option<Session>>;

    /// Persist the session, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::SessionStore` if the write fails.
    fn save(&self, session: &Session) -> Result<()>;

    /// Remove the persisted session. Removing nothing is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::SessionStore` if the removal fails.
    fn clear(&self) -> Result<()>;
}

/// Stores the session as a JSON file.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Create a store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ClientError::SessionStore(format!(
                    "read {}: {e}",
                    self.path.display()
                )))
            }
        };
        serde_json::from_str(&raw).map(Some).map_err(|e| {
            ClientError::SessionStore(format!("parse {}: {e}", self.path.display()))
        })
    }

    fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ClientError::SessionStore(format!("create {}: {e}", parent.display()))
            })?;
        }
        let body = serde_json::to_string_pretty(session)
            .map_err(|e| ClientError::SessionStore(e.to_string()))?;
        fs::write(&self.path, body).map_err(|e| {
            ClientError::SessionStore(format!("write {}: {e}", self.path.display()))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600)).map_err(|e| {
                ClientError::SessionStore(format!("chmod {}: {e}", self.path.display()))
            })?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::SessionStore(format!(
                "remove {}: {e}",
                self.path.display()
            ))),
        }
    }
}

/// Keeps the session in memory only.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `session`.
    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self {
            slot: Mutex::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, session: &Session) -> Result<()> {
        *self.slot.lock() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot.lock() = None;
        Ok(())
    }
}

// ============================================================================
// Shared context
// ============================================================================

struct Inner {
    current: RwLock<Option<Session>>,
    store: Arc<dyn SessionStore>,
    events: watch::Sender<SessionEvent>,
}

impl Inner {
    fn drop_session(&self, event: SessionEvent) {
        let previous = self.current.write().take();
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "failed to remove persisted session");
        }
        if previous.is_some() || matches!(event, SessionEvent::SignedOut) {
            self.events.send_replace(event);
        }
    }
}

/// Read-only handle to the current session.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Inner>,
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("current", &*self.inner.current.read())
            .finish_non_exhaustive()
    }
}

impl SessionContext {
    /// Create a context backed by `store`, returning the read handle and its
    /// single writer.
    pub fn new(store: Arc<dyn SessionStore>) -> (Self, SessionWriter) {
        let (events, _) = watch::channel(SessionEvent::Initial);
        let inner = Arc::new(Inner {
            current: RwLock::new(None),
            store,
            events,
        });
        (
            Self {
                inner: Arc::clone(&inner),
            },
            SessionWriter { inner },
        )
    }

    /// A context with an in-memory store that starts signed in as `session`.
    ///
    /// Used by tools and tests that already hold a token.
    #[must_use]
    pub fn signed_in(session: Session) -> Self {
        let (context, writer) = Self::new(Arc::new(MemorySessionStore::new()));
        writer.install(session);
        context
    }

    /// The current session, if signed in.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.inner.current.read().clone()
    }

    /// The signed-in user, if any.
    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.inner.current.read().as_ref().map(|s| s.user.clone())
    }

    /// The bearer token, if signed in.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.inner.current.read().as_ref().map(|s| s.token.clone())
    }

    /// The signed-in user's role, if any.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.inner.current.read().as_ref().map(|s| s.user.role)
    }

    /// Returns `true` if a session is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.current.read().is_some()
    }

    /// Subscribe to session changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Drop the session because the API rejected it.
    ///
    /// Clears the persisted copy and publishes [`SessionEvent::Expired`]
    /// once; later calls while already signed out are no-ops.
    pub fn expire(&self) {
        tracing::info!("session rejected by API, signing out");
        self.inner.drop_session(SessionEvent::Expired);
    }
}

/// The only handle that can establish a session.
///
/// Not `Clone`: the session holder owns it.
pub struct SessionWriter {
    inner: Arc<Inner>,
}

impl fmt::Debug for SessionWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionWriter").finish_non_exhaustive()
    }
}

impl SessionWriter {
    /// Read handle for the session this writer controls.
    #[must_use]
    pub fn context(&self) -> SessionContext {
        SessionContext {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Load the persisted session into memory without validating it.
    ///
    /// An unreadable store is treated as no session and is cleared.
    pub fn restore(&self) -> Option<Session> {
        match self.inner.store.load() {
            Ok(Some(session)) => {
                tracing::debug!(user_id = %session.user.id, "restored cached session");
                *self.inner.current.write() = Some(session.clone());
                Some(session)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable session");
                if let Err(e) = self.inner.store.clear() {
                    tracing::warn!(error = %e, "failed to remove persisted session");
                }
                None
            }
        }
    }

    /// Persist and publish a new session.
    ///
    /// The in-memory session is set even if persisting fails.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::SessionStore` if the session could not be saved.
    pub fn establish(&self, session: Session) -> Result<()> {
        let saved = self.inner.store.save(&session);
        self.install(session);
        saved
    }

    /// Replace the user profile of the current session, keeping its token.
    ///
    /// Does nothing when signed out.
    pub fn refresh_user(&self, user: User) {
        let updated = {
            let mut current = self.inner.current.write();
            match current.as_mut() {
                Some(session) => {
                    session.user = user;
                    Some(session.clone())
                }
                None => None,
            }
        };
        if let Some(session) = updated {
            if let Err(e) = self.inner.store.save(&session) {
                tracing::warn!(error = %e, "failed to persist refreshed session");
            }
            self.inner
                .events
                .send_replace(SessionEvent::SignedIn(session.user));
        }
    }

    /// Clear the session after a logout.
    pub fn sign_out(&self) {
        self.inner.drop_session(SessionEvent::SignedOut);
    }

    /// Clear the session because it could not be validated.
    pub fn invalidate(&self) {
        self.inner.drop_session(SessionEvent::Expired);
    }

    fn install(&self, session: Session) {
        let user = session.user.clone();
        *self.inner.current.write() = Some(session);
        self.inner.events.send_replace(SessionEvent::SignedIn(user));
    }
}
