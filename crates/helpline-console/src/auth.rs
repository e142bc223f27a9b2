//! Session holder: restore, revalidate, login, registration and logout.

use std::sync::Arc;

use helpline_client::{Gateway, Session, SessionContext, SessionWriter};
use helpline_core::{non_blank, AuthResponse, Credentials, Registration, User};

use crate::admin::check_new_password;
use crate::error::{FlowError, Result};

/// Owns the session writer and drives authentication.
pub struct SessionHolder {
    gateway: Arc<dyn Gateway>,
    writer: SessionWriter,
}

impl std::fmt::Debug for SessionHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHolder")
            .field("session", &self.writer.context())
            .finish_non_exhaustive()
    }
}

impl SessionHolder {
    /// Create a holder. `gateway` should share the writer's context so that
    /// a 401 on any request expires this session.
    pub fn new(gateway: Arc<dyn Gateway>, writer: SessionWriter) -> Self {
        Self { gateway, writer }
    }

    /// Read handle to hand to flows.
    #[must_use]
    pub fn context(&self) -> SessionContext {
        self.writer.context()
    }

    /// The signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.writer.context().user()
    }

    /// Restore the cached session and revalidate it with the API.
    ///
    /// The cached identity is visible through [`Self::context`] while the
    /// check is in flight. Any failure, including an unreachable server,
    /// clears the session.
    pub async fn initialize(&self) -> Option<User> {
        let cached = self.writer.restore()?;
        match self.gateway.me().await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, role = %user.role, "Session revalidated");
                self.writer.refresh_user(user.clone());
                Some(user)
            }
            Err(e) => {
                tracing::warn!(user_id = %cached.user.id, error = %e, "Cached session rejected");
                self.writer.invalidate();
                None
            }
        }
    }

    /// Sign in.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Validation` for blank input, or
    /// `FlowError::Remote` with the server detail or `"Login failed"`.
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let email = non_blank(Some(email))
            .ok_or_else(|| FlowError::validation("Email is required"))?;
        if password.is_empty() {
            return Err(FlowError::validation("Password is required"));
        }
        let auth = self
            .gateway
            .login(&Credentials {
                email,
                password: password.to_string(),
            })
            .await
            .map_err(|e| FlowError::remote(&e, "Login failed"))?;
        Ok(self.establish(auth))
    }

    /// Create an account and sign in as it.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Validation` for blank fields, a short password or
    /// a mismatched confirmation, or `FlowError::Remote` with the server
    /// detail or `"Registration failed"`.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        confirm: &str,
    ) -> Result<User> {
        let name = non_blank(Some(name)).ok_or_else(|| FlowError::validation("Name is required"))?;
        let email = non_blank(Some(email))
            .ok_or_else(|| FlowError::validation("Email is required"))?;
        check_new_password(password, Some(confirm))?;

        let auth = self
            .gateway
            .register(&Registration {
                email,
                password: password.to_string(),
                name,
            })
            .await
            .map_err(|e| FlowError::remote(&e, "Registration failed"))?;
        Ok(self.establish(auth))
    }

    /// Sign out and forget the persisted session.
    pub fn logout(&self) {
        if let Some(user) = self.current_user() {
            tracing::info!(user_id = %user.id, "Signed out");
        }
        self.writer.sign_out();
    }

    fn establish(&self, auth: AuthResponse) -> User {
        let user = auth.user.clone();
        let session = Session {
            token: auth.access_token,
            user: auth.user,
        };
        // The session stays usable in memory even when it cannot be saved.
        if let Err(e) = self.writer.establish(session) {
            tracing::warn!(error = %e, "Failed to persist session");
        }
        tracing::info!(user_id = %user.id, role = %user.role, "Signed in");
        user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpline_client::mock::fixtures;
    use helpline_client::{MemorySessionStore, Op, RecordingGateway, SessionEvent, SessionStore};
    use helpline_core::{Role, UserStatus};

    fn holder_with(store: Arc<MemorySessionStore>) -> (Arc<RecordingGateway>, SessionHolder) {
        let (context, writer) = SessionContext::new(store);
        let gateway = Arc::new(RecordingGateway::new());
        gateway.attach_session(context);
        let holder = SessionHolder::new(gateway.clone(), writer);
        (gateway, holder)
    }

    #[tokio::test]
    async fn login_persists_session() {
        let store = Arc::new(MemorySessionStore::new());
        let (gateway, holder) = holder_with(store.clone());
        let agent = fixtures::user("u-1", "Ana Agent", Role::Agent);
        gateway.add_user(agent.clone(), "secret1");

        let user = holder.login(&agent.email, "secret1").await.unwrap();
        assert_eq!(user.id, agent.id);
        assert!(holder.context().is_authenticated());
        assert_eq!(store.load().unwrap().unwrap().token, "token-u-1");
    }

    #[tokio::test]
    async fn bad_password_shows_server_detail() {
        let (gateway, holder) = holder_with(Arc::new(MemorySessionStore::new()));
        let agent = fixtures::user("u-1", "Ana Agent", Role::Agent);
        gateway.add_user(agent.clone(), "secret1");

        let err = holder.login(&agent.email, "wrong").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid email or password");
        assert!(!holder.context().is_authenticated());
    }

    #[tokio::test]
    async fn deactivated_account_cannot_log_in() {
        let (gateway, holder) = holder_with(Arc::new(MemorySessionStore::new()));
        let mut agent = fixtures::user("u-1", "Ana Agent", Role::Agent);
        agent.status = UserStatus::Inactive;
        gateway.add_user(agent.clone(), "secret1");

        let err = holder.login(&agent.email, "secret1").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Account is deactivated. Contact administrator."
        );
    }

    #[tokio::test]
    async fn register_validates_locally() {
        let (gateway, holder) = holder_with(Arc::new(MemorySessionStore::new()));
        assert!(holder
            .register("New Agent", "new@helpline.test", "secret1", "secret2")
            .await
            .is_err());
        assert!(holder
            .register("New Agent", "new@helpline.test", "abc", "abc")
            .await
            .is_err());
        assert_eq!(gateway.count(Op::Register), 0);

        let user = holder
            .register("New Agent", "new@helpline.test", "secret1", "secret1")
            .await
            .unwrap();
        assert_eq!(user.role, Role::Agent);
        assert!(holder.context().is_authenticated());
    }

    #[tokio::test]
    async fn initialize_revalidates_cached_session() {
        let agent = fixtures::user("u-1", "Ana Agent", Role::Agent);
        let store = Arc::new(MemorySessionStore::with_session(Session {
            token: "token-u-1".into(),
            user: agent.clone(),
        }));
        let (gateway, holder) = holder_with(store);
        let mut renamed = agent.clone();
        renamed.name = "Ana Renamed".into();
        gateway.act_as(renamed);

        let user = holder.initialize().await.unwrap();
        assert_eq!(user.name, "Ana Renamed");
        assert_eq!(holder.current_user().unwrap().name, "Ana Renamed");
    }

    #[tokio::test]
    async fn initialize_clears_rejected_session() {
        let agent = fixtures::user("u-1", "Ana Agent", Role::Agent);
        let store = Arc::new(MemorySessionStore::with_session(Session {
            token: "stale".into(),
            user: agent,
        }));
        let (gateway, holder) = holder_with(store.clone());
        gateway.fail_next(Op::Me, 401, Some("Could not validate credentials"));
        let events = holder.context().subscribe();

        assert!(holder.initialize().await.is_none());
        assert!(!holder.context().is_authenticated());
        assert!(store.load().unwrap().is_none());
        assert_eq!(*events.borrow(), SessionEvent::Expired);
    }

    #[tokio::test]
    async fn initialize_clears_session_when_unreachable() {
        let agent = fixtures::user("u-1", "Ana Agent", Role::Agent);
        let store = Arc::new(MemorySessionStore::with_session(Session {
            token: "token-u-1".into(),
            user: agent,
        }));
        let (gateway, holder) = holder_with(store);
        gateway.fail_next(Op::Me, 503, None);

        assert!(holder.initialize().await.is_none());
        assert!(!holder.context().is_authenticated());
    }

    #[tokio::test]
    async fn logout_clears_store() {
        let store = Arc::new(MemorySessionStore::new());
        let (gateway, holder) = holder_with(store.clone());
        let agent = fixtures::user("u-1", "Ana Agent", Role::Agent);
        gateway.add_user(agent.clone(), "secret1");
        holder.login(&agent.email, "secret1").await.unwrap();

        holder.logout();
        assert!(!holder.context().is_authenticated());
        assert!(store.load().unwrap().is_none());
    }
}
