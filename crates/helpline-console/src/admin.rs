//! Administrative user management.
//!
//! Every operation checks the acting role first. Changes that would lock the
//! acting admin out of their own account are refused locally.

use std::sync::Arc;
use std::time::Duration;

use helpline_client::{Gateway, SessionContext};
use helpline_core::{
    non_blank, Action, AdminStats, NewUser, PasswordReset, Role, User, UserFilter, UserId,
    UserPatch, UserStatus, MIN_PASSWORD_LEN,
};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::debounce::{Debouncer, Latest};
use crate::error::{require, FlowError, Result};

/// Input for a new account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserForm {
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Initial password.
    pub password: String,
    /// Role.
    pub role: Role,
}

/// Check a new password locally.
///
/// # Errors
///
/// Returns `FlowError::Validation` if it is too short or `confirm` differs.
pub fn check_new_password(password: &str, confirm: Option<&str>) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(FlowError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if confirm.is_some_and(|c| c != password) {
        return Err(FlowError::validation("Passwords do not match"));
    }
    Ok(())
}

/// The user administration screen.
pub struct UserAdmin {
    gateway: Arc<dyn Gateway>,
    session: SessionContext,
    filter: Mutex<UserFilter>,
    search: Debouncer<Vec<User>>,
}

impl std::fmt::Debug for UserAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserAdmin")
            .field("filter", &*self.filter.lock())
            .finish_non_exhaustive()
    }
}

impl UserAdmin {
    /// Open the screen.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Forbidden` unless the session is an admin.
    pub fn new(gateway: Arc<dyn Gateway>, session: SessionContext, quiet: Duration) -> Result<Self> {
        require(&session, Action::ManageUsers)?;
        Ok(Self {
            gateway,
            session,
            filter: Mutex::new(UserFilter::default()),
            search: Debouncer::new(quiet),
        })
    }

    /// The active filter.
    #[must_use]
    pub fn filter(&self) -> UserFilter {
        self.filter.lock().clone()
    }

    /// Subscribe to list updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Latest<Vec<User>>> {
        self.search.subscribe()
    }

    /// Users from the newest completed fetch.
    #[must_use]
    pub fn users(&self) -> Vec<User> {
        self.search
            .latest()
            .and_then(|o| o.result.as_ref().ok().cloned())
            .unwrap_or_default()
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// Fetch now with the current filter.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Remote` if the fetch failed, or `FlowError::Busy`
    /// if a newer search superseded it.
    pub async fn refresh(&self) -> Result<Vec<User>> {
        require(&self.session, Action::ManageUsers)?;
        let filter = self.filter();
        let gateway = Arc::clone(&self.gateway);
        let outcome = self
            .search
            .run_now(filter.search.clone().unwrap_or_default(), |_| async move {
                fetch(gateway.as_ref(), &filter).await
            })
            .await
            .ok_or(FlowError::Busy)?;
        match &outcome.result {
            Ok(users) => Ok(users.clone()),
            Err(e) => Err(e.to_remote()),
        }
    }

    /// Update the search text; the fetch runs after the quiet period.
    pub fn search(&self, text: &str) -> u64 {
        let filter = {
            let mut filter = self.filter.lock();
            filter.search = non_blank(Some(text));
            filter.clone()
        };
        let gateway = Arc::clone(&self.gateway);
        self.search.schedule(text, move |_| async move {
            fetch(gateway.as_ref(), &filter).await
        })
    }

    /// Change the role and status filters and refetch immediately.
    ///
    /// # Errors
    ///
    /// See [`Self::refresh`].
    pub async fn set_filters(
        &self,
        role: Option<Role>,
        status: Option<UserStatus>,
    ) -> Result<Vec<User>> {
        {
            let mut filter = self.filter.lock();
            filter.role = role;
            filter.status = status;
        }
        self.refresh().await
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Validation` if name, email or password are
    /// missing or the password is too short, or `FlowError::Remote`.
    pub async fn create(&self, form: &UserForm) -> Result<User> {
        require(&self.session, Action::ManageUsers)?;
        let name = non_blank(Some(form.name.as_str()))
            .ok_or_else(|| FlowError::validation("Name is required"))?;
        let email = non_blank(Some(form.email.as_str()))
            .ok_or_else(|| FlowError::validation("Email is required"))?;
        check_new_password(&form.password, None)?;

        let user = self
            .gateway
            .create_user(&NewUser {
                email,
                password: form.password.clone(),
                name,
                role: form.role,
            })
            .await
            .map_err(|e| FlowError::remote(&e, "Failed to create user"))?;
        tracing::info!(user_id = %user.id, role = %user.role, "User created");
        self.refetch().await;
        Ok(user)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Validation` for an empty patch or for role and
    /// status changes to the acting admin's own account.
    pub async fn update(&self, id: &UserId, patch: &UserPatch) -> Result<User> {
        require(&self.session, Action::ManageUsers)?;
        if patch.is_empty() {
            return Err(FlowError::validation("Nothing to update"));
        }
        if self.is_self(id) {
            if patch.role.is_some() {
                return Err(FlowError::validation("Cannot change your own role"));
            }
            if patch.status.is_some() {
                return Err(FlowError::validation("Cannot deactivate your own account"));
            }
        }
        let user = self
            .gateway
            .update_user(id, patch)
            .await
            .map_err(|e| FlowError::remote(&e, "Failed to update user"))?;
        self.refetch().await;
        Ok(user)
    }

    /// Flip a user between active and inactive.
    ///
    /// # Errors
    ///
    /// See [`Self::update`].
    pub async fn toggle_status(&self, user: &User) -> Result<User> {
        self.update(
            &user.id,
            &UserPatch {
                status: Some(user.status.toggled()),
                ..UserPatch::default()
            },
        )
        .await
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// See [`Self::update`].
    pub async fn change_role(&self, id: &UserId, role: Role) -> Result<User> {
        self.update(
            id,
            &UserPatch {
                role: Some(role),
                ..UserPatch::default()
            },
        )
        .await
    }

    /// Delete an account.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Validation` for the acting admin's own account,
    /// or `FlowError::Remote`.
    pub async fn delete(&self, id: &UserId) -> Result<()> {
        require(&self.session, Action::ManageUsers)?;
        if self.is_self(id) {
            return Err(FlowError::validation("Cannot delete your own account"));
        }
        self.gateway
            .delete_user(id)
            .await
            .map_err(|e| FlowError::remote(&e, "Failed to delete user"))?;
        tracing::info!(user_id = %id, "User deleted");
        self.refetch().await;
        Ok(())
    }

    /// Set a new password for a user.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Validation` if the password is too short or the
    /// confirmation differs, or `FlowError::Remote`.
    pub async fn reset_password(&self, id: &UserId, password: &str, confirm: &str) -> Result<()> {
        require(&self.session, Action::ManageUsers)?;
        check_new_password(password, Some(confirm))?;
        self.gateway
            .reset_password(
                id,
                &PasswordReset {
                    new_password: password.to_string(),
                },
            )
            .await
            .map_err(|e| FlowError::remote(&e, "Failed to reset password"))?;
        tracing::info!(user_id = %id, "Password reset");
        Ok(())
    }

    /// System-wide statistics.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Forbidden` for non-admins, or `FlowError::Remote`.
    pub async fn stats(&self) -> Result<AdminStats> {
        require(&self.session, Action::ViewAdminStats)?;
        self.gateway
            .admin_stats()
            .await
            .map_err(|e| FlowError::remote(&e, "Failed to load statistics"))
    }

    fn is_self(&self, id: &UserId) -> bool {
        self.session.user().is_some_and(|u| &u.id == id)
    }

    async fn refetch(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "Failed to refresh users");
        }
    }
}

async fn fetch(gateway: &dyn Gateway, filter: &UserFilter) -> Result<Vec<User>> {
    gateway
        .list_users(filter)
        .await
        .map_err(|e| FlowError::remote(&e, "Failed to load users"))
}
