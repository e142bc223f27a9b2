//! User accounts and authentication payloads.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contact::push_non_blank;
use crate::ids::UserId;
use crate::roles::{Role, UserStatus};

/// Minimum password length accepted by the API.
pub const MIN_PASSWORD_LEN: usize = 6;

/// A console user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Email address, unique across accounts.
    pub email: String,
    /// Role.
    pub role: Role,
    /// Account status.
    #[serde(default)]
    pub status: UserStatus,
    /// Last successful login.
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Response of `POST /auth/login` and `POST /auth/register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Bearer token.
    pub access_token: String,
    /// Token scheme, always `bearer`.
    #[serde(default = "AuthResponse::default_token_type")]
    pub token_type: String,
    /// The authenticated account.
    pub user: User,
}

impl AuthResponse {
    fn default_token_type() -> String {
        "bearer".to_string()
    }
}

/// Login payload.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

/// Self-registration payload.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
    /// Display name.
    pub name: String,
}

/// Admin payload for creating an account.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    /// Account email.
    pub email: String,
    /// Initial password.
    pub password: String,
    /// Display name.
    pub name: String,
    /// Role.
    pub role: Role,
}

/// Admin partial update of an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserPatch {
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// New role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// New status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
}

impl UserPatch {
    /// Returns `true` if no field would be changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.role.is_none() && self.status.is_none()
    }
}

/// Admin password reset payload.
#[derive(Debug, Clone, Serialize)]
pub struct PasswordReset {
    /// The new password.
    pub new_password: String,
}

/// Server-side filter for the user list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    /// Free-text match on name and email.
    pub search: Option<String>,
    /// Exact role.
    pub role: Option<Role>,
    /// Exact status.
    pub status: Option<UserStatus>,
}

impl UserFilter {
    /// Query-string pairs for this filter.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push_non_blank(&mut pairs, "search", self.search.as_deref());
        if let Some(role) = self.role {
            pairs.push(("role", role.as_str().to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        pairs
    }
}

/// `GET /admin/stats` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminStats {
    /// Account counts.
    pub users: UserCounts,
    /// Contact counts.
    pub contacts: ContactCounts,
    /// Call counts.
    pub calls: CallCounts,
}

/// Account counts in [`AdminStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCounts {
    /// All accounts.
    pub total: u64,
    /// Accounts that are not deactivated.
    pub active: u64,
    /// Accounts per role wire name.
    #[serde(default)]
    pub by_role: BTreeMap<String, u64>,
}

/// Contact counts in [`AdminStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactCounts {
    /// All contacts.
    pub total: u64,
}

/// Call counts in [`AdminStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallCounts {
    /// All calls.
    pub total: u64,
    /// Calls in the last seven days.
    pub last_7_days: u64,
}

/// Generic `{"message": ...}` acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Human-readable confirmation.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_defaults_status_to_active() {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": "u-1",
            "email": "ana@example.com",
            "name": "Ana",
            "role": "agent",
            "created_at": "2025-01-01T00:00:00+00:00",
            "last_login": null
        }))
        .unwrap();
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.role, Role::Agent);
    }

    #[test]
    fn auth_response_token_type_defaults() {
        let resp: AuthResponse = serde_json::from_value(serde_json::json!({
            "access_token": "tok",
            "user": {
                "id": "u-1",
                "email": "ana@example.com",
                "name": "Ana",
                "role": "admin",
                "status": "active",
                "created_at": "2025-01-01T00:00:00+00:00"
            }
        }))
        .unwrap();
        assert_eq!(resp.token_type, "bearer");
    }

    #[test]
    fn user_filter_pairs() {
        let filter = UserFilter {
            search: Some("ana".into()),
            role: Some(Role::Supervisor),
            status: Some(UserStatus::Inactive),
        };
        assert_eq!(
            filter.query_pairs(),
            vec![
                ("search", "ana".to_string()),
                ("role", "supervisor".to_string()),
                ("status", "inactive".to_string()),
            ]
        );
    }

    #[test]
    fn admin_stats_shape() {
        let stats: AdminStats = serde_json::from_value(serde_json::json!({
            "users": {"total": 3, "active": 2, "by_role": {"admin": 1, "supervisor": 0, "agent": 2}},
            "contacts": {"total": 10},
            "calls": {"total": 40, "last_7_days": 7}
        }))
        .unwrap();
        assert_eq!(stats.users.by_role["agent"], 2);
        assert_eq!(stats.calls.last_7_days, 7);
    }
}
