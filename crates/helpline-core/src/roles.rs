//! Roles and the capability table.
//!
//! Every role-dependent decision in the console goes through [`allows`]:
//! navigation visibility, route guards, and the pre-flight check before a
//! privileged request is issued. Enforcement here is advisory; the remote
//! API remains authoritative.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Role attached to a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access including user management.
    Admin,
    /// Call-center supervisor.
    Supervisor,
    /// Front-line agent logging calls.
    Agent,
}

impl Role {
    /// All roles, in descending privilege order.
    pub const ALL: [Self; 3] = [Self::Admin, Self::Supervisor, Self::Agent];

    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Supervisor => "supervisor",
            Self::Agent => "agent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "supervisor" => Ok(Self::Supervisor),
            "agent" => Ok(Self::Agent),
            other => Err(CoreError::UnknownVariant {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// The account can log in.
    #[default]
    Active,
    /// The account is deactivated.
    Inactive,
}

impl UserStatus {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    /// The opposite status, used by the status toggle.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Active => Self::Inactive,
            Self::Inactive => Self::Active,
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(CoreError::UnknownVariant {
                kind: "user status",
                value: other.to_string(),
            }),
        }
    }
}

/// Something a signed-in user may try to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// See the dashboard summary.
    ViewDashboard,
    /// List and view contacts.
    ViewContacts,
    /// Create, update and delete contacts.
    ManageContacts,
    /// List and view call records.
    ViewCalls,
    /// Log a new call.
    LogCall,
    /// Update status or notes of an existing call.
    UpdateCall,
    /// Download the CSV export of call records.
    ExportCalls,
    /// See pending telephony events.
    ViewTelephonyEvents,
    /// Create, update, delete user accounts and reset passwords.
    ManageUsers,
    /// See the administrative statistics summary.
    ViewAdminStats,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ViewDashboard => "view dashboard",
            Self::ViewContacts => "view contacts",
            Self::ManageContacts => "manage contacts",
            Self::ViewCalls => "view calls",
            Self::LogCall => "log call",
            Self::UpdateCall => "update call",
            Self::ExportCalls => "export calls",
            Self::ViewTelephonyEvents => "view telephony events",
            Self::ManageUsers => "manage users",
            Self::ViewAdminStats => "view admin stats",
        };
        f.write_str(name)
    }
}

/// Check whether `role` is allowed to perform `action`.
#[must_use]
pub const fn allows(role: Role, action: Action) -> bool {
    match action {
        Action::ViewDashboard
        | Action::ViewContacts
        | Action::ManageContacts
        | Action::ViewCalls
        | Action::LogCall
        | Action::UpdateCall
        | Action::ViewTelephonyEvents => true,
        Action::ExportCalls => matches!(role, Role::Admin | Role::Supervisor),
        Action::ManageUsers | Action::ViewAdminStats => matches!(role, Role::Admin),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everyone_can_log_calls() {
        for role in Role::ALL {
            assert!(allows(role, Action::LogCall));
            assert!(allows(role, Action::ManageContacts));
            assert!(allows(role, Action::ViewDashboard));
        }
    }

    #[test]
    fn only_admin_manages_users() {
        assert!(allows(Role::Admin, Action::ManageUsers));
        assert!(!allows(Role::Supervisor, Action::ManageUsers));
        assert!(!allows(Role::Agent, Action::ManageUsers));
        assert!(!allows(Role::Supervisor, Action::ViewAdminStats));
    }

    #[test]
    fn agents_cannot_export() {
        assert!(allows(Role::Admin, Action::ExportCalls));
        assert!(allows(Role::Supervisor, Action::ExportCalls));
        assert!(!allows(Role::Agent, Action::ExportCalls));
    }

    #[test]
    fn role_parse_and_serde() {
        assert_eq!("supervisor".parse::<Role>().unwrap(), Role::Supervisor);
        assert!("root".parse::<Role>().is_err());

        let json = serde_json::to_string(&Role::Admin).unwrap();
        assert_eq!(json, "\"admin\"");
    }

    #[test]
    fn status_toggle() {
        assert_eq!(UserStatus::Active.toggled(), UserStatus::Inactive);
        assert_eq!(UserStatus::Inactive.toggled(), UserStatus::Active);
        assert_eq!(UserStatus::default(), UserStatus::Active);
    }
}
