//! Role and permission model. Roles are fixed at account construction and the
//! role→permission mapping is an explicit table, not per-endpoint inference.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Session-mode protected pages.
    ViewDashboard,
    /// Bearer-authenticated API reads.
    ApiRead,
    /// Account listing and administration.
    ManageUsers,
}

impl Role {
    /// The role→permission table. Admin is a strict superset of User.
    pub fn allows(&self, permission: Permission) -> bool {
        match self {
            Role::Admin => true,
            Role::User => matches!(permission, Permission::ViewDashboard | Permission::ApiRead),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_permissions() {
        assert!(Role::User.allows(Permission::ViewDashboard));
        assert!(Role::User.allows(Permission::ApiRead));
        assert!(!Role::User.allows(Permission::ManageUsers));
    }

    #[test]
    fn admin_has_all_permissions() {
        assert!(Role::Admin.allows(Permission::ViewDashboard));
        assert!(Role::Admin.allows(Permission::ApiRead));
        assert!(Role::Admin.allows(Permission::ManageUsers));
    }

    #[test]
    fn role_wire_format_is_uppercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"USER\"");
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ADMIN\"");
    }
}
