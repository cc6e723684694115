use anyhow::Error;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewCollaborators,
    ViewCalendar,
    ViewAlerts,
    ChangeOwnPassword,

    ManageCollaborators,
    CompleteOnboarding,
    CreateEvents,
    SendTestAlerts,

    DeleteCollaborators,
    ManageUsers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Manager,
    Admin,
}

static VIEWER_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewCollaborators);
    permissions.insert(Permission::ViewCalendar);
    permissions.insert(Permission::ViewAlerts);
    permissions.insert(Permission::ChangeOwnPassword);

    permissions
});

static MANAGER_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(VIEWER_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ManageCollaborators);
    permissions.insert(Permission::CompleteOnboarding);
    permissions.insert(Permission::CreateEvents);
    permissions.insert(Permission::SendTestAlerts);

    permissions
});

static ADMIN_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(MANAGER_PERMISSIONS.iter().copied());

    permissions.insert(Permission::DeleteCollaborators);
    permissions.insert(Permission::ManageUsers);

    permissions
});

impl Role {
    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::Viewer => &VIEWER_PERMISSIONS,
            Role::Manager => &MANAGER_PERMISSIONS,
            Role::Admin => &ADMIN_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Viewer => "viewer",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "viewer" => Ok(Role::Viewer),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            _ => Err(Error::msg(format!("Unknown role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
