use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// Manage own media items and collections.
    OwnLibrary,
    /// Create and edit categories.
    EditCategories,
    /// Run category maintenance (duplicate cleanup, legacy migration).
    ManageCategories,
    ManageUsers,
    ServerAdmin,
}

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::OwnLibrary,
    Permission::EditCategories,
    Permission::ManageCategories,
    Permission::ManageUsers,
    Permission::ServerAdmin,
];
const REGULAR_PERMISSIONS: &[Permission] = &[Permission::OwnLibrary, Permission::EditCategories];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserRole {
    Admin,
    Regular,
}

impl UserRole {
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            UserRole::Admin => ADMIN_PERMISSIONS,
            UserRole::Regular => REGULAR_PERMISSIONS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "Admin",
            UserRole::Regular => "Regular",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(UserRole::Admin),
            "regular" => Some(UserRole::Regular),
            _ => None,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Union of the permissions granted by `roles`, without repetitions.
pub fn resolve_permissions(roles: &[UserRole]) -> Vec<Permission> {
    let mut permissions: Vec<Permission> = Vec::new();
    for permission in roles.iter().flat_map(|role| role.permissions()) {
        if !permissions.contains(permission) {
            permissions.push(*permission);
        }
    }
    permissions
}
