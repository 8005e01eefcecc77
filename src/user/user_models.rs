use super::permissions::UserRole;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: usize,
    pub name: String,
    pub email: String,
    /// Unix seconds.
    pub created_at: i64,
}

/// A user as returned by the API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<UserRole>,
    pub is_admin: bool,
}

impl UserProfile {
    pub fn new(user: User, roles: Vec<UserRole>) -> Self {
        let is_admin = roles.contains(&UserRole::Admin);
        UserProfile {
            user,
            roles,
            is_admin,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub is_admin: Option<bool>,
    pub password: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UserCounts {
    pub total_users: usize,
    pub admins: usize,
    pub registrations_last_30_days: usize,
}
