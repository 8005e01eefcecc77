use super::auth::{AuthToken, AuthTokenValue, PasswordCredentials};
use super::permissions::UserRole;
use super::user_models::User;
use anyhow::Result;

pub trait UserAuthCredentialsStore: Send + Sync {
    /// Returns the password credentials of the given user.
    /// Returns Ok(None) if the user has no password set.
    fn get_password_credentials(&self, user_id: usize) -> Result<Option<PasswordCredentials>>;

    /// Inserts or replaces the password credentials of `credentials.user_id`.
    fn set_password_credentials(&self, credentials: &PasswordCredentials) -> Result<()>;

    /// Records a login attempt, `succeeded` also updates the last used timestamp.
    fn record_password_attempt(&self, user_id: usize, succeeded: bool) -> Result<()>;
}

pub trait UserAuthTokenStore: Send + Sync {
    /// Returns the token with the given value.
    /// Returns Ok(None) if the token does not exist.
    fn get_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>>;

    /// Deletes an auth token given the token value.
    /// Returns the deleted token, Ok(None) if it did not exist.
    fn delete_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>>;

    fn update_user_auth_token_last_used_timestamp(&self, token: &AuthTokenValue) -> Result<()>;

    fn add_user_auth_token(&self, token: &AuthToken) -> Result<()>;

    /// Deletes every token of the user, returns how many were removed.
    fn delete_all_user_auth_tokens(&self, user_id: usize) -> Result<usize>;
}

pub trait UserStore: UserAuthTokenStore + UserAuthCredentialsStore + Send + Sync {
    /// Creates a new user and returns the user id.
    fn create_user(&self, name: &str, email: &str) -> Result<usize>;

    /// Returns Ok(None) if the user does not exist.
    fn get_user(&self, user_id: usize) -> Result<Option<User>>;

    /// Looks a user up by (normalized) email.
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    fn list_users(&self) -> Result<Vec<User>>;

    /// Returns false if the user does not exist.
    fn update_user(&self, user_id: usize, name: &str, email: &str) -> Result<bool>;

    /// Deletes the user together with credentials, tokens and roles.
    /// Returns false if the user does not exist.
    fn delete_user(&self, user_id: usize) -> Result<bool>;

    fn count_users(&self) -> Result<usize>;

    /// Number of users created at or after `since` (unix seconds).
    fn count_users_created_since(&self, since: i64) -> Result<usize>;

    fn get_user_roles(&self, user_id: usize) -> Result<Vec<UserRole>>;

    fn add_user_role(&self, user_id: usize, role: UserRole) -> Result<()>;

    fn remove_user_role(&self, user_id: usize, role: UserRole) -> Result<()>;

    fn count_users_with_role(&self, role: UserRole) -> Result<usize>;
}
