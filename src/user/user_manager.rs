use super::auth::{AuthToken, AuthTokenValue, PasswordCredentials};
use super::permissions::{resolve_permissions, Permission, UserRole};
use super::user_models::{User, UserCounts, UserProfile, UserUpdate};
use super::UserStore;
use crate::library::ValidationErrors;
use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_NAME_LENGTH: usize = 255;
const RECENT_REGISTRATIONS_DAYS: i64 = 30;

lazy_static! {
    static ref EMAIL_PATTERN: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern");
}

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("{}", .0.first_message().unwrap_or("Validation failed"))]
    Validation(ValidationErrors),

    #[error("The provided credentials are incorrect.")]
    InvalidCredentials,

    #[error("Cannot delete the last admin user")]
    LastAdmin,

    #[error(transparent)]
    Persistence(#[from] anyhow::Error),
}

pub type UserResult<T> = Result<T, UserError>;

/// Registration payload, the confirmation must equal the password.
#[derive(Clone, Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn check_name(errors: &mut ValidationErrors, name: &str) {
    let name = name.trim();
    if name.is_empty() {
        errors.add("name", "The name field is required.");
    } else if name.chars().count() > MAX_NAME_LENGTH {
        errors.add("name", "The name may not be greater than 255 characters.");
    }
}

fn check_email(errors: &mut ValidationErrors, email: &str) {
    if email.is_empty() {
        errors.add("email", "The email field is required.");
    } else if email.chars().count() > MAX_NAME_LENGTH || !EMAIL_PATTERN.is_match(email) {
        errors.add("email", "The email must be a valid email address.");
    }
}

fn check_password(errors: &mut ValidationErrors, password: &str) {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.add("password", "The password must be at least 8 characters.");
    }
}

pub struct UserManager {
    user_store: Arc<dyn UserStore>,
}

impl UserManager {
    pub fn new(user_store: Arc<dyn UserStore>) -> Self {
        Self { user_store }
    }

    fn profile(&self, user: User) -> UserResult<UserProfile> {
        let roles = self.user_store.get_user_roles(user.id)?;
        Ok(UserProfile::new(user, roles))
    }

    fn ensure_email_free(&self, email: &str, except: Option<usize>) -> UserResult<()> {
        match self.user_store.get_user_by_email(email)? {
            Some(existing) if Some(existing.id) != except => Err(UserError::Validation(
                ValidationErrors::single("email", "The email has already been taken."),
            )),
            _ => Ok(()),
        }
    }

    /// Creates a user with password credentials and the Regular role.
    pub fn add_user(&self, name: &str, email: &str, password: &str) -> UserResult<User> {
        let email = normalize_email(email);
        let mut errors = ValidationErrors::new();
        check_name(&mut errors, name);
        check_email(&mut errors, &email);
        check_password(&mut errors, password);
        if !errors.is_empty() {
            return Err(UserError::Validation(errors));
        }
        self.ensure_email_free(&email, None)?;

        let user_id = self.user_store.create_user(name.trim(), &email)?;
        self.user_store
            .set_password_credentials(&PasswordCredentials::create(user_id, password)?)?;
        self.user_store.add_user_role(user_id, UserRole::Regular)?;
        info!("Created user {} ({})", user_id, email);

        self.user_store
            .get_user(user_id)?
            .ok_or(UserError::NotFound)
    }

    pub fn register(&self, registration: &Registration) -> UserResult<(UserProfile, AuthToken)> {
        if registration.password != registration.password_confirmation {
            let mut errors = ValidationErrors::new();
            check_name(&mut errors, &registration.name);
            check_email(&mut errors, &normalize_email(&registration.email));
            check_password(&mut errors, &registration.password);
            errors.add("password", "The password confirmation does not match.");
            return Err(UserError::Validation(errors));
        }
        let user = self.add_user(
            &registration.name,
            &registration.email,
            &registration.password,
        )?;
        let token = self.generate_auth_token(user.id)?;
        Ok((self.profile(user)?, token))
    }

    /// Checks the password and issues a new session token.
    pub fn login(&self, email: &str, password: &str) -> UserResult<(UserProfile, AuthToken)> {
        let email = normalize_email(email);
        let mut errors = ValidationErrors::new();
        check_email(&mut errors, &email);
        if password.is_empty() {
            errors.add("password", "The password field is required.");
        }
        if !errors.is_empty() {
            return Err(UserError::Validation(errors));
        }

        let user = self
            .user_store
            .get_user_by_email(&email)?
            .ok_or(UserError::InvalidCredentials)?;
        let credentials = self
            .user_store
            .get_password_credentials(user.id)?
            .ok_or(UserError::InvalidCredentials)?;

        let verified = credentials.verify(password)?;
        self.user_store.record_password_attempt(user.id, verified)?;
        if !verified {
            debug!("Wrong password for user {}", user.id);
            return Err(UserError::InvalidCredentials);
        }

        let token = self.generate_auth_token(user.id)?;
        Ok((self.profile(user)?, token))
    }

    pub fn generate_auth_token(&self, user_id: usize) -> UserResult<AuthToken> {
        let token = AuthToken {
            user_id,
            value: AuthTokenValue::generate(),
            created: SystemTime::now(),
            last_used: None,
        };
        self.user_store.add_user_auth_token(&token)?;
        Ok(token)
    }

    pub fn get_auth_token(&self, value: &AuthTokenValue) -> UserResult<Option<AuthToken>> {
        Ok(self.user_store.get_user_auth_token(value)?)
    }

    pub fn touch_auth_token(&self, value: &AuthTokenValue) -> UserResult<()> {
        Ok(self
            .user_store
            .update_user_auth_token_last_used_timestamp(value)?)
    }

    /// Deletes `token_value` if it belongs to `user_id`.
    pub fn delete_auth_token(&self, user_id: usize, token_value: &AuthTokenValue) -> UserResult<()> {
        let owned = self
            .user_store
            .get_user_auth_token(token_value)?
            .is_some_and(|token| token.user_id == user_id);
        if !owned {
            return Err(UserError::NotFound);
        }
        self.user_store.delete_user_auth_token(token_value)?;
        Ok(())
    }

    pub fn set_password(&self, user_id: usize, password: &str) -> UserResult<()> {
        let mut errors = ValidationErrors::new();
        check_password(&mut errors, password);
        if !errors.is_empty() {
            return Err(UserError::Validation(errors));
        }
        self.get_user(user_id)?;
        self.user_store
            .set_password_credentials(&PasswordCredentials::create(user_id, password)?)?;
        Ok(())
    }

    pub fn get_user(&self, user_id: usize) -> UserResult<UserProfile> {
        let user = self
            .user_store
            .get_user(user_id)?
            .ok_or(UserError::NotFound)?;
        self.profile(user)
    }

    pub fn find_user_by_email(&self, email: &str) -> UserResult<UserProfile> {
        let user = self
            .user_store
            .get_user_by_email(&normalize_email(email))?
            .ok_or(UserError::NotFound)?;
        self.profile(user)
    }

    pub fn list_users(&self) -> UserResult<Vec<UserProfile>> {
        self.user_store
            .list_users()?
            .into_iter()
            .map(|user| self.profile(user))
            .collect()
    }

    /// Applies the present fields of `update`. Demoting the last admin is refused
    /// and a new password revokes every existing token.
    pub fn update_user(&self, user_id: usize, update: &UserUpdate) -> UserResult<UserProfile> {
        let current = self.get_user(user_id)?;
        let name = update
            .name
            .as_deref()
            .map(str::trim)
            .unwrap_or(&current.user.name)
            .to_string();
        let email = update
            .email
            .as_deref()
            .map(normalize_email)
            .unwrap_or_else(|| current.user.email.clone());

        let mut errors = ValidationErrors::new();
        check_name(&mut errors, &name);
        check_email(&mut errors, &email);
        if let Some(password) = update.password.as_deref() {
            check_password(&mut errors, password);
        }
        if !errors.is_empty() {
            return Err(UserError::Validation(errors));
        }
        self.ensure_email_free(&email, Some(user_id))?;

        if update.is_admin == Some(false)
            && current.is_admin
            && self.user_store.count_users_with_role(UserRole::Admin)? <= 1
        {
            return Err(UserError::LastAdmin);
        }

        self.user_store
            .update_user(user_id, &name, &email)
            .with_context(|| format!("Failed to update user {}", user_id))?;
        match update.is_admin {
            Some(true) => self.user_store.add_user_role(user_id, UserRole::Admin)?,
            Some(false) => self.user_store.remove_user_role(user_id, UserRole::Admin)?,
            None => {}
        }
        if let Some(password) = update.password.as_deref() {
            self.user_store
                .set_password_credentials(&PasswordCredentials::create(user_id, password)?)?;
            let revoked = self.user_store.delete_all_user_auth_tokens(user_id)?;
            info!("Password of user {} replaced, {} sessions revoked", user_id, revoked);
        }
        self.get_user(user_id)
    }

    /// Removes the user, its credentials, tokens and roles. The last admin
    /// cannot be deleted.
    pub fn delete_user(&self, user_id: usize) -> UserResult<()> {
        let user = self.get_user(user_id)?;
        if user.is_admin && self.user_store.count_users_with_role(UserRole::Admin)? <= 1 {
            return Err(UserError::LastAdmin);
        }
        if !self.user_store.delete_user(user_id)? {
            return Err(UserError::NotFound);
        }
        info!("Deleted user {} ({})", user_id, user.user.email);
        Ok(())
    }

    pub fn get_user_roles(&self, user_id: usize) -> UserResult<Vec<UserRole>> {
        Ok(self.user_store.get_user_roles(user_id)?)
    }

    pub fn get_user_permissions(&self, user_id: usize) -> UserResult<Vec<Permission>> {
        Ok(resolve_permissions(&self.user_store.get_user_roles(user_id)?))
    }

    pub fn add_user_role(&self, user_id: usize, role: UserRole) -> UserResult<()> {
        self.get_user(user_id)?;
        Ok(self.user_store.add_user_role(user_id, role)?)
    }

    pub fn remove_user_role(&self, user_id: usize, role: UserRole) -> UserResult<()> {
        self.get_user(user_id)?;
        Ok(self.user_store.remove_user_role(user_id, role)?)
    }

    pub fn counts(&self) -> UserResult<UserCounts> {
        let since = now_unix() - RECENT_REGISTRATIONS_DAYS * 24 * 60 * 60;
        Ok(UserCounts {
            total_users: self.user_store.count_users()?,
            admins: self.user_store.count_users_with_role(UserRole::Admin)?,
            registrations_last_30_days: self.user_store.count_users_created_since(since)?,
        })
    }
}
