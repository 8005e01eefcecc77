use super::auth::{AuthToken, AuthTokenValue, CredentialsHasher, PasswordCredentials};
use super::permissions::UserRole;
use super::user_models::User;
use super::user_store::{UserAuthCredentialsStore, UserAuthTokenStore, UserStore};
use crate::sqlite_column;
use crate::sqlite_persistence::{
    lock_conn, open_versioned_db, Column, ForeignKey, ForeignKeyOnChange, SqlType, Table,
    VersionedSchema, DEFAULT_TIMESTAMP,
};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing::warn;

const NOW: &str = "cast(strftime('%s','now') as int)";

/// V 0
const USER_TABLE_V_0: Table = Table {
    name: "user",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("email", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[("idx_user_email", "email")],
};
const AUTH_TOKEN_TABLE_V_0: Table = Table {
    name: "auth_token",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "user",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("value", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    unique_constraints: &[],
    indices: &[("idx_auth_token_value", "value")],
};
const USER_PASSWORD_CREDENTIALS_V_0: Table = Table {
    name: "user_password_credentials",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            is_unique = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "user",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("salt", &SqlType::Text, non_null = true),
        sqlite_column!("hash", &SqlType::Text, non_null = true),
        sqlite_column!("hasher", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_tried", &SqlType::Integer),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    unique_constraints: &[],
    indices: &[],
};

/// V 1
const USER_ROLE_TABLE_V_1: Table = Table {
    name: "user_role",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "user",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("role", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[&["user_id", "role"]],
    indices: &[("idx_user_role_user_id", "user_id")],
};

/// Every user existing before roles were introduced becomes Regular.
fn migrate_v0_to_v1(conn: &Connection) -> Result<()> {
    USER_ROLE_TABLE_V_1.create(conn)?;
    conn.execute(
        "INSERT INTO user_role (user_id, role) SELECT id, ?1 FROM user",
        params![UserRole::Regular.to_string()],
    )?;
    Ok(())
}

pub const USER_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[
            USER_TABLE_V_0,
            AUTH_TOKEN_TABLE_V_0,
            USER_PASSWORD_CREDENTIALS_V_0,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[
            USER_TABLE_V_0,
            AUTH_TOKEN_TABLE_V_0,
            USER_PASSWORD_CREDENTIALS_V_0,
            USER_ROLE_TABLE_V_1,
        ],
        migration: Some(migrate_v0_to_v1),
    },
];

fn system_time_from_column_result(value: i64) -> SystemTime {
    SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(value.max(0) as u64)
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn auth_token_from_row(row: &Row) -> rusqlite::Result<AuthToken> {
    Ok(AuthToken {
        user_id: row.get(0)?,
        value: AuthTokenValue(row.get(1)?),
        created: system_time_from_column_result(row.get(2)?),
        last_used: row
            .get::<usize, Option<i64>>(3)?
            .map(system_time_from_column_result),
    })
}

#[derive(Clone)]
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = open_versioned_db(db_path, USER_VERSIONED_SCHEMAS, "user")?;
        Ok(SqliteUserStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl UserStore for SqliteUserStore {
    fn create_user(&self, name: &str, email: &str) -> Result<usize> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            "INSERT INTO user (name, email) VALUES (?1, ?2)",
            params![name, email],
        )
        .with_context(|| format!("Failed to create user {}", email))?;
        Ok(conn.last_insert_rowid() as usize)
    }

    fn get_user(&self, user_id: usize) -> Result<Option<User>> {
        let conn = lock_conn(&self.conn)?;
        Ok(conn
            .query_row(
                "SELECT id, name, email, created FROM user WHERE id = ?1",
                params![user_id],
                user_from_row,
            )
            .optional()?)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = lock_conn(&self.conn)?;
        Ok(conn
            .query_row(
                "SELECT id, name, email, created FROM user WHERE email = ?1",
                params![email],
                user_from_row,
            )
            .optional()?)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare("SELECT id, name, email, created FROM user ORDER BY id")?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<rusqlite::Result<Vec<User>>>()?;
        Ok(users)
    }

    fn update_user(&self, user_id: usize, name: &str, email: &str) -> Result<bool> {
        let conn = lock_conn(&self.conn)?;
        let updated = conn
            .execute(
                "UPDATE user SET name = ?1, email = ?2 WHERE id = ?3",
                params![name, email, user_id],
            )
            .with_context(|| format!("Failed to update user {}", user_id))?;
        Ok(updated > 0)
    }

    fn delete_user(&self, user_id: usize) -> Result<bool> {
        let conn = lock_conn(&self.conn)?;
        let deleted = conn.execute("DELETE FROM user WHERE id = ?1", params![user_id])?;
        Ok(deleted > 0)
    }

    fn count_users(&self) -> Result<usize> {
        let conn = lock_conn(&self.conn)?;
        let total: usize = conn.query_row("SELECT COUNT(*) FROM user", [], |row| row.get(0))?;
        Ok(total)
    }

    fn count_users_created_since(&self, since: i64) -> Result<usize> {
        let conn = lock_conn(&self.conn)?;
        let total: usize = conn.query_row(
            "SELECT COUNT(*) FROM user WHERE created >= ?1",
            params![since],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    fn get_user_roles(&self, user_id: usize) -> Result<Vec<UserRole>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT role FROM {} WHERE user_id = ?1 ORDER BY role",
            USER_ROLE_TABLE_V_1.name
        ))?;
        let roles = stmt
            .query_map(params![user_id], |row| row.get::<usize, String>(0))?
            .filter_map(|r| r.ok().and_then(|s| UserRole::from_str(&s)))
            .collect();
        Ok(roles)
    }

    fn add_user_role(&self, user_id: usize, role: UserRole) -> Result<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {} (user_id, role) VALUES (?1, ?2)",
                USER_ROLE_TABLE_V_1.name
            ),
            params![user_id, role.to_string()],
        )?;
        Ok(())
    }

    fn remove_user_role(&self, user_id: usize, role: UserRole) -> Result<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE user_id = ?1 AND role = ?2",
                USER_ROLE_TABLE_V_1.name
            ),
            params![user_id, role.to_string()],
        )?;
        Ok(())
    }

    fn count_users_with_role(&self, role: UserRole) -> Result<usize> {
        let conn = lock_conn(&self.conn)?;
        let total: usize = conn.query_row(
            &format!(
                "SELECT COUNT(DISTINCT user_id) FROM {} WHERE role = ?1",
                USER_ROLE_TABLE_V_1.name
            ),
            params![role.to_string()],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}

impl UserAuthTokenStore for SqliteUserStore {
    fn get_user_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let conn = lock_conn(&self.conn)?;
        Ok(conn
            .query_row(
                "SELECT user_id, value, created, last_used FROM auth_token WHERE value = ?1",
                params![value.0],
                auth_token_from_row,
            )
            .optional()?)
    }

    fn delete_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let Some(existing) = self.get_user_auth_token(token)? else {
            return Ok(None);
        };
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            "DELETE FROM auth_token WHERE value = ?1",
            params![existing.value.0],
        )?;
        Ok(Some(existing))
    }

    fn update_user_auth_token_last_used_timestamp(&self, token: &AuthTokenValue) -> Result<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            &format!("UPDATE auth_token SET last_used = {} WHERE value = ?1", NOW),
            params![token.0],
        )?;
        Ok(())
    }

    fn add_user_auth_token(&self, token: &AuthToken) -> Result<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            "INSERT INTO auth_token (value, user_id) VALUES (?1, ?2)",
            params![token.value.0, token.user_id],
        )?;
        Ok(())
    }

    fn delete_all_user_auth_tokens(&self, user_id: usize) -> Result<usize> {
        let conn = lock_conn(&self.conn)?;
        Ok(conn.execute(
            "DELETE FROM auth_token WHERE user_id = ?1",
            params![user_id],
        )?)
    }
}

impl UserAuthCredentialsStore for SqliteUserStore {
    fn get_password_credentials(&self, user_id: usize) -> Result<Option<PasswordCredentials>> {
        let conn = lock_conn(&self.conn)?;
        let row = conn
            .query_row(
                "SELECT user_id, salt, hash, hasher, created, last_tried, last_used \
                 FROM user_password_credentials WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<usize, usize>(0)?,
                        row.get::<usize, String>(1)?,
                        row.get::<usize, String>(2)?,
                        row.get::<usize, String>(3)?,
                        row.get::<usize, i64>(4)?,
                        row.get::<usize, Option<i64>>(5)?,
                        row.get::<usize, Option<i64>>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((user_id, salt, hash, hasher, created, last_tried, last_used)) = row else {
            return Ok(None);
        };
        let hasher = match CredentialsHasher::from_str(&hasher) {
            Ok(hasher) => hasher,
            Err(err) => {
                warn!("User {} has unusable password credentials: {}", user_id, err);
                return Ok(None);
            }
        };
        Ok(Some(PasswordCredentials {
            user_id,
            salt,
            hash,
            hasher,
            created: system_time_from_column_result(created),
            last_tried: last_tried.map(system_time_from_column_result),
            last_used: last_used.map(system_time_from_column_result),
        }))
    }

    fn set_password_credentials(&self, credentials: &PasswordCredentials) -> Result<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            "INSERT INTO user_password_credentials (user_id, salt, hash, hasher) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(user_id) DO UPDATE SET salt = excluded.salt, hash = excluded.hash, \
             hasher = excluded.hasher",
            params![
                credentials.user_id,
                credentials.salt,
                credentials.hash,
                credentials.hasher.to_string()
            ],
        )
        .with_context(|| format!("Failed to store password of user {}", credentials.user_id))?;
        Ok(())
    }

    fn record_password_attempt(&self, user_id: usize, succeeded: bool) -> Result<()> {
        let conn = lock_conn(&self.conn)?;
        let sql = if succeeded {
            format!(
                "UPDATE user_password_credentials SET last_tried = {now}, last_used = {now} \
                 WHERE user_id = ?1",
                now = NOW
            )
        } else {
            format!(
                "UPDATE user_password_credentials SET last_tried = {} WHERE user_id = ?1",
                NOW
            )
        };
        conn.execute(&sql, params![user_id])?;
        Ok(())
    }
}
