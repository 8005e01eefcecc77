//! Test database creation

use super::constants::*;
use anyhow::Result;
use media_library_server::user::{SqliteUserStore, UserManager, UserRole};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Creates a temporary db directory with a regular user and an admin.
/// Returns (temp_dir, user_db_path).
pub fn create_test_db_with_users() -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    let user_db_path = dir.path().join("user.db");

    let user_manager = UserManager::new(Arc::new(SqliteUserStore::new(&user_db_path)?));
    user_manager.add_user(TEST_USER_NAME, TEST_USER, TEST_PASS)?;
    let admin = user_manager.add_user(ADMIN_USER_NAME, ADMIN_USER, ADMIN_PASS)?;
    user_manager.add_user_role(admin.id, UserRole::Admin)?;

    Ok((dir, user_db_path))
}
