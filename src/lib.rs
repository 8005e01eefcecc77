//! Media Library Server
//!
//! Personal media cataloguing: categories, media items and collections,
//! plus the background jobs that keep the category table tidy.

pub mod background_jobs;
pub mod config;
pub mod library;
pub mod server;
pub mod server_store;
pub mod sqlite_persistence;
pub mod user;

// Re-export commonly used types for convenience
pub use library::{LibraryManager, SqliteLibraryStore};
pub use server::{make_app, run_server, RequestsLoggingLevel};
pub use server_store::{ServerStore, SqliteServerStore};
pub use user::{SqliteUserStore, UserManager, UserRole};
