//! Media library: categories, media items and collections.

pub mod archive;
mod error;
mod library_manager;
mod library_store;
pub mod models;
pub mod normalizer;
pub mod reconciler;
mod schema;
pub mod slug;
mod sqlite_library_store;
pub mod validation;

pub use error::{LibraryError, LibraryResult, ValidationErrors};
pub use library_manager::{ExportedMediaItem, ImportReport, LibraryExport, LibraryManager};
pub use library_store::{CategoryStore, CollectionStore, LibraryStore, MediaItemStore};
pub use normalizer::resolve_category;
pub use reconciler::reconcile_category_duplicates;
pub use sqlite_library_store::SqliteLibraryStore;
