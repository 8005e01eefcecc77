//! Maps free-text category names onto canonical category rows.

use super::error::{LibraryError, LibraryResult};
use super::library_store::CategoryStore;
use super::models::{Category, CategoryLookup};
use super::slug::slugify;
use crate::server::metrics;
use rusqlite::ErrorCode;
use tracing::{debug, warn};

const MAX_RESOLVE_ATTEMPTS: usize = 3;

/// True when `err` comes from a write that lost against a concurrent writer:
/// a constraint violation or a busy/locked database.
pub fn is_insert_race(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(e, _))
                if matches!(
                    e.code,
                    ErrorCode::ConstraintViolation
                        | ErrorCode::DatabaseBusy
                        | ErrorCode::DatabaseLocked
                )
        )
    })
}

/// Exact match first, then a case-insensitive one. Never creates.
pub fn find_category<S: CategoryStore + ?Sized>(
    store: &S,
    name: &str,
) -> anyhow::Result<Option<Category>> {
    if let Some(exact) = store.find_category_by_exact_name(name)? {
        return Ok(Some(exact));
    }
    store.find_category_by_name_ignore_case(name)
}

/// Returns the category for `name`, creating it when no category matches
/// exactly or ignoring case. Surrounding whitespace is ignored and at most
/// one row is created per call.
pub fn resolve_category<S: CategoryStore + ?Sized>(store: &S, name: &str) -> LibraryResult<Category> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LibraryError::validation(
            "category",
            "The category name must not be empty.",
        ));
    }

    for attempt in 1..=MAX_RESOLVE_ATTEMPTS {
        if let Some(found) = find_category(store, name)? {
            return Ok(found);
        }

        match store.create_category_if_absent(name, &slugify(name)) {
            Ok(CategoryLookup::Created(category)) => {
                debug!("Created category \"{}\" (id {})", category.name, category.id);
                metrics::record_category_created();
                return Ok(category);
            }
            Ok(CategoryLookup::Existing(category)) => return Ok(category),
            Err(err) if is_insert_race(&err) => {
                warn!(
                    "Category \"{}\" insert raced with another writer (attempt {}): {:#}",
                    name, attempt, err
                );
            }
            Err(err) => return Err(LibraryError::Persistence(err)),
        }
    }

    find_category(store, name)?.ok_or_else(|| {
        LibraryError::Persistence(anyhow::anyhow!(
            "Could not resolve category \"{}\" after {} attempts",
            name,
            MAX_RESOLVE_ATTEMPTS
        ))
    })
}
