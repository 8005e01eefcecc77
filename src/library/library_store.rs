use super::models::*;
use anyhow::Result;

pub trait CategoryStore: Send + Sync {
    /// Returns the category with the given id.
    /// Returns Ok(None) if it does not exist.
    fn get_category(&self, id: i64) -> Result<Option<Category>>;

    /// Returns the lowest-id category whose name equals `name` exactly.
    fn find_category_by_exact_name(&self, name: &str) -> Result<Option<Category>>;

    /// Returns the lowest-id category whose name equals `name` ignoring case.
    fn find_category_by_name_ignore_case(&self, name: &str) -> Result<Option<Category>>;

    fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    /// Lists categories ordered by sort order, then name.
    fn list_categories(&self, filter: &CategoryFilter) -> Result<Vec<CategorySummary>>;

    /// Inserts a category as-is. Fails if the slug is already taken.
    fn insert_category(&self, category: &NewCategory) -> Result<Category>;

    /// Atomically looks `name` up (exact, then ignoring case) and inserts it
    /// when missing, picking the first free slug derived from `base_slug`.
    fn create_category_if_absent(&self, name: &str, base_slug: &str) -> Result<CategoryLookup>;

    /// Overwrites the category's fields.
    /// Returns Ok(None) if the category does not exist.
    fn update_category(&self, id: i64, category: &NewCategory) -> Result<Option<Category>>;

    /// Returns false if the category did not exist.
    fn delete_category(&self, id: i64) -> Result<bool>;

    fn count_media_items_in_category(&self, id: i64) -> Result<usize>;

    /// Returns all groups of categories sharing the exact same name.
    fn find_duplicate_category_groups(&self) -> Result<Vec<DuplicateGroup>>;

    /// In a single transaction, re-points every media item from `duplicate_id`
    /// to `survivor_id` and deletes `duplicate_id`.
    /// Returns the number of media items moved, or `None` without touching
    /// anything unless both rows are still named exactly `name`.
    fn merge_category_into(
        &self,
        name: &str,
        duplicate_id: i64,
        survivor_id: i64,
    ) -> Result<Option<usize>>;

    fn count_categories(&self) -> Result<usize>;

    fn get_category_statistics(&self, top: usize) -> Result<CategoryStatistics>;
}

pub trait MediaItemStore: Send + Sync {
    /// Returns the user's media item with the given id.
    /// Returns Ok(None) if it does not exist or is owned by someone else.
    fn get_media_item(&self, user_id: usize, id: i64) -> Result<Option<MediaItem>>;

    fn list_media_items(&self, user_id: usize, query: &MediaQuery) -> Result<Vec<MediaItem>>;

    /// Writes a new media item, both category columns in one statement.
    fn insert_media_item(&self, user_id: usize, record: &MediaItemRecord) -> Result<MediaItem>;

    /// Returns Ok(None) if the item does not exist or is owned by someone else.
    fn update_media_item(
        &self,
        user_id: usize,
        id: i64,
        record: &MediaItemRecord,
    ) -> Result<Option<MediaItem>>;

    /// Deletes the item and drops its id from the user's collections.
    /// Returns false if the item did not exist.
    fn delete_media_item(&self, user_id: usize, id: i64) -> Result<bool>;

    /// Deletes all of a user's media items, returns how many were removed.
    fn delete_user_media_items(&self, user_id: usize) -> Result<usize>;

    fn count_media_items(&self) -> Result<usize>;

    /// Distinct non-blank legacy category texts, trimmed.
    fn get_distinct_legacy_categories(&self) -> Result<Vec<String>>;

    /// Items with a legacy category text but no category id, as
    /// `(item id, trimmed legacy text)`.
    fn get_unlinked_media_items(&self) -> Result<Vec<(i64, String)>>;

    fn set_media_item_category_id(&self, id: i64, category_id: i64) -> Result<()>;
}

pub trait CollectionStore: Send + Sync {
    fn list_collections(&self, user_id: usize) -> Result<Vec<Collection>>;

    /// Returns Ok(None) if the collection does not exist or is owned by
    /// someone else.
    fn get_collection(&self, user_id: usize, id: i64) -> Result<Option<Collection>>;

    fn insert_collection(&self, user_id: usize, input: &CollectionInput) -> Result<Collection>;

    fn update_collection(
        &self,
        user_id: usize,
        id: i64,
        input: &CollectionInput,
    ) -> Result<Option<Collection>>;

    fn delete_collection(&self, user_id: usize, id: i64) -> Result<bool>;

    /// Replaces all of the user's collections in one transaction.
    fn replace_collections(
        &self,
        user_id: usize,
        inputs: &[CollectionInput],
    ) -> Result<Vec<Collection>>;

    /// Appends the media item id unless already present.
    fn add_media_to_collection(
        &self,
        user_id: usize,
        id: i64,
        media_item_id: i64,
    ) -> Result<Option<Collection>>;

    fn remove_media_from_collection(
        &self,
        user_id: usize,
        id: i64,
        media_item_id: i64,
    ) -> Result<Option<Collection>>;

    fn delete_user_collections(&self, user_id: usize) -> Result<usize>;

    fn count_collections(&self) -> Result<usize>;
}

pub trait LibraryStore: CategoryStore + MediaItemStore + CollectionStore + Send + Sync {}

impl<T: CategoryStore + MediaItemStore + CollectionStore + Send + Sync> LibraryStore for T {}
