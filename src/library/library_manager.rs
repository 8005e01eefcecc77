use super::error::{LibraryError, LibraryResult, ValidationErrors};
use super::library_store::LibraryStore;
use super::models::*;
use super::normalizer::{find_category, resolve_category};
use super::reconciler::{reconcile_category_duplicates, reconcile_category_duplicates_with_report};
use super::slug::{slug_candidates, slugify};
use super::validation::{
    non_blank, validate_category_input, validate_collection_input, validate_media_item_input,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

const TOP_CATEGORIES: usize = 10;

/// Result of importing a library archive or stream.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub failed: usize,
    pub collections: usize,
}

/// Exported library content, as stored in `media_data.json`.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct LibraryExport {
    pub data: Vec<ExportedMediaItem>,
    #[serde(default)]
    pub collections: Vec<CollectionInput>,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct ExportedMediaItem {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(flatten)]
    pub item: MediaItemInput,
}

pub struct LibraryManager {
    store: Arc<dyn LibraryStore>,
}

impl LibraryManager {
    pub fn new(store: Arc<dyn LibraryStore>) -> Self {
        LibraryManager { store }
    }

    // ---------------------------------------------------------------------
    // Categories
    // ---------------------------------------------------------------------

    pub fn list_categories(&self, filter: &CategoryFilter) -> LibraryResult<Vec<CategorySummary>> {
        Ok(self.store.list_categories(filter)?)
    }

    pub fn get_category(&self, id: i64) -> LibraryResult<Category> {
        self.store
            .get_category(id)?
            .ok_or(LibraryError::NotFound("Category"))
    }

    fn check_name_available(
        &self,
        name: &str,
        except_id: Option<i64>,
        errors: &mut ValidationErrors,
    ) -> LibraryResult<()> {
        if let Some(existing) = self.store.find_category_by_name_ignore_case(name)? {
            if Some(existing.id) != except_id {
                errors.add("name", "The name has already been taken.");
            }
        }
        Ok(())
    }

    fn slug_taken(&self, slug: &str, except_id: Option<i64>) -> LibraryResult<bool> {
        Ok(self
            .store
            .find_category_by_slug(slug)?
            .map_or(false, |c| Some(c.id) != except_id))
    }

    fn free_slug_for(&self, name: &str, except_id: Option<i64>) -> LibraryResult<String> {
        for candidate in slug_candidates(&slugify(name)) {
            if !self.slug_taken(&candidate, except_id)? {
                return Ok(candidate);
            }
        }
        Err(LibraryError::validation("slug", "No free slug available."))
    }

    pub fn create_category(&self, input: &CategoryInput) -> LibraryResult<Category> {
        let mut errors = validate_category_input(input);
        let name = input.name.trim().to_string();
        if !errors.has("name") {
            self.check_name_available(&name, None, &mut errors)?;
        }
        let explicit_slug = non_blank(input.slug.as_deref());
        if let Some(slug) = &explicit_slug {
            if !errors.has("slug") && self.slug_taken(slug, None)? {
                errors.add("slug", "The slug has already been taken.");
            }
        }
        errors.into_result()?;

        let slug = match explicit_slug {
            Some(slug) => slug,
            None => self.free_slug_for(&name, None)?,
        };
        let category = self.store.insert_category(&NewCategory {
            name,
            slug,
            description: non_blank(input.description.as_deref()),
            color: non_blank(input.color.as_deref()),
            is_active: input.is_active.unwrap_or(true),
            sort_order: input.sort_order.unwrap_or(0),
        })?;
        info!("Created category {} ({})", category.name, category.id);
        Ok(category)
    }

    /// Absent optional fields keep their value, blank strings clear them.
    /// The slug is re-derived only when the name changed and no slug was
    /// given.
    pub fn update_category(&self, id: i64, input: &CategoryInput) -> LibraryResult<Category> {
        let existing = self.get_category(id)?;
        let mut errors = validate_category_input(input);
        let name = input.name.trim().to_string();
        if !errors.has("name") {
            self.check_name_available(&name, Some(id), &mut errors)?;
        }
        let explicit_slug = non_blank(input.slug.as_deref());
        if let Some(slug) = &explicit_slug {
            if !errors.has("slug") && self.slug_taken(slug, Some(id))? {
                errors.add("slug", "The slug has already been taken.");
            }
        }
        errors.into_result()?;

        let slug = match explicit_slug {
            Some(slug) => slug,
            None if name != existing.name => self.free_slug_for(&name, Some(id))?,
            None => existing.slug.clone(),
        };
        let keep_or_clear = |value: &Option<String>, current: &Option<String>| match value {
            None => current.clone(),
            Some(v) => non_blank(Some(v)),
        };
        let updated = NewCategory {
            name,
            slug,
            description: keep_or_clear(&input.description, &existing.description),
            color: keep_or_clear(&input.color, &existing.color),
            is_active: input.is_active.unwrap_or(existing.is_active),
            sort_order: input.sort_order.unwrap_or(existing.sort_order),
        };
        self.store
            .update_category(id, &updated)?
            .ok_or(LibraryError::NotFound("Category"))
    }

    pub fn delete_category(&self, id: i64) -> LibraryResult<()> {
        self.get_category(id)?;
        if self.store.count_media_items_in_category(id)? > 0 {
            return Err(LibraryError::validation(
                "category",
                "Cannot delete a category that still has media items.",
            ));
        }
        self.store.delete_category(id)?;
        Ok(())
    }

    pub fn find_or_create_category(&self, name: &str) -> LibraryResult<Category> {
        resolve_category(self.store.as_ref(), name)
    }

    pub fn category_statistics(&self) -> LibraryResult<CategoryStatistics> {
        Ok(self.store.get_category_statistics(TOP_CATEGORIES)?)
    }

    /// Merges duplicate categories. Never fails.
    pub fn reconcile_category_duplicates(&self) {
        reconcile_category_duplicates(self.store.as_ref());
    }

    /// Merges duplicate categories and returns the report together with the
    /// number of categories left.
    pub fn cleanup_duplicate_categories(&self) -> LibraryResult<(ReconcileReport, usize)> {
        let report = reconcile_category_duplicates_with_report(self.store.as_ref());
        let remaining = self.store.count_categories()?;
        Ok((report, remaining))
    }

    pub fn find_duplicate_categories(&self) -> LibraryResult<Vec<DuplicateGroup>> {
        Ok(self.store.find_duplicate_category_groups()?)
    }

    /// Creates a category for every distinct legacy text and links every
    /// unlinked media item through the normalizer. With `dry_run` nothing is
    /// written and the counts describe what would happen.
    pub fn migrate_categories_from_media(
        &self,
        dry_run: bool,
    ) -> LibraryResult<CategoryMigrationReport> {
        let mut report = CategoryMigrationReport::default();
        let mut planned: HashSet<String> = HashSet::new();

        for name in self.store.get_distinct_legacy_categories()? {
            let key = name.to_lowercase();
            if find_category(self.store.as_ref(), &name)?.is_some() || planned.contains(&key) {
                report.existing_categories += 1;
                continue;
            }
            if !dry_run {
                resolve_category(self.store.as_ref(), &name)?;
            }
            planned.insert(key);
            report.created_categories += 1;
        }

        for (item_id, text) in self.store.get_unlinked_media_items()? {
            if !dry_run {
                let category = resolve_category(self.store.as_ref(), &text)?;
                self.store.set_media_item_category_id(item_id, category.id)?;
            }
            report.linked_items += 1;
        }

        if !dry_run {
            info!(
                "Category migration: {} existing, {} created, {} media items linked",
                report.existing_categories, report.created_categories, report.linked_items
            );
        }
        Ok(report)
    }

    /// Links unlinked media items to the category with exactly the same
    /// name. Items whose text matches no category are reported, not created.
    pub fn link_media_to_categories(&self, dry_run: bool) -> LibraryResult<LinkReport> {
        let mut report = LinkReport::default();
        let mut by_name: HashMap<String, Option<Category>> = HashMap::new();

        for (item_id, text) in self.store.get_unlinked_media_items()? {
            let category = match by_name.get(&text) {
                Some(cached) => cached.clone(),
                None => {
                    let found = self.store.find_category_by_exact_name(&text)?;
                    by_name.insert(text.clone(), found.clone());
                    found
                }
            };
            match category {
                Some(category) => {
                    if !dry_run {
                        self.store.set_media_item_category_id(item_id, category.id)?;
                    }
                    report.linked += 1;
                }
                None => {
                    if !report.unmatched.contains(&text) {
                        report.unmatched.push(text);
                    }
                }
            }
        }
        Ok(report)
    }

    // ---------------------------------------------------------------------
    // Media items
    // ---------------------------------------------------------------------

    pub fn list_media_items(&self, user_id: usize, query: &MediaQuery) -> LibraryResult<Vec<MediaItem>> {
        Ok(self.store.list_media_items(user_id, query)?)
    }

    pub fn get_media_item(&self, user_id: usize, id: i64) -> LibraryResult<MediaItem> {
        self.store
            .get_media_item(user_id, id)?
            .ok_or(LibraryError::NotFound("Media item"))
    }

    fn ensure_category_exists(&self, category_id: i64) -> LibraryResult<()> {
        if self.store.get_category(category_id)?.is_none() {
            return Err(LibraryError::validation(
                "category_id",
                "The selected category does not exist.",
            ));
        }
        Ok(())
    }

    /// Decides the `category_id` to store next to the legacy text.
    fn resolve_item_category(
        &self,
        text: Option<&str>,
        category_id: Option<i64>,
        previous: Option<&MediaItem>,
    ) -> LibraryResult<Option<i64>> {
        let Some(text) = text else {
            // clearing the legacy text clears the relation too
            let cleared = previous.map_or(false, |prev| prev.category.is_some());
            return match category_id {
                Some(id) if !cleared => {
                    self.ensure_category_exists(id)?;
                    Ok(Some(id))
                }
                _ => Ok(None),
            };
        };

        // an unchanged id next to a renamed text is stale, first text keeps the id
        let requested = match (category_id, previous) {
            (Some(id), Some(prev))
                if prev.category_id == Some(id)
                    && prev
                        .category
                        .as_deref()
                        .map_or(false, |old| old.trim().to_lowercase() != text.to_lowercase()) =>
            {
                None
            }
            (id, _) => id,
        };

        match requested {
            Some(id) => {
                self.ensure_category_exists(id)?;
                Ok(Some(id))
            }
            None => Ok(Some(resolve_category(self.store.as_ref(), text)?.id)),
        }
    }

    fn prepare_record(
        &self,
        input: &MediaItemInput,
        previous: Option<&MediaItem>,
    ) -> LibraryResult<MediaItemRecord> {
        validate_media_item_input(input).into_result()?;
        let category = non_blank(input.category.as_deref());
        let category_id =
            self.resolve_item_category(category.as_deref(), input.category_id, previous)?;
        Ok(MediaItemRecord {
            title: input.title.trim().to_string(),
            category,
            category_id,
            release: non_blank(input.release.as_deref()),
            rating: input.rating,
            count: input.count.unwrap_or(0),
            platforms: non_blank(input.platforms.as_deref()),
            genre: non_blank(input.genre.as_deref()),
            link: non_blank(input.link.as_deref()),
            image_path: non_blank(input.image_path.as_deref()),
            discovered: non_blank(input.discovered.as_deref()),
            playtime_minutes: input.playtime_minutes,
            is_airing: input.is_airing.unwrap_or(false),
            next_season: input.next_season,
            next_season_release: non_blank(input.next_season_release.as_deref()),
            external_id: non_blank(input.external_id.as_deref()),
        })
    }

    /// Saves a media item, creating it when `id` is `None`.
    ///
    /// The category is resolved before writing: a non-blank legacy text
    /// without a `category_id` goes through the normalizer, a blank one nulls
    /// both columns. Both columns are written in the same statement.
    pub fn save_media_item(
        &self,
        user_id: usize,
        id: Option<i64>,
        input: &MediaItemInput,
    ) -> LibraryResult<MediaItem> {
        match id {
            None => {
                let record = self.prepare_record(input, None)?;
                Ok(self.store.insert_media_item(user_id, &record)?)
            }
            Some(id) => {
                let previous = self.get_media_item(user_id, id)?;
                let record = self.prepare_record(input, Some(&previous))?;
                self.store
                    .update_media_item(user_id, id, &record)?
                    .ok_or(LibraryError::NotFound("Media item"))
            }
        }
    }

    pub fn delete_media_item(&self, user_id: usize, id: i64) -> LibraryResult<()> {
        if !self.store.delete_media_item(user_id, id)? {
            return Err(LibraryError::NotFound("Media item"));
        }
        Ok(())
    }

    /// Makes the user's library match `items`: entries carrying the id of an
    /// owned item update it, the others are created, and owned items missing
    /// from the request are deleted. All entries are validated up front.
    pub fn sync_media_items(
        &self,
        user_id: usize,
        items: &[SyncMediaItem],
    ) -> LibraryResult<SyncStats> {
        let mut errors = ValidationErrors::new();
        for (index, entry) in items.iter().enumerate() {
            let item_errors = validate_media_item_input(&entry.item);
            if let Some(message) = item_errors.first_message() {
                errors.add(&format!("{}", index), message);
            }
        }
        errors.into_result()?;

        let existing: HashMap<i64, MediaItem> = self
            .store
            .list_media_items(user_id, &MediaQuery::default())?
            .into_iter()
            .map(|item| (item.id, item))
            .collect();

        let mut stats = SyncStats::default();
        let mut kept: HashSet<i64> = HashSet::new();
        for entry in items {
            match entry.id.and_then(|id| existing.get(&id)) {
                Some(previous) => {
                    let record = self.prepare_record(&entry.item, Some(previous))?;
                    if record.matches(previous) {
                        stats.unchanged += 1;
                    } else {
                        self.store.update_media_item(user_id, previous.id, &record)?;
                        stats.updated += 1;
                    }
                    kept.insert(previous.id);
                }
                None => {
                    let record = self.prepare_record(&entry.item, None)?;
                    let created = self.store.insert_media_item(user_id, &record)?;
                    kept.insert(created.id);
                    stats.created += 1;
                }
            }
        }

        for id in existing.keys().filter(|id| !kept.contains(id)) {
            if self.store.delete_media_item(user_id, *id)? {
                stats.deleted += 1;
            }
        }
        Ok(stats)
    }

    /// Legacy text when present, otherwise the related category's name.
    pub fn display_category(&self, item: &MediaItem) -> LibraryResult<Option<String>> {
        if let Some(text) = non_blank(item.category.as_deref()) {
            return Ok(Some(text));
        }
        match item.category_id {
            Some(id) => Ok(self.store.get_category(id)?.map(|c| c.name)),
            None => Ok(None),
        }
    }

    // ---------------------------------------------------------------------
    // Collections
    // ---------------------------------------------------------------------

    fn validate_collection(&self, user_id: usize, input: &CollectionInput) -> LibraryResult<()> {
        let mut errors = validate_collection_input(input);
        for media_item_id in &input.media_item_ids {
            if self.store.get_media_item(user_id, *media_item_id)?.is_none() {
                errors.add(
                    "media_item_ids",
                    format!("Media item {} does not exist.", media_item_id),
                );
            }
        }
        errors.into_result()
    }

    pub fn list_collections(&self, user_id: usize) -> LibraryResult<Vec<Collection>> {
        Ok(self.store.list_collections(user_id)?)
    }

    pub fn get_collection(&self, user_id: usize, id: i64) -> LibraryResult<Collection> {
        self.store
            .get_collection(user_id, id)?
            .ok_or(LibraryError::NotFound("Collection"))
    }

    pub fn create_collection(&self, user_id: usize, input: &CollectionInput) -> LibraryResult<Collection> {
        self.validate_collection(user_id, input)?;
        Ok(self.store.insert_collection(user_id, input)?)
    }

    pub fn update_collection(
        &self,
        user_id: usize,
        id: i64,
        input: &CollectionInput,
    ) -> LibraryResult<Collection> {
        self.get_collection(user_id, id)?;
        self.validate_collection(user_id, input)?;
        self.store
            .update_collection(user_id, id, input)?
            .ok_or(LibraryError::NotFound("Collection"))
    }

    pub fn delete_collection(&self, user_id: usize, id: i64) -> LibraryResult<()> {
        if !self.store.delete_collection(user_id, id)? {
            return Err(LibraryError::NotFound("Collection"));
        }
        Ok(())
    }

    pub fn replace_collections(
        &self,
        user_id: usize,
        inputs: &[CollectionInput],
    ) -> LibraryResult<Vec<Collection>> {
        for input in inputs {
            self.validate_collection(user_id, input)?;
        }
        Ok(self.store.replace_collections(user_id, inputs)?)
    }

    pub fn add_media_to_collection(
        &self,
        user_id: usize,
        id: i64,
        media_item_id: i64,
    ) -> LibraryResult<Collection> {
        self.get_media_item(user_id, media_item_id)?;
        self.store
            .add_media_to_collection(user_id, id, media_item_id)?
            .ok_or(LibraryError::NotFound("Collection"))
    }

    pub fn remove_media_from_collection(
        &self,
        user_id: usize,
        id: i64,
        media_item_id: i64,
    ) -> LibraryResult<Collection> {
        self.store
            .remove_media_from_collection(user_id, id, media_item_id)?
            .ok_or(LibraryError::NotFound("Collection"))
    }

    // ---------------------------------------------------------------------
    // Import / export / users
    // ---------------------------------------------------------------------

    /// Snapshot of the user's library. Items carry their display category
    /// as text since category ids are not portable between databases.
    pub fn export_library(&self, user_id: usize) -> LibraryResult<LibraryExport> {
        let items = self
            .store
            .list_media_items(user_id, &MediaQuery::default())?;
        let mut data = Vec::with_capacity(items.len());
        for item in items.iter().rev() {
            let mut exported = MediaItemInput::from(item);
            exported.category = self.display_category(item)?;
            exported.category_id = None;
            data.push(ExportedMediaItem {
                id: Some(item.id),
                item: exported,
            });
        }
        let collections = self
            .store
            .list_collections(user_id)?
            .into_iter()
            .map(|c| CollectionInput {
                name: c.name,
                description: c.description,
                media_item_ids: c.media_item_ids,
            })
            .collect();
        Ok(LibraryExport { data, collections })
    }

    /// Saves one imported item through the regular save path. The archive's
    /// category id is ignored in favour of its text.
    pub fn import_media_item(&self, user_id: usize, item: &MediaItemInput) -> LibraryResult<MediaItem> {
        let mut item = item.clone();
        item.category_id = None;
        self.save_media_item(user_id, None, &item)
    }

    /// Imports an exported library into the user's library. Invalid items
    /// are skipped and counted; collections are re-pointed to the new ids.
    pub fn import_library(&self, user_id: usize, export: &LibraryExport) -> LibraryResult<ImportReport> {
        let mut report = ImportReport::default();
        let mut id_map: HashMap<i64, i64> = HashMap::new();

        for entry in &export.data {
            match self.import_media_item(user_id, &entry.item) {
                Ok(saved) => {
                    if let Some(old_id) = entry.id {
                        id_map.insert(old_id, saved.id);
                    }
                    report.imported += 1;
                }
                Err(LibraryError::Persistence(err)) => return Err(LibraryError::Persistence(err)),
                Err(err) => {
                    warn!("Skipping imported item \"{}\": {}", entry.item.title, err);
                    report.failed += 1;
                }
            }
        }

        for collection in &export.collections {
            let remapped = CollectionInput {
                name: collection.name.clone(),
                description: collection.description.clone(),
                media_item_ids: collection
                    .media_item_ids
                    .iter()
                    .filter_map(|old| id_map.get(old).copied())
                    .collect(),
            };
            if validate_collection_input(&remapped).is_empty() {
                self.store.insert_collection(user_id, &remapped)?;
                report.collections += 1;
            }
        }
        Ok(report)
    }

    /// Removes everything the user owns. Returns (media items, collections)
    /// deleted.
    pub fn delete_user_library(&self, user_id: usize) -> LibraryResult<(usize, usize)> {
        let collections = self.store.delete_user_collections(user_id)?;
        let items = self.store.delete_user_media_items(user_id)?;
        Ok((items, collections))
    }

    pub fn counts(&self) -> LibraryResult<LibraryCounts> {
        Ok(LibraryCounts {
            media_items: self.store.count_media_items()?,
            collections: self.store.count_collections()?,
            categories: self.store.count_categories()?,
        })
    }
}
