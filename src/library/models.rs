use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub is_active: bool,
    pub sort_order: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A category row together with the number of media items pointing at it.
#[derive(Clone, Debug, Serialize)]
pub struct CategorySummary {
    #[serde(flatten)]
    pub category: Category,
    pub media_items_count: usize,
}

/// Category payload accepted by the create and update endpoints.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CategoryInput {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i64>,
}

/// A validated category ready to be written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub is_active: bool,
    pub sort_order: i64,
}

impl NewCategory {
    pub fn named(name: &str, slug: &str) -> Self {
        NewCategory {
            name: name.to_string(),
            slug: slug.to_string(),
            description: None,
            color: None,
            is_active: true,
            sort_order: 0,
        }
    }
}

/// Outcome of an atomic find-or-insert on the category table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CategoryLookup {
    Existing(Category),
    Created(Category),
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CategoryFilter {
    pub active_only: bool,
    pub search: Option<String>,
}

/// Categories sharing the exact same name, ids in ascending order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub name: String,
    pub ids: Vec<i64>,
}

impl DuplicateGroup {
    pub fn survivor(&self) -> Option<i64> {
        self.ids.first().copied()
    }

    pub fn duplicates(&self) -> &[i64] {
        self.ids.get(1..).unwrap_or(&[])
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub groups_found: usize,
    pub removed_duplicates: usize,
    pub relinked_items: usize,
    /// Pairs whose rows no longer shared the group's name when merged.
    pub skipped_pairs: usize,
    pub failed_groups: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CategoryMigrationReport {
    pub existing_categories: usize,
    pub created_categories: usize,
    pub linked_items: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LinkReport {
    pub linked: usize,
    pub unmatched: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CategoryUsage {
    pub id: i64,
    pub name: String,
    pub media_items_count: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct CategoryStatistics {
    pub total_categories: usize,
    pub active_categories: usize,
    pub categories_with_media: usize,
    pub empty_categories: usize,
    pub top_categories: Vec<CategoryUsage>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: i64,
    pub user_id: usize,
    pub title: String,
    pub category: Option<String>,
    pub category_id: Option<i64>,
    pub release: Option<String>,
    pub rating: Option<i64>,
    pub count: i64,
    pub platforms: Option<String>,
    pub genre: Option<String>,
    pub link: Option<String>,
    pub image_path: Option<String>,
    pub discovered: Option<String>,
    pub playtime_minutes: Option<i64>,
    pub is_airing: bool,
    pub next_season: Option<i64>,
    pub next_season_release: Option<String>,
    pub external_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Media item payload as sent by clients, imports and sync requests.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaItemInput {
    pub title: String,
    pub category: Option<String>,
    pub category_id: Option<i64>,
    pub release: Option<String>,
    pub rating: Option<i64>,
    pub count: Option<i64>,
    pub platforms: Option<String>,
    pub genre: Option<String>,
    pub link: Option<String>,
    pub image_path: Option<String>,
    pub discovered: Option<String>,
    pub playtime_minutes: Option<i64>,
    pub is_airing: Option<bool>,
    pub next_season: Option<i64>,
    pub next_season_release: Option<String>,
    pub external_id: Option<String>,
}

impl From<&MediaItem> for MediaItemInput {
    fn from(item: &MediaItem) -> Self {
        MediaItemInput {
            title: item.title.clone(),
            category: item.category.clone(),
            category_id: item.category_id,
            release: item.release.clone(),
            rating: item.rating,
            count: Some(item.count),
            platforms: item.platforms.clone(),
            genre: item.genre.clone(),
            link: item.link.clone(),
            image_path: item.image_path.clone(),
            discovered: item.discovered.clone(),
            playtime_minutes: item.playtime_minutes,
            is_airing: Some(item.is_airing),
            next_season: item.next_season,
            next_season_release: item.next_season_release.clone(),
            external_id: item.external_id.clone(),
        }
    }
}

/// The exact column values written for a media item, category already
/// resolved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediaItemRecord {
    pub title: String,
    pub category: Option<String>,
    pub category_id: Option<i64>,
    pub release: Option<String>,
    pub rating: Option<i64>,
    pub count: i64,
    pub platforms: Option<String>,
    pub genre: Option<String>,
    pub link: Option<String>,
    pub image_path: Option<String>,
    pub discovered: Option<String>,
    pub playtime_minutes: Option<i64>,
    pub is_airing: bool,
    pub next_season: Option<i64>,
    pub next_season_release: Option<String>,
    pub external_id: Option<String>,
}

impl MediaItemRecord {
    pub fn matches(&self, item: &MediaItem) -> bool {
        self.title == item.title
            && self.category == item.category
            && self.category_id == item.category_id
            && self.release == item.release
            && self.rating == item.rating
            && self.count == item.count
            && self.platforms == item.platforms
            && self.genre == item.genre
            && self.link == item.link
            && self.image_path == item.image_path
            && self.discovered == item.discovered
            && self.playtime_minutes == item.playtime_minutes
            && self.is_airing == item.is_airing
            && self.next_season == item.next_season
            && self.next_season_release == item.next_season_release
            && self.external_id == item.external_id
    }
}

/// Entry of a sync request. Entries carrying the id of an owned item update
/// it, everything else is created.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SyncMediaItem {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(flatten)]
    pub item: MediaItemInput,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSort {
    Title,
    Rating,
    Release,
    CreatedAt,
    UpdatedAt,
}

impl MediaSort {
    pub fn column(&self) -> &'static str {
        match self {
            MediaSort::Title => "title",
            MediaSort::Rating => "rating",
            MediaSort::Release => "release",
            MediaSort::CreatedAt => "created_at",
            MediaSort::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct MediaQuery {
    /// Matches the legacy text or the related category's name.
    pub category: Option<String>,
    pub search: Option<String>,
    pub rating_min: Option<i64>,
    pub rating_max: Option<i64>,
    pub playtime_min: Option<i64>,
    pub playtime_max: Option<i64>,
    pub is_airing: Option<bool>,
    /// Only items updated after this unix timestamp.
    pub since: Option<i64>,
    pub sort: Option<MediaSort>,
    pub order: Option<SortOrder>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: i64,
    pub user_id: usize,
    pub name: String,
    pub description: Option<String>,
    pub media_item_ids: Vec<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionInput {
    pub name: String,
    pub description: Option<String>,
    pub media_item_ids: Vec<i64>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct LibraryCounts {
    pub media_items: usize,
    pub collections: usize,
    pub categories: usize,
}
