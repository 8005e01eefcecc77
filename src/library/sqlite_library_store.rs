use super::library_store::{CategoryStore, CollectionStore, MediaItemStore};
use super::models::*;
use super::schema::LIBRARY_VERSIONED_SCHEMAS;
use super::slug::slug_candidates;
use crate::sqlite_persistence::{lock_conn, open_versioned_db};
use anyhow::{bail, Context, Result};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

const NOW: &str = "cast(strftime('%s','now') as int)";

const CATEGORY_SELECT: &str = "SELECT c.id, c.name, c.slug, c.description, c.color, c.is_active, \
     c.sort_order, c.created_at, c.updated_at FROM categories c";

const MEDIA_ITEM_SELECT: &str = "SELECT m.id, m.user_id, m.title, m.category, m.category_id, \
     m.release, m.rating, m.count, m.platforms, m.genre, m.link, m.image_path, m.discovered, \
     m.playtime_minutes, m.is_airing, m.next_season, m.next_season_release, m.external_id, \
     m.created_at, m.updated_at FROM media_items m";

const COLLECTION_SELECT: &str = "SELECT id, user_id, name, description, media_item_ids, \
     created_at, updated_at FROM collections";

/// Key used for case-insensitive name comparison.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn category_from_row(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        color: row.get(4)?,
        is_active: row.get::<_, i64>(5)? != 0,
        sort_order: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn media_item_from_row(row: &Row) -> rusqlite::Result<MediaItem> {
    Ok(MediaItem {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        category: row.get(3)?,
        category_id: row.get(4)?,
        release: row.get(5)?,
        rating: row.get(6)?,
        count: row.get(7)?,
        platforms: row.get(8)?,
        genre: row.get(9)?,
        link: row.get(10)?,
        image_path: row.get(11)?,
        discovered: row.get(12)?,
        playtime_minutes: row.get(13)?,
        is_airing: row.get::<_, i64>(14)? != 0,
        next_season: row.get(15)?,
        next_season_release: row.get(16)?,
        external_id: row.get(17)?,
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
    })
}

fn collection_from_row(row: &Row) -> rusqlite::Result<Collection> {
    let raw_ids: String = row.get(4)?;
    let media_item_ids: Vec<i64> = serde_json::from_str(&raw_ids)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    Ok(Collection {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        media_item_ids,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Removes repeated ids, keeping the first occurrence.
fn dedup_ids(ids: &[i64]) -> Vec<i64> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(*id);
        }
    }
    unique
}

fn query_category(conn: &Connection, clause: &str, param: &dyn rusqlite::ToSql) -> Result<Option<Category>> {
    let sql = format!("{} WHERE {} ORDER BY c.id ASC LIMIT 1", CATEGORY_SELECT, clause);
    Ok(conn
        .query_row(&sql, [param], category_from_row)
        .optional()?)
}

fn query_category_by_name(conn: &Connection, name: &str) -> Result<Option<Category>> {
    if let Some(exact) = query_category(conn, "c.name = ?1", &name)? {
        return Ok(Some(exact));
    }
    query_category(conn, "c.name_key = ?1", &name_key(name))
}

fn first_free_slug(conn: &Connection, base_slug: &str) -> Result<String> {
    for candidate in slug_candidates(base_slug) {
        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM categories WHERE slug = ?1)",
            params![candidate],
            |row| row.get(0),
        )?;
        if !taken {
            return Ok(candidate);
        }
    }
    bail!("No free slug derived from {}", base_slug)
}

fn query_collection(conn: &Connection, user_id: usize, id: i64) -> Result<Option<Collection>> {
    Ok(conn
        .query_row(
            &format!("{} WHERE id = ?1 AND user_id = ?2", COLLECTION_SELECT),
            params![id, user_id],
            collection_from_row,
        )
        .optional()?)
}

fn write_collection_ids(conn: &Connection, id: i64, ids: &[i64]) -> Result<()> {
    conn.execute(
        &format!(
            "UPDATE collections SET media_item_ids = ?1, updated_at = {} WHERE id = ?2",
            NOW
        ),
        params![serde_json::to_string(ids)?, id],
    )?;
    Ok(())
}

fn insert_collection_row(conn: &Connection, user_id: usize, input: &CollectionInput) -> Result<i64> {
    conn.execute(
        "INSERT INTO collections (user_id, name, description, media_item_ids) VALUES (?1, ?2, ?3, ?4)",
        params![
            user_id,
            input.name.trim(),
            input.description,
            serde_json::to_string(&dedup_ids(&input.media_item_ids))?
        ],
    )
    .with_context(|| format!("Failed to create collection {}", input.name))?;
    Ok(conn.last_insert_rowid())
}

#[derive(Clone)]
pub struct SqliteLibraryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLibraryStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = open_versioned_db(db_path, LIBRARY_VERSIONED_SCHEMAS, "library")?;
        Ok(SqliteLibraryStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl CategoryStore for SqliteLibraryStore {
    fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let conn = lock_conn(&self.conn)?;
        query_category(&conn, "c.id = ?1", &id)
    }

    fn find_category_by_exact_name(&self, name: &str) -> Result<Option<Category>> {
        let conn = lock_conn(&self.conn)?;
        query_category(&conn, "c.name = ?1", &name)
    }

    fn find_category_by_name_ignore_case(&self, name: &str) -> Result<Option<Category>> {
        let conn = lock_conn(&self.conn)?;
        query_category(&conn, "c.name_key = ?1", &name_key(name))
    }

    fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let conn = lock_conn(&self.conn)?;
        query_category(&conn, "c.slug = ?1", &slug)
    }

    fn list_categories(&self, filter: &CategoryFilter) -> Result<Vec<CategorySummary>> {
        let conn = lock_conn(&self.conn)?;
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        let sql = "SELECT c.id, c.name, c.slug, c.description, c.color, c.is_active, \
             c.sort_order, c.created_at, c.updated_at, \
             (SELECT COUNT(*) FROM media_items m WHERE m.category_id = c.id) \
             FROM categories c \
             WHERE (?1 = 0 OR c.is_active = 1) \
             AND (?2 IS NULL OR instr(lower(c.name), ?2) > 0 \
                  OR instr(lower(coalesce(c.description, '')), ?2) > 0) \
             ORDER BY c.sort_order ASC, c.name ASC, c.id ASC";
        let mut stmt = conn.prepare(sql)?;
        let categories = stmt
            .query_map(params![filter.active_only, search], |row| {
                Ok(CategorySummary {
                    category: category_from_row(row)?,
                    media_items_count: row.get(9)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(categories)
    }

    fn insert_category(&self, category: &NewCategory) -> Result<Category> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            "INSERT INTO categories (name, name_key, slug, description, color, is_active, sort_order) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                category.name,
                name_key(&category.name),
                category.slug,
                category.description,
                category.color,
                category.is_active,
                category.sort_order
            ],
        )
        .with_context(|| format!("Failed to insert category {}", category.name))?;
        let id = conn.last_insert_rowid();
        query_category(&conn, "c.id = ?1", &id)?
            .with_context(|| format!("Category {} vanished after insert", id))
    }

    fn create_category_if_absent(&self, name: &str, base_slug: &str) -> Result<CategoryLookup> {
        let mut conn = lock_conn(&self.conn)?;
        // write lock held across lookup and insert
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(existing) = query_category_by_name(&tx, name)? {
            tx.commit()?;
            return Ok(CategoryLookup::Existing(existing));
        }

        let slug = first_free_slug(&tx, base_slug)?;
        tx.execute(
            "INSERT INTO categories (name, name_key, slug) VALUES (?1, ?2, ?3)",
            params![name, name_key(name), slug],
        )
        .with_context(|| format!("Failed to create category {}", name))?;
        let id = tx.last_insert_rowid();
        let created = query_category(&tx, "c.id = ?1", &id)?
            .with_context(|| format!("Category {} vanished after insert", id))?;
        tx.commit()?;

        debug!("Created category {} ({}) with slug {}", created.name, id, created.slug);
        Ok(CategoryLookup::Created(created))
    }

    fn update_category(&self, id: i64, category: &NewCategory) -> Result<Option<Category>> {
        let conn = lock_conn(&self.conn)?;
        let changed = conn
            .execute(
                &format!(
                    "UPDATE categories SET name = ?1, name_key = ?2, slug = ?3, description = ?4, \
                     color = ?5, is_active = ?6, sort_order = ?7, updated_at = {} WHERE id = ?8",
                    NOW
                ),
                params![
                    category.name,
                    name_key(&category.name),
                    category.slug,
                    category.description,
                    category.color,
                    category.is_active,
                    category.sort_order,
                    id
                ],
            )
            .with_context(|| format!("Failed to update category {}", id))?;
        if changed == 0 {
            return Ok(None);
        }
        query_category(&conn, "c.id = ?1", &id)
    }

    fn delete_category(&self, id: i64) -> Result<bool> {
        let conn = lock_conn(&self.conn)?;
        let deleted = conn.execute("DELETE FROM categories WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn count_media_items_in_category(&self, id: i64) -> Result<usize> {
        let conn = lock_conn(&self.conn)?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM media_items WHERE category_id = ?1",
            params![id],
            |row| row.get(0),
        )?)
    }

    fn find_duplicate_category_groups(&self) -> Result<Vec<DuplicateGroup>> {
        let conn = lock_conn(&self.conn)?;
        let mut names_stmt = conn.prepare(
            "SELECT name FROM categories GROUP BY name HAVING COUNT(*) > 1 ORDER BY name",
        )?;
        let names = names_stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut ids_stmt = conn.prepare("SELECT id FROM categories WHERE name = ?1 ORDER BY id ASC")?;
        let mut groups = Vec::with_capacity(names.len());
        for name in names {
            let ids = ids_stmt
                .query_map(params![name], |row| row.get::<_, i64>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            groups.push(DuplicateGroup { name, ids });
        }
        Ok(groups)
    }

    fn merge_category_into(
        &self,
        name: &str,
        duplicate_id: i64,
        survivor_id: i64,
    ) -> Result<Option<usize>> {
        if duplicate_id == survivor_id {
            bail!("Cannot merge category {} into itself", duplicate_id);
        }
        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // the scan ran under an earlier lock, either row may have been
        // renamed or deleted since
        let still_named: usize = tx.query_row(
            "SELECT COUNT(*) FROM categories WHERE id IN (?1, ?2) AND name = ?3",
            params![duplicate_id, survivor_id, name],
            |row| row.get(0),
        )?;
        if still_named != 2 {
            return Ok(None);
        }

        let moved = tx
            .execute(
                "UPDATE media_items SET category_id = ?1 WHERE category_id = ?2",
                params![survivor_id, duplicate_id],
            )
            .with_context(|| {
                format!(
                    "Failed to move media items from category {} to {}",
                    duplicate_id, survivor_id
                )
            })?;
        tx.execute("DELETE FROM categories WHERE id = ?1", params![duplicate_id])
            .with_context(|| format!("Failed to delete category {}", duplicate_id))?;
        tx.commit()?;
        Ok(Some(moved))
    }

    fn count_categories(&self) -> Result<usize> {
        let conn = lock_conn(&self.conn)?;
        Ok(conn.query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))?)
    }

    fn get_category_statistics(&self, top: usize) -> Result<CategoryStatistics> {
        let conn = lock_conn(&self.conn)?;
        let (total, active): (usize, usize) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(is_active), 0) FROM categories",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let with_media: usize = conn.query_row(
            "SELECT COUNT(DISTINCT category_id) FROM media_items WHERE category_id IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT c.id, c.name, COUNT(m.id) AS items FROM categories c \
             JOIN media_items m ON m.category_id = c.id \
             GROUP BY c.id ORDER BY items DESC, c.name ASC LIMIT ?1",
        )?;
        let top_categories = stmt
            .query_map(params![top], |row| {
                Ok(CategoryUsage {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    media_items_count: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(CategoryStatistics {
            total_categories: total,
            active_categories: active,
            categories_with_media: with_media,
            empty_categories: total.saturating_sub(with_media),
            top_categories,
        })
    }
}

impl MediaItemStore for SqliteLibraryStore {
    fn get_media_item(&self, user_id: usize, id: i64) -> Result<Option<MediaItem>> {
        let conn = lock_conn(&self.conn)?;
        Ok(conn
            .query_row(
                &format!("{} WHERE m.id = ?1 AND m.user_id = ?2", MEDIA_ITEM_SELECT),
                params![id, user_id],
                media_item_from_row,
            )
            .optional()?)
    }

    fn list_media_items(&self, user_id: usize, query: &MediaQuery) -> Result<Vec<MediaItem>> {
        let mut clauses: Vec<String> = vec!["m.user_id = ?1".to_string()];
        let mut values: Vec<Value> = vec![Value::Integer(user_id as i64)];
        let mut bind = |clause: &str, value: Value, clauses: &mut Vec<String>| {
            values.push(value);
            clauses.push(clause.replace("?#", &format!("?{}", values.len())));
        };

        if let Some(category) = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            bind(
                "(lower(trim(m.category)) = ?# OR m.category_id IN \
                 (SELECT id FROM categories WHERE name_key = ?#))",
                Value::Text(name_key(category)),
                &mut clauses,
            );
        }
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            bind(
                "instr(lower(m.title), ?#) > 0",
                Value::Text(search.to_lowercase()),
                &mut clauses,
            );
        }
        if let Some(min) = query.rating_min {
            bind("m.rating >= ?#", Value::Integer(min), &mut clauses);
        }
        if let Some(max) = query.rating_max {
            bind("m.rating <= ?#", Value::Integer(max), &mut clauses);
        }
        if let Some(min) = query.playtime_min {
            bind("m.playtime_minutes >= ?#", Value::Integer(min), &mut clauses);
        }
        if let Some(max) = query.playtime_max {
            bind("m.playtime_minutes <= ?#", Value::Integer(max), &mut clauses);
        }
        if let Some(is_airing) = query.is_airing {
            bind("m.is_airing = ?#", Value::Integer(is_airing as i64), &mut clauses);
        }
        if let Some(since) = query.since {
            bind("m.updated_at > ?#", Value::Integer(since), &mut clauses);
        }

        let order_by = match query.sort {
            Some(sort) => {
                let direction = match query.order.unwrap_or_default() {
                    SortOrder::Asc => "ASC",
                    SortOrder::Desc => "DESC",
                };
                format!("m.{} {}, m.id ASC", sort.column(), direction)
            }
            None => "m.updated_at DESC, m.id DESC".to_string(),
        };

        let sql = format!(
            "{} WHERE {} ORDER BY {}",
            MEDIA_ITEM_SELECT,
            clauses.join(" AND "),
            order_by
        );
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(values.iter()), media_item_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn insert_media_item(&self, user_id: usize, record: &MediaItemRecord) -> Result<MediaItem> {
        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO media_items (user_id, title, category, category_id, release, rating, \
             count, platforms, genre, link, image_path, discovered, playtime_minutes, is_airing, \
             next_season, next_season_release, external_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                user_id,
                record.title,
                record.category,
                record.category_id,
                record.release,
                record.rating,
                record.count,
                record.platforms,
                record.genre,
                record.link,
                record.image_path,
                record.discovered,
                record.playtime_minutes,
                record.is_airing,
                record.next_season,
                record.next_season_release,
                record.external_id
            ],
        )
        .with_context(|| format!("Failed to insert media item {}", record.title))?;
        let id = tx.last_insert_rowid();
        let item = tx
            .query_row(
                &format!("{} WHERE m.id = ?1", MEDIA_ITEM_SELECT),
                params![id],
                media_item_from_row,
            )
            .with_context(|| format!("Media item {} vanished after insert", id))?;
        tx.commit()?;
        Ok(item)
    }

    fn update_media_item(
        &self,
        user_id: usize,
        id: i64,
        record: &MediaItemRecord,
    ) -> Result<Option<MediaItem>> {
        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        let changed = tx
            .execute(
                &format!(
                    "UPDATE media_items SET title = ?1, category = ?2, category_id = ?3, \
                     release = ?4, rating = ?5, count = ?6, platforms = ?7, genre = ?8, \
                     link = ?9, image_path = ?10, discovered = ?11, playtime_minutes = ?12, \
                     is_airing = ?13, next_season = ?14, next_season_release = ?15, \
                     external_id = ?16, updated_at = {} WHERE id = ?17 AND user_id = ?18",
                    NOW
                ),
                params![
                    record.title,
                    record.category,
                    record.category_id,
                    record.release,
                    record.rating,
                    record.count,
                    record.platforms,
                    record.genre,
                    record.link,
                    record.image_path,
                    record.discovered,
                    record.playtime_minutes,
                    record.is_airing,
                    record.next_season,
                    record.next_season_release,
                    record.external_id,
                    id,
                    user_id
                ],
            )
            .with_context(|| format!("Failed to update media item {}", id))?;
        if changed == 0 {
            return Ok(None);
        }
        let item = tx.query_row(
            &format!("{} WHERE m.id = ?1", MEDIA_ITEM_SELECT),
            params![id],
            media_item_from_row,
        )?;
        tx.commit()?;
        Ok(Some(item))
    }

    fn delete_media_item(&self, user_id: usize, id: i64) -> Result<bool> {
        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        let deleted = tx.execute(
            "DELETE FROM media_items WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        if deleted == 0 {
            return Ok(false);
        }

        let collections = {
            let mut stmt = tx.prepare(&format!("{} WHERE user_id = ?1", COLLECTION_SELECT))?;
            let rows = stmt
                .query_map(params![user_id], collection_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        for collection in collections
            .into_iter()
            .filter(|c| c.media_item_ids.contains(&id))
        {
            let remaining: Vec<i64> = collection
                .media_item_ids
                .into_iter()
                .filter(|item_id| *item_id != id)
                .collect();
            write_collection_ids(&tx, collection.id, &remaining)?;
        }
        tx.commit()?;
        Ok(true)
    }

    fn delete_user_media_items(&self, user_id: usize) -> Result<usize> {
        let conn = lock_conn(&self.conn)?;
        Ok(conn.execute(
            "DELETE FROM media_items WHERE user_id = ?1",
            params![user_id],
        )?)
    }

    fn count_media_items(&self) -> Result<usize> {
        let conn = lock_conn(&self.conn)?;
        Ok(conn.query_row("SELECT COUNT(*) FROM media_items", [], |row| row.get(0))?)
    }

    fn get_distinct_legacy_categories(&self) -> Result<Vec<String>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT trim(category) FROM media_items \
             WHERE category IS NOT NULL AND trim(category) != '' ORDER BY 1",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    fn get_unlinked_media_items(&self) -> Result<Vec<(i64, String)>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT id, trim(category) FROM media_items \
             WHERE category_id IS NULL AND category IS NOT NULL AND trim(category) != '' \
             ORDER BY id",
        )?;
        let items = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn set_media_item_category_id(&self, id: i64, category_id: i64) -> Result<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            "UPDATE media_items SET category_id = ?1 WHERE id = ?2",
            params![category_id, id],
        )
        .with_context(|| format!("Failed to link media item {} to category {}", id, category_id))?;
        Ok(())
    }
}

impl CollectionStore for SqliteLibraryStore {
    fn list_collections(&self, user_id: usize) -> Result<Vec<Collection>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE user_id = ?1 ORDER BY id ASC",
            COLLECTION_SELECT
        ))?;
        let collections = stmt
            .query_map(params![user_id], collection_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(collections)
    }

    fn get_collection(&self, user_id: usize, id: i64) -> Result<Option<Collection>> {
        let conn = lock_conn(&self.conn)?;
        query_collection(&conn, user_id, id)
    }

    fn insert_collection(&self, user_id: usize, input: &CollectionInput) -> Result<Collection> {
        let conn = lock_conn(&self.conn)?;
        let id = insert_collection_row(&conn, user_id, input)?;
        query_collection(&conn, user_id, id)?
            .with_context(|| format!("Collection {} vanished after insert", id))
    }

    fn update_collection(
        &self,
        user_id: usize,
        id: i64,
        input: &CollectionInput,
    ) -> Result<Option<Collection>> {
        let conn = lock_conn(&self.conn)?;
        let changed = conn.execute(
            &format!(
                "UPDATE collections SET name = ?1, description = ?2, media_item_ids = ?3, \
                 updated_at = {} WHERE id = ?4 AND user_id = ?5",
                NOW
            ),
            params![
                input.name.trim(),
                input.description,
                serde_json::to_string(&dedup_ids(&input.media_item_ids))?,
                id,
                user_id
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        query_collection(&conn, user_id, id)
    }

    fn delete_collection(&self, user_id: usize, id: i64) -> Result<bool> {
        let conn = lock_conn(&self.conn)?;
        let deleted = conn.execute(
            "DELETE FROM collections WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(deleted > 0)
    }

    fn replace_collections(
        &self,
        user_id: usize,
        inputs: &[CollectionInput],
    ) -> Result<Vec<Collection>> {
        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM collections WHERE user_id = ?1", params![user_id])?;
        let mut collections = Vec::with_capacity(inputs.len());
        for input in inputs {
            let id = insert_collection_row(&tx, user_id, input)?;
            collections.push(
                query_collection(&tx, user_id, id)?
                    .with_context(|| format!("Collection {} vanished after insert", id))?,
            );
        }
        tx.commit()?;
        Ok(collections)
    }

    fn add_media_to_collection(
        &self,
        user_id: usize,
        id: i64,
        media_item_id: i64,
    ) -> Result<Option<Collection>> {
        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        let Some(mut collection) = query_collection(&tx, user_id, id)? else {
            return Ok(None);
        };
        if !collection.media_item_ids.contains(&media_item_id) {
            collection.media_item_ids.push(media_item_id);
            write_collection_ids(&tx, id, &collection.media_item_ids)?;
        }
        let updated = query_collection(&tx, user_id, id)?;
        tx.commit()?;
        Ok(updated)
    }

    fn remove_media_from_collection(
        &self,
        user_id: usize,
        id: i64,
        media_item_id: i64,
    ) -> Result<Option<Collection>> {
        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        let Some(mut collection) = query_collection(&tx, user_id, id)? else {
            return Ok(None);
        };
        let before = collection.media_item_ids.len();
        collection.media_item_ids.retain(|item_id| *item_id != media_item_id);
        if collection.media_item_ids.len() != before {
            write_collection_ids(&tx, id, &collection.media_item_ids)?;
        }
        let updated = query_collection(&tx, user_id, id)?;
        tx.commit()?;
        Ok(updated)
    }

    fn delete_user_collections(&self, user_id: usize) -> Result<usize> {
        let conn = lock_conn(&self.conn)?;
        Ok(conn.execute(
            "DELETE FROM collections WHERE user_id = ?1",
            params![user_id],
        )?)
    }

    fn count_collections(&self) -> Result<usize> {
        let conn = lock_conn(&self.conn)?;
        Ok(conn.query_row("SELECT COUNT(*) FROM collections", [], |row| row.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (SqliteLibraryStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteLibraryStore::new(temp_dir.path().join("library.db")).unwrap();
        (store, temp_dir)
    }

    fn record(title: &str, category: Option<&str>, category_id: Option<i64>) -> MediaItemRecord {
        MediaItemRecord {
            title: title.to_string(),
            category: category.map(str::to_string),
            category_id,
            ..Default::default()
        }
    }

    #[test]
    fn reopens_existing_database() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("library.db");
        {
            let store = SqliteLibraryStore::new(&path).unwrap();
            store.insert_category(&NewCategory::named("Games", "games")).unwrap();
        }
        let store = SqliteLibraryStore::new(&path).unwrap();
        assert_eq!(store.count_categories().unwrap(), 1);
    }

    #[test]
    fn lookups_prefer_exact_then_case_insensitive() {
        let (store, _dir) = test_store();
        let lower = store.insert_category(&NewCategory::named("games", "games")).unwrap();
        let upper = store.insert_category(&NewCategory::named("Games", "games-2")).unwrap();

        assert_eq!(
            store.find_category_by_exact_name("Games").unwrap().unwrap().id,
            upper.id
        );
        assert_eq!(
            store.find_category_by_name_ignore_case("GAMES").unwrap().unwrap().id,
            lower.id
        );
        assert!(store.find_category_by_exact_name("GAMES").unwrap().is_none());
        assert_eq!(
            store.find_category_by_slug("games-2").unwrap().unwrap().id,
            upper.id
        );
    }

    #[test]
    fn duplicate_slug_is_rejected() {
        let (store, _dir) = test_store();
        store.insert_category(&NewCategory::named("Games", "games")).unwrap();
        assert!(store.insert_category(&NewCategory::named("Other", "games")).is_err());
    }

    #[test]
    fn create_if_absent_picks_free_slug() {
        let (store, _dir) = test_store();
        store.insert_category(&NewCategory::named("Games", "games")).unwrap();

        let lookup = store.create_category_if_absent("games", "games").unwrap();
        assert!(matches!(lookup, CategoryLookup::Existing(ref c) if c.name == "Games"));

        let lookup = store.create_category_if_absent("Games!", "games").unwrap();
        match lookup {
            CategoryLookup::Created(c) => {
                assert_eq!(c.name, "Games!");
                assert_eq!(c.slug, "games-2");
                assert!(c.is_active);
                assert_eq!(c.sort_order, 0);
            }
            other => panic!("Expected a new category, got {:?}", other),
        }
    }

    #[test]
    fn list_categories_orders_and_filters() {
        let (store, _dir) = test_store();
        let mut books = NewCategory::named("Books", "books");
        books.sort_order = 2;
        let mut games = NewCategory::named("Games", "games");
        games.sort_order = 1;
        let mut archived = NewCategory::named("Archived", "archived");
        archived.sort_order = 1;
        archived.is_active = false;
        archived.description = Some("Old games".to_string());
        store.insert_category(&books).unwrap();
        let games = store.insert_category(&games).unwrap();
        store.insert_category(&archived).unwrap();
        store
            .insert_media_item(1, &record("Celeste", Some("Games"), Some(games.id)))
            .unwrap();

        let all = store.list_categories(&CategoryFilter::default()).unwrap();
        let names: Vec<&str> = all.iter().map(|c| c.category.name.as_str()).collect();
        assert_eq!(names, vec!["Archived", "Games", "Books"]);
        assert_eq!(all[1].media_items_count, 1);

        let active = store
            .list_categories(&CategoryFilter {
                active_only: true,
                search: None,
            })
            .unwrap();
        assert_eq!(active.len(), 2);

        let searched = store
            .list_categories(&CategoryFilter {
                active_only: false,
                search: Some("GAME".to_string()),
            })
            .unwrap();
        let names: Vec<&str> = searched.iter().map(|c| c.category.name.as_str()).collect();
        assert_eq!(names, vec!["Archived", "Games"]);
    }

    #[test]
    fn merge_moves_items_and_deletes_duplicate() {
        let (store, _dir) = test_store();
        let first = store.insert_category(&NewCategory::named("Games", "games")).unwrap();
        let second = store.insert_category(&NewCategory::named("Games", "games-2")).unwrap();
        let item = store
            .insert_media_item(1, &record("Hades", Some("Games"), Some(second.id)))
            .unwrap();

        let groups = store.find_duplicate_category_groups().unwrap();
        assert_eq!(
            groups,
            vec![DuplicateGroup {
                name: "Games".to_string(),
                ids: vec![first.id, second.id],
            }]
        );

        assert_eq!(
            store.merge_category_into("Games", second.id, first.id).unwrap(),
            Some(1)
        );
        assert!(store.get_category(second.id).unwrap().is_none());
        let item = store.get_media_item(1, item.id).unwrap().unwrap();
        assert_eq!(item.category_id, Some(first.id));
        assert_eq!(item.category.as_deref(), Some("Games"));
    }

    #[test]
    fn merge_into_missing_survivor_is_skipped() {
        let (store, _dir) = test_store();
        let dup = store.insert_category(&NewCategory::named("Games", "games")).unwrap();
        let item = store
            .insert_media_item(1, &record("Hades", None, Some(dup.id)))
            .unwrap();

        assert_eq!(
            store.merge_category_into("Games", dup.id, dup.id + 100).unwrap(),
            None
        );
        assert!(store.get_category(dup.id).unwrap().is_some());
        assert_eq!(
            store.get_media_item(1, item.id).unwrap().unwrap().category_id,
            Some(dup.id)
        );
        assert!(store.merge_category_into("Games", dup.id, dup.id).is_err());
    }

    #[test]
    fn merge_skips_renamed_duplicate() {
        let (store, _dir) = test_store();
        let first = store.insert_category(&NewCategory::named("Games", "games")).unwrap();
        let second = store.insert_category(&NewCategory::named("Games", "games-2")).unwrap();
        let item = store
            .insert_media_item(1, &record("Doom", None, Some(second.id)))
            .unwrap();
        store
            .update_category(second.id, &NewCategory::named("Retro Games", "retro-games"))
            .unwrap();

        assert_eq!(
            store.merge_category_into("Games", second.id, first.id).unwrap(),
            None
        );
        assert_eq!(store.get_category(second.id).unwrap().unwrap().name, "Retro Games");
        assert_eq!(
            store.get_media_item(1, item.id).unwrap().unwrap().category_id,
            Some(second.id)
        );
    }

    #[test]
    fn deleting_category_nulls_item_reference() {
        let (store, _dir) = test_store();
        let games = store.insert_category(&NewCategory::named("Games", "games")).unwrap();
        let item = store
            .insert_media_item(1, &record("Hades", Some("Games"), Some(games.id)))
            .unwrap();
        assert!(store.delete_category(games.id).unwrap());
        assert!(!store.delete_category(games.id).unwrap());
        let item = store.get_media_item(1, item.id).unwrap().unwrap();
        assert_eq!(item.category_id, None);
        assert_eq!(item.category.as_deref(), Some("Games"));
    }

    #[test]
    fn media_items_are_user_scoped() {
        let (store, _dir) = test_store();
        let item = store.insert_media_item(1, &record("Hades", None, None)).unwrap();
        assert!(store.get_media_item(2, item.id).unwrap().is_none());
        assert!(store
            .update_media_item(2, item.id, &record("Stolen", None, None))
            .unwrap()
            .is_none());
        assert!(!store.delete_media_item(2, item.id).unwrap());
        assert!(store.get_media_item(1, item.id).unwrap().is_some());
    }

    #[test]
    fn list_media_items_applies_filters() {
        let (store, _dir) = test_store();
        let games = store.insert_category(&NewCategory::named("Games", "games")).unwrap();
        let mut hades = record("Hades", None, Some(games.id));
        hades.rating = Some(9);
        hades.playtime_minutes = Some(3000);
        let mut celeste = record("Celeste", Some("games"), None);
        celeste.rating = Some(7);
        let mut severance = record("Severance", Some("Series"), None);
        severance.is_airing = true;
        severance.rating = Some(10);
        store.insert_media_item(1, &hades).unwrap();
        store.insert_media_item(1, &celeste).unwrap();
        store.insert_media_item(1, &severance).unwrap();
        store.insert_media_item(2, &record("Other user", Some("Games"), None)).unwrap();

        let titles = |query: MediaQuery| -> Vec<String> {
            store
                .list_media_items(1, &query)
                .unwrap()
                .into_iter()
                .map(|i| i.title)
                .collect()
        };

        assert_eq!(
            titles(MediaQuery {
                category: Some("GAMES".to_string()),
                sort: Some(MediaSort::Title),
                ..Default::default()
            }),
            vec!["Celeste", "Hades"]
        );
        assert_eq!(
            titles(MediaQuery {
                rating_min: Some(8),
                sort: Some(MediaSort::Rating),
                order: Some(SortOrder::Desc),
                ..Default::default()
            }),
            vec!["Severance", "Hades"]
        );
        assert_eq!(
            titles(MediaQuery {
                search: Some("LES".to_string()),
                ..Default::default()
            }),
            vec!["Celeste"]
        );
        assert_eq!(
            titles(MediaQuery {
                is_airing: Some(true),
                ..Default::default()
            }),
            vec!["Severance"]
        );
        assert_eq!(
            titles(MediaQuery {
                playtime_min: Some(100),
                ..Default::default()
            }),
            vec!["Hades"]
        );
    }

    #[test]
    fn legacy_category_helpers() {
        let (store, _dir) = test_store();
        let games = store.insert_category(&NewCategory::named("Games", "games")).unwrap();
        store.insert_media_item(1, &record("A", Some(" Movies "), None)).unwrap();
        store.insert_media_item(1, &record("B", Some("Movies"), None)).unwrap();
        store.insert_media_item(1, &record("C", Some("Games"), Some(games.id))).unwrap();
        store.insert_media_item(1, &record("D", Some("  "), None)).unwrap();

        assert_eq!(
            store.get_distinct_legacy_categories().unwrap(),
            vec!["Games".to_string(), "Movies".to_string()]
        );
        let unlinked = store.get_unlinked_media_items().unwrap();
        assert_eq!(unlinked.len(), 2);
        assert!(unlinked.iter().all(|(_, text)| text == "Movies"));
    }

    #[test]
    fn collections_never_hold_duplicate_ids() {
        let (store, _dir) = test_store();
        let collection = store
            .insert_collection(
                1,
                &CollectionInput {
                    name: "Favourites".to_string(),
                    description: None,
                    media_item_ids: vec![3, 3, 5],
                },
            )
            .unwrap();
        assert_eq!(collection.media_item_ids, vec![3, 5]);

        let collection = store.add_media_to_collection(1, collection.id, 5).unwrap().unwrap();
        assert_eq!(collection.media_item_ids, vec![3, 5]);
        let collection = store.add_media_to_collection(1, collection.id, 7).unwrap().unwrap();
        assert_eq!(collection.media_item_ids, vec![3, 5, 7]);
        let collection = store
            .remove_media_from_collection(1, collection.id, 3)
            .unwrap()
            .unwrap();
        assert_eq!(collection.media_item_ids, vec![5, 7]);

        assert!(store.add_media_to_collection(2, collection.id, 9).unwrap().is_none());
    }

    #[test]
    fn deleting_item_removes_it_from_collections() {
        let (store, _dir) = test_store();
        let item = store.insert_media_item(1, &record("Hades", None, None)).unwrap();
        let collection = store
            .insert_collection(
                1,
                &CollectionInput {
                    name: "Roguelikes".to_string(),
                    description: None,
                    media_item_ids: vec![item.id],
                },
            )
            .unwrap();
        assert!(store.delete_media_item(1, item.id).unwrap());
        let collection = store.get_collection(1, collection.id).unwrap().unwrap();
        assert!(collection.media_item_ids.is_empty());
    }

    #[test]
    fn replace_collections_drops_previous_ones() {
        let (store, _dir) = test_store();
        store
            .insert_collection(1, &CollectionInput { name: "Old".to_string(), ..Default::default() })
            .unwrap();
        store
            .insert_collection(2, &CollectionInput { name: "Theirs".to_string(), ..Default::default() })
            .unwrap();

        let replaced = store
            .replace_collections(
                1,
                &[
                    CollectionInput { name: "New A".to_string(), ..Default::default() },
                    CollectionInput { name: "New B".to_string(), ..Default::default() },
                ],
            )
            .unwrap();
        assert_eq!(replaced.len(), 2);
        let names: Vec<String> = store
            .list_collections(1)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["New A", "New B"]);
        assert_eq!(store.list_collections(2).unwrap().len(), 1);
    }

    #[test]
    fn category_statistics_counts_usage() {
        let (store, _dir) = test_store();
        let games = store.insert_category(&NewCategory::named("Games", "games")).unwrap();
        let books = store.insert_category(&NewCategory::named("Books", "books")).unwrap();
        let mut idle = NewCategory::named("Idle", "idle");
        idle.is_active = false;
        store.insert_category(&idle).unwrap();
        store.insert_media_item(1, &record("A", None, Some(games.id))).unwrap();
        store.insert_media_item(1, &record("B", None, Some(games.id))).unwrap();
        store.insert_media_item(1, &record("C", None, Some(books.id))).unwrap();

        let stats = store.get_category_statistics(10).unwrap();
        assert_eq!(stats.total_categories, 3);
        assert_eq!(stats.active_categories, 2);
        assert_eq!(stats.categories_with_media, 2);
        assert_eq!(stats.empty_categories, 1);
        assert_eq!(stats.top_categories[0].name, "Games");
        assert_eq!(stats.top_categories[0].media_items_count, 2);
        assert_eq!(stats.top_categories.len(), 2);
    }
}
