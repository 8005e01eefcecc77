//! SQLite schema definitions for the library database.
//!
//! Categories deliberately carry no unique constraint on `name`: duplicate
//! names can exist and are merged by the reconciler. `name_key` holds the
//! lower-cased name used for case-insensitive lookups.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

pub const CATEGORIES_TABLE_V_0: Table = Table {
    name: "categories",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("name_key", &SqlType::Text, non_null = true),
        sqlite_column!("slug", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text),
        sqlite_column!("color", &SqlType::Text),
        sqlite_column!(
            "is_active",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("1")
        ),
        sqlite_column!(
            "sort_order",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_categories_name", "name"),
        ("idx_categories_name_key", "name_key"),
        ("idx_categories_active_sort", "is_active, sort_order"),
    ],
    unique_constraints: &[&["slug"]],
};

pub const MEDIA_ITEMS_TABLE_V_0: Table = Table {
    name: "media_items",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("user_id", &SqlType::Integer, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("category", &SqlType::Text), // legacy free text
        sqlite_column!(
            "category_id",
            &SqlType::Integer,
            foreign_key = Some(&ForeignKey {
                foreign_table: "categories",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::SetNull,
            })
        ),
        sqlite_column!("release", &SqlType::Text),
        sqlite_column!("rating", &SqlType::Integer),
        sqlite_column!(
            "count",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("platforms", &SqlType::Text),
        sqlite_column!("genre", &SqlType::Text),
        sqlite_column!("link", &SqlType::Text),
        sqlite_column!("image_path", &SqlType::Text),
        sqlite_column!("discovered", &SqlType::Text),
        sqlite_column!("playtime_minutes", &SqlType::Integer),
        sqlite_column!(
            "is_airing",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("next_season", &SqlType::Integer),
        sqlite_column!("next_season_release", &SqlType::Text),
        sqlite_column!("external_id", &SqlType::Text),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_media_items_user_id", "user_id"),
        ("idx_media_items_category_id", "category_id"),
    ],
    unique_constraints: &[],
};

pub const COLLECTIONS_TABLE_V_0: Table = Table {
    name: "collections",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("user_id", &SqlType::Integer, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text),
        sqlite_column!(
            "media_item_ids",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'[]'")
        ), // JSON array of media item ids
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_collections_user_id", "user_id")],
    unique_constraints: &[],
};

pub const LIBRARY_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        CATEGORIES_TABLE_V_0,
        MEDIA_ITEMS_TABLE_V_0,
        COLLECTIONS_TABLE_V_0,
    ],
    migration: None,
}];
