//! End-to-end tests for category management

mod common;

use common::{TestClient, TestServer};
use media_library_server::library::models::{MediaItemRecord, NewCategory};
use media_library_server::library::{CategoryStore, MediaItemStore};
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_create_category_derives_unique_slug() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client
        .create_category(json!({ "name": "Sci-Fi Movies", "color": "#112233" }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let category: Value = response.json().await.unwrap();
    assert_eq!(category["slug"], "sci-fi-movies");
    assert_eq!(category["is_active"], true);
}

#[tokio::test]
async fn test_create_category_validates_payload() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    client.create_category(json!({ "name": "Anime" })).await;

    let response = client
        .create_category(json!({ "name": "anime", "color": "red" }))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert!(body["errors"]["name"].is_array());
    assert!(body["errors"]["color"].is_array());

    let response = client.create_category(json!({ "name": "  " })).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_find_or_create_is_idempotent_and_case_insensitive() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let first: Value = client
        .find_or_create_category(" Documentaries ")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(first["name"], "Documentaries");

    let second: Value = client
        .find_or_create_category("DOCUMENTARIES")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(first["id"], second["id"]);

    let response = client.find_or_create_category("   ").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_update_and_delete_category() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let category: Value = client
        .create_category(json!({ "name": "Books" }))
        .await
        .json()
        .await
        .unwrap();
    let id = category["id"].as_i64().unwrap();

    let updated: Value = client
        .update_category(id, json!({ "name": "Novels", "is_active": false }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(updated["slug"], "novels");
    assert_eq!(updated["is_active"], false);

    assert_eq!(
        client.delete_category(id).await.status(),
        StatusCode::NO_CONTENT
    );
    assert_eq!(client.get_category(id).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_category_in_use_cannot_be_deleted() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let item: Value = client
        .create_media(json!({ "title": "Frieren", "category": "Anime" }))
        .await
        .json()
        .await
        .unwrap();
    let category_id = item["category_id"].as_i64().unwrap();

    let response = client.delete_category(category_id).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_statistics_count_usage() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    client
        .create_media(json!({ "title": "A", "category": "Anime" }))
        .await;
    client
        .create_media(json!({ "title": "B", "category": "Anime" }))
        .await;
    client.create_category(json!({ "name": "Empty" })).await;

    let stats: Value = client.category_statistics().await.json().await.unwrap();
    assert_eq!(stats["total_categories"], 2);
    assert_eq!(stats["categories_with_media"], 1);
    assert_eq!(stats["empty_categories"], 1);
    assert_eq!(stats["top_categories"][0]["name"], "Anime");
    assert_eq!(stats["top_categories"][0]["media_items_count"], 2);
}

#[tokio::test]
async fn test_cleanup_duplicates_requires_admin() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client.cleanup_duplicate_categories().await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = client.migrate_categories_from_media().await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cleanup_duplicates_merges_into_lowest_id() {
    let server = TestServer::spawn().await;
    let admin = TestClient::authenticated_admin(server.base_url.clone()).await;

    let store = &server.library_store;
    let survivor = store
        .insert_category(&NewCategory::named("Anime", "anime"))
        .unwrap();
    let duplicate = store
        .insert_category(&NewCategory::named("Anime", "anime-2"))
        .unwrap();
    store
        .insert_category(&NewCategory::named("Games", "games"))
        .unwrap();
    let item = store
        .insert_media_item(
            1,
            &MediaItemRecord {
                title: "Frieren".to_string(),
                category: Some("Anime".to_string()),
                category_id: Some(duplicate.id),
                ..Default::default()
            },
        )
        .unwrap();

    let response = admin.cleanup_duplicate_categories().await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["removed_duplicates"], 1);
    assert_eq!(body["remaining_categories"], 2);

    let relinked = store.get_media_item(1, item.id).unwrap().unwrap();
    assert_eq!(relinked.category_id, Some(survivor.id));
    assert!(store.get_category(duplicate.id).unwrap().is_none());

    // a second pass finds nothing to do
    let body: Value = admin
        .cleanup_duplicate_categories()
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["removed_duplicates"], 0);
}

#[tokio::test]
async fn test_migrate_from_media_links_legacy_items() {
    let server = TestServer::spawn().await;
    let admin = TestClient::authenticated_admin(server.base_url.clone()).await;

    let store = &server.library_store;
    for (title, text) in [("A", "Anime"), ("B", "anime"), ("C", "Series")] {
        store
            .insert_media_item(
                1,
                &MediaItemRecord {
                    title: title.to_string(),
                    category: Some(text.to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
    }

    let response = admin.migrate_categories_from_media().await;
    assert_eq!(response.status(), StatusCode::OK);
    let report: Value = response.json().await.unwrap();
    assert_eq!(report["created_categories"], 2);
    assert_eq!(report["linked_items"], 3);

    let categories: Vec<Value> = admin.list_categories().await.json().await.unwrap();
    assert_eq!(categories.len(), 2);
}
