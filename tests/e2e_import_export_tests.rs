//! End-to-end tests for library export and import

mod common;

use common::{TestClient, TestServer};
use media_library_server::library::archive::{decode_archive, encode_archive};
use media_library_server::library::models::MediaItemInput;
use media_library_server::library::{ExportedMediaItem, LibraryExport};
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_export_returns_zip_with_display_categories() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let item: Value = client
        .create_media(json!({ "title": "Frieren", "category": "Anime" }))
        .await
        .json()
        .await
        .unwrap();
    client
        .create_collection(json!({ "name": "Fav", "media_item_ids": [item["id"]] }))
        .await;

    let response = client.export_library().await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/zip"
    );
    assert!(response
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("attachment"));

    let bytes = response.bytes().await.unwrap();
    let export = decode_archive(&bytes).unwrap();
    assert_eq!(export.data.len(), 1);
    assert_eq!(export.data[0].item.title, "Frieren");
    assert_eq!(export.data[0].item.category.as_deref(), Some("Anime"));
    assert!(export.data[0].item.category_id.is_none());
    assert_eq!(export.collections.len(), 1);
}

#[tokio::test]
async fn test_export_then_import_into_another_account() {
    let server = TestServer::spawn().await;
    let user = TestClient::authenticated(server.base_url.clone()).await;
    let admin = TestClient::authenticated_admin(server.base_url.clone()).await;

    let item: Value = user
        .create_media(json!({ "title": "Hades", "category": "Games", "rating": 9 }))
        .await
        .json()
        .await
        .unwrap();
    user.create_collection(json!({ "name": "Played", "media_item_ids": [item["id"]] }))
        .await;
    let archive = user.export_library().await.bytes().await.unwrap().to_vec();

    let response = admin.import_library(archive).await;
    assert_eq!(response.status(), StatusCode::OK);
    let report: Value = response.json().await.unwrap();
    assert_eq!(report["imported"], 1);
    assert_eq!(report["failed"], 0);
    assert_eq!(report["collections"], 1);

    let items: Vec<Value> = admin.list_media().await.json().await.unwrap();
    assert_eq!(items.len(), 1);
    // resolves to the existing category rather than creating a second one
    assert_eq!(items[0]["category_id"], item["category_id"]);

    let collections: Vec<Value> = admin.list_collections().await.json().await.unwrap();
    assert_eq!(collections[0]["media_item_ids"], json!([items[0]["id"]]));
}

#[tokio::test]
async fn test_import_skips_invalid_items_and_ignores_category_ids() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let export = LibraryExport {
        data: vec![
            ExportedMediaItem {
                id: Some(10),
                item: MediaItemInput {
                    title: "Valid".to_string(),
                    category: Some("Books".to_string()),
                    category_id: Some(4242),
                    ..Default::default()
                },
            },
            ExportedMediaItem {
                id: Some(11),
                item: MediaItemInput {
                    title: "Bad rating".to_string(),
                    rating: Some(99),
                    ..Default::default()
                },
            },
        ],
        collections: vec![],
    };

    let response = client
        .import_library(encode_archive(&export).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let report: Value = response.json().await.unwrap();
    assert_eq!(report["imported"], 1);
    assert_eq!(report["failed"], 1);

    let items: Vec<Value> = client.list_media().await.json().await.unwrap();
    assert_eq!(items[0]["display_category"], "Books");
    assert_ne!(items[0]["category_id"], 4242);
}

#[tokio::test]
async fn test_import_rejects_non_archive() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client.import_library(b"not a zip".to_vec()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stream_import_counts_lines() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let body = [
        r#"{"title": "One", "category": "Anime"}"#,
        "",
        r#"{"title": "Two", "category": "anime"}"#,
        "not json",
        r#"{"title": ""}"#,
    ]
    .join("\n");

    let response = client.import_stream(body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["imported"], 2);
    assert_eq!(result["failed"], 2);

    let categories: Vec<Value> = client.list_categories().await.json().await.unwrap();
    assert_eq!(categories.len(), 1);
}
