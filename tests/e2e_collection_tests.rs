//! End-to-end tests for collections

mod common;

use common::{TestClient, TestServer};
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn media_id(client: &TestClient, title: &str) -> i64 {
    let item: Value = client
        .create_media(json!({ "title": title }))
        .await
        .json()
        .await
        .unwrap();
    item["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_collection_crud() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;
    let first = media_id(&client, "First").await;
    let second = media_id(&client, "Second").await;

    let response = client
        .create_collection(json!({ "name": "Favourites", "media_item_ids": [first] }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let collection: Value = response.json().await.unwrap();
    let id = collection["id"].as_i64().unwrap();
    assert_eq!(collection["media_item_ids"], json!([first]));

    let updated: Value = client
        .update_collection(
            id,
            json!({ "name": "Top", "description": "Best of", "media_item_ids": [second, first] }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(updated["name"], "Top");
    assert_eq!(updated["media_item_ids"], json!([second, first]));

    let fetched: Value = client.get_collection(id).await.json().await.unwrap();
    assert_eq!(fetched, updated);

    assert_eq!(
        client.delete_collection(id).await.status(),
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        client.get_collection(id).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_collection_rejects_foreign_media() {
    let server = TestServer::spawn().await;
    let user = TestClient::authenticated(server.base_url.clone()).await;
    let admin = TestClient::authenticated_admin(server.base_url.clone()).await;
    let admin_item = media_id(&admin, "Admin's").await;

    let response = user
        .create_collection(json!({ "name": "Sneaky", "media_item_ids": [admin_item] }))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert!(body["errors"]["media_item_ids"].is_array());
}

#[tokio::test]
async fn test_add_and_remove_media() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;
    let item = media_id(&client, "Item").await;

    let collection: Value = client
        .create_collection(json!({ "name": "Queue" }))
        .await
        .json()
        .await
        .unwrap();
    let id = collection["id"].as_i64().unwrap();

    let added: Value = client
        .add_media_to_collection(id, item)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(added["media_item_ids"], json!([item]));

    // adding twice keeps a single entry
    let added: Value = client
        .add_media_to_collection(id, item)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(added["media_item_ids"], json!([item]));

    let removed: Value = client
        .remove_media_from_collection(id, item)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(removed["media_item_ids"], json!([]));
}

#[tokio::test]
async fn test_replace_collections() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;
    let item = media_id(&client, "Item").await;

    client
        .create_collection(json!({ "name": "Old" }))
        .await;

    let response = client
        .replace_collections(json!([
            { "name": "New A", "media_item_ids": [item] },
            { "name": "New B" },
        ]))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let collections: Vec<Value> = client.list_collections().await.json().await.unwrap();
    let mut names: Vec<&str> = collections
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["New A", "New B"]);
}

#[tokio::test]
async fn test_collections_are_private() {
    let server = TestServer::spawn().await;
    let user = TestClient::authenticated(server.base_url.clone()).await;
    let admin = TestClient::authenticated_admin(server.base_url.clone()).await;

    let collection: Value = user
        .create_collection(json!({ "name": "Mine" }))
        .await
        .json()
        .await
        .unwrap();
    let id = collection["id"].as_i64().unwrap();

    assert_eq!(admin.get_collection(id).await.status(), StatusCode::NOT_FOUND);
    let admin_collections: Vec<Value> = admin.list_collections().await.json().await.unwrap();
    assert!(admin_collections.is_empty());
}
