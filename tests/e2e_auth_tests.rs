//! End-to-end tests for registration, login and sessions

mod common;

use common::{TestClient, TestServer, ADMIN_USER, TEST_PASS, TEST_USER};
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn test_login_sets_session_cookie_and_returns_profile() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.login(TEST_USER, TEST_PASS).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(response.headers().get("set-cookie").is_some());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["email"], TEST_USER);
    assert_eq!(body["user"]["is_admin"], false);
    assert!(!body["token"].as_str().unwrap().is_empty());

    let response = client.me().await;
    assert_eq!(response.status(), StatusCode::OK);
    let me: Value = response.json().await.unwrap();
    assert_eq!(me["email"], TEST_USER);
}

#[tokio::test]
async fn test_login_with_wrong_password_is_unauthorized() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.login(TEST_USER, "wrong-password").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client.login("nobody@example.com", TEST_PASS).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_email_is_case_insensitive() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.login(&TEST_USER.to_uppercase(), TEST_PASS).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_register_creates_regular_user_with_session() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .register("New Person", "new@example.com", "longenough1")
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["roles"][0], "Regular");

    // registration logs the user in
    let response = client.list_media().await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_rejects_taken_email_and_short_password() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.register("Someone", ADMIN_USER, "longenough1").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert!(body["errors"]["email"].is_array());

    let response = client.register("Someone", "other@example.com", "short").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert!(body["errors"]["password"].is_array());
}

#[tokio::test]
async fn test_logout_invalidates_session() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client.logout().await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client.me().await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_bearer_token_authenticates() {
    let server = TestServer::spawn().await;
    let login_client = TestClient::new(server.base_url.clone());
    let body: Value = login_client
        .login(TEST_USER, TEST_PASS)
        .await
        .json()
        .await
        .unwrap();
    let token = body["token"].as_str().unwrap().to_string();

    let bare = reqwest::Client::new();
    let response = bare
        .get(format!("{}/v1/auth/me", server.base_url))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = bare
        .get(format!("{}/v1/auth/me", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
