//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per endpoint. When API routes or request
//! formats change, update only this file.

use super::constants::*;
use reqwest::{Method, Response};
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    pub base_url: String,
}

impl TestClient {
    /// Creates a new unauthenticated client.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// Creates a client logged in as the regular test user.
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated(base_url: String) -> Self {
        Self::logged_in(base_url, TEST_USER, TEST_PASS).await
    }

    /// Creates a client logged in as the admin user.
    pub async fn authenticated_admin(base_url: String) -> Self {
        Self::logged_in(base_url, ADMIN_USER, ADMIN_PASS).await
    }

    async fn logged_in(base_url: String, email: &str, password: &str) -> Self {
        let client = Self::new(base_url);
        let response = client.login(email, password).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Authentication of {} failed: {:?}",
            email,
            response.text().await
        );
        client
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Response {
        let mut request = self.client.request(method.clone(), self.url(path));
        if let Some(body) = body {
            request = request.json(&body);
        }
        request
            .send()
            .await
            .unwrap_or_else(|e| panic!("{} {} failed: {}", method, path, e))
    }

    pub async fn get(&self, path: &str) -> Response {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Response {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Response {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Response {
        self.send(Method::DELETE, path, None).await
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// POST /v1/auth/login
    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.post(
            "/v1/auth/login",
            json!({ "email": email, "password": password }),
        )
        .await
    }

    /// POST /v1/auth/register
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Response {
        self.post(
            "/v1/auth/register",
            json!({
                "name": name,
                "email": email,
                "password": password,
                "password_confirmation": password,
            }),
        )
        .await
    }

    /// POST /v1/auth/logout
    pub async fn logout(&self) -> Response {
        self.post("/v1/auth/logout", json!({})).await
    }

    /// GET /v1/auth/me
    pub async fn me(&self) -> Response {
        self.get("/v1/auth/me").await
    }

    // ========================================================================
    // Media items
    // ========================================================================

    /// GET /v1/media with an optional query string (without the `?`)
    pub async fn list_media_with(&self, query: &str) -> Response {
        if query.is_empty() {
            self.get("/v1/media").await
        } else {
            self.get(&format!("/v1/media?{}", query)).await
        }
    }

    pub async fn list_media(&self) -> Response {
        self.list_media_with("").await
    }

    /// POST /v1/media
    pub async fn create_media(&self, body: Value) -> Response {
        self.post("/v1/media", body).await
    }

    pub async fn get_media(&self, id: i64) -> Response {
        self.get(&format!("/v1/media/{}", id)).await
    }

    pub async fn update_media(&self, id: i64, body: Value) -> Response {
        self.put(&format!("/v1/media/{}", id), body).await
    }

    pub async fn delete_media(&self, id: i64) -> Response {
        self.delete(&format!("/v1/media/{}", id)).await
    }

    /// POST /v1/media/sync
    pub async fn sync_media(&self, items: Value) -> Response {
        self.post("/v1/media/sync", items).await
    }

    // ========================================================================
    // Categories
    // ========================================================================

    pub async fn list_categories(&self) -> Response {
        self.get("/v1/categories").await
    }

    pub async fn create_category(&self, body: Value) -> Response {
        self.post("/v1/categories", body).await
    }

    pub async fn get_category(&self, id: i64) -> Response {
        self.get(&format!("/v1/categories/{}", id)).await
    }

    pub async fn update_category(&self, id: i64, body: Value) -> Response {
        self.put(&format!("/v1/categories/{}", id), body).await
    }

    pub async fn delete_category(&self, id: i64) -> Response {
        self.delete(&format!("/v1/categories/{}", id)).await
    }

    /// POST /v1/categories/find-or-create
    pub async fn find_or_create_category(&self, name: &str) -> Response {
        self.post("/v1/categories/find-or-create", json!({ "name": name }))
            .await
    }

    pub async fn category_statistics(&self) -> Response {
        self.get("/v1/categories/statistics").await
    }

    /// POST /v1/categories/cleanup-duplicates
    pub async fn cleanup_duplicate_categories(&self) -> Response {
        self.post("/v1/categories/cleanup-duplicates", json!({}))
            .await
    }

    /// POST /v1/categories/migrate-from-media
    pub async fn migrate_categories_from_media(&self) -> Response {
        self.post("/v1/categories/migrate-from-media", json!({}))
            .await
    }

    // ========================================================================
    // Collections
    // ========================================================================

    pub async fn list_collections(&self) -> Response {
        self.get("/v1/collections").await
    }

    pub async fn create_collection(&self, body: Value) -> Response {
        self.post("/v1/collections", body).await
    }

    /// PUT /v1/collections, replacing every collection of the user
    pub async fn replace_collections(&self, body: Value) -> Response {
        self.put("/v1/collections", body).await
    }

    pub async fn get_collection(&self, id: i64) -> Response {
        self.get(&format!("/v1/collections/{}", id)).await
    }

    pub async fn update_collection(&self, id: i64, body: Value) -> Response {
        self.put(&format!("/v1/collections/{}", id), body).await
    }

    pub async fn delete_collection(&self, id: i64) -> Response {
        self.delete(&format!("/v1/collections/{}", id)).await
    }

    pub async fn add_media_to_collection(&self, id: i64, media_item_id: i64) -> Response {
        self.post(
            &format!("/v1/collections/{}/add-media", id),
            json!({ "media_item_id": media_item_id }),
        )
        .await
    }

    pub async fn remove_media_from_collection(&self, id: i64, media_item_id: i64) -> Response {
        self.post(
            &format!("/v1/collections/{}/remove-media", id),
            json!({ "media_item_id": media_item_id }),
        )
        .await
    }

    // ========================================================================
    // Import / export
    // ========================================================================

    /// GET /v1/library/export
    pub async fn export_library(&self) -> Response {
        self.get("/v1/library/export").await
    }

    /// POST /v1/library/import with the archive as the `file` field
    pub async fn import_library(&self, archive: Vec<u8>) -> Response {
        let part = reqwest::multipart::Part::bytes(archive)
            .file_name("library.zip")
            .mime_str("application/zip")
            .expect("Invalid mime type");
        let form = reqwest::multipart::Form::new().part("file", part);
        self.client
            .post(self.url("/v1/library/import"))
            .multipart(form)
            .send()
            .await
            .expect("Import request failed")
    }

    /// POST /v1/library/import/stream with a newline-delimited JSON body
    pub async fn import_stream(&self, ndjson: String) -> Response {
        self.client
            .post(self.url("/v1/library/import/stream"))
            .header("content-type", "application/x-ndjson")
            .body(ndjson)
            .send()
            .await
            .expect("Stream import request failed")
    }

    // ========================================================================
    // Admin
    // ========================================================================

    pub async fn admin_list_users(&self) -> Response {
        self.get("/v1/admin/users").await
    }

    pub async fn admin_get_user(&self, id: usize) -> Response {
        self.get(&format!("/v1/admin/users/{}", id)).await
    }

    pub async fn admin_update_user(&self, id: usize, body: Value) -> Response {
        self.put(&format!("/v1/admin/users/{}", id), body).await
    }

    pub async fn admin_delete_user(&self, id: usize) -> Response {
        self.delete(&format!("/v1/admin/users/{}", id)).await
    }

    pub async fn admin_statistics(&self) -> Response {
        self.get("/v1/admin/statistics").await
    }

    pub async fn admin_list_jobs(&self) -> Response {
        self.get("/v1/admin/jobs").await
    }

    pub async fn admin_get_job(&self, id: &str) -> Response {
        self.get(&format!("/v1/admin/jobs/{}", id)).await
    }

    pub async fn admin_trigger_job(&self, id: &str) -> Response {
        self.post(&format!("/v1/admin/jobs/{}/trigger", id), json!({}))
            .await
    }
}
