//! HTTP route handlers, one module per resource.

mod admin;
mod auth;
mod categories;
mod collections;
mod import_export;
mod media;

use super::error::{ApiError, ApiResult};
use super::session::Session;
use super::state::ServerState;
use crate::user::Permission;
use axum::Router;

/// Every API route, paths spelled out in full.
pub fn api_routes() -> Router<ServerState> {
    Router::new()
        .merge(auth::routes())
        .merge(media::routes())
        .merge(categories::routes())
        .merge(collections::routes())
        .merge(import_export::routes())
        .merge(admin::routes())
}

fn require_permission(session: &Session, permission: Permission) -> ApiResult<()> {
    if session.has_permission(permission) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}
