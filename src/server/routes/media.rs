use super::{require_permission, ServerState};
use crate::library::models::{MediaItem, MediaItemInput, MediaQuery, SyncMediaItem, SyncStats};
use crate::library::LibraryManager;
use crate::server::error::{ApiError, ApiResult};
use crate::server::session::Session;
use crate::server::state::GuardedLibraryManager;
use crate::user::Permission;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

#[derive(Serialize)]
pub(super) struct MediaItemResponse {
    #[serde(flatten)]
    item: MediaItem,
    /// Legacy text when set, otherwise the linked category's name.
    display_category: Option<String>,
}

impl MediaItemResponse {
    fn build(manager: &LibraryManager, item: MediaItem) -> ApiResult<Self> {
        let display_category = manager.display_category(&item)?;
        Ok(MediaItemResponse {
            item,
            display_category,
        })
    }
}

async fn list_media(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
    Query(query): Query<MediaQuery>,
) -> ApiResult<Json<Vec<MediaItemResponse>>> {
    require_permission(&session, Permission::OwnLibrary)?;
    let items = manager.list_media_items(session.user_id, &query)?;
    let response = items
        .into_iter()
        .map(|item| MediaItemResponse::build(&manager, item))
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(response))
}

async fn create_media(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
    Json(body): Json<MediaItemInput>,
) -> ApiResult<(StatusCode, Json<MediaItemResponse>)> {
    require_permission(&session, Permission::OwnLibrary)?;
    let item = manager
        .save_media_item(session.user_id, None, &body)
        .map_err(ApiError::from_media_error)?;
    Ok((
        StatusCode::CREATED,
        Json(MediaItemResponse::build(&manager, item)?),
    ))
}

async fn get_media(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MediaItemResponse>> {
    require_permission(&session, Permission::OwnLibrary)?;
    let item = manager.get_media_item(session.user_id, id)?;
    Ok(Json(MediaItemResponse::build(&manager, item)?))
}

async fn update_media(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
    Path(id): Path<i64>,
    Json(body): Json<MediaItemInput>,
) -> ApiResult<Json<MediaItemResponse>> {
    require_permission(&session, Permission::OwnLibrary)?;
    let item = manager
        .save_media_item(session.user_id, Some(id), &body)
        .map_err(ApiError::from_media_error)?;
    Ok(Json(MediaItemResponse::build(&manager, item)?))
}

async fn delete_media(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    require_permission(&session, Permission::OwnLibrary)?;
    manager.delete_media_item(session.user_id, id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn sync_media(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
    Json(body): Json<Vec<SyncMediaItem>>,
) -> ApiResult<Json<SyncStats>> {
    require_permission(&session, Permission::OwnLibrary)?;
    let stats = manager
        .sync_media_items(session.user_id, &body)
        .map_err(ApiError::from_media_error)?;
    Ok(Json(stats))
}

pub(super) fn routes() -> Router<ServerState> {
    Router::new()
        .route("/v1/media", get(list_media).post(create_media))
        .route("/v1/media/sync", post(sync_media))
        .route(
            "/v1/media/{id}",
            get(get_media).put(update_media).delete(delete_media),
        )
}
