use super::{require_permission, ServerState};
use crate::library::models::{Collection, CollectionInput};
use crate::server::error::ApiResult;
use crate::server::session::Session;
use crate::server::state::GuardedLibraryManager;
use crate::user::Permission;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

#[derive(Deserialize)]
struct MediaItemRef {
    media_item_id: i64,
}

async fn list_collections(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
) -> ApiResult<Json<Vec<Collection>>> {
    require_permission(&session, Permission::OwnLibrary)?;
    Ok(Json(manager.list_collections(session.user_id)?))
}

async fn create_collection(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
    Json(body): Json<CollectionInput>,
) -> ApiResult<(StatusCode, Json<Collection>)> {
    require_permission(&session, Permission::OwnLibrary)?;
    let collection = manager.create_collection(session.user_id, &body)?;
    Ok((StatusCode::CREATED, Json(collection)))
}

/// Replaces all of the caller's collections.
async fn replace_collections(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
    Json(body): Json<Vec<CollectionInput>>,
) -> ApiResult<Json<Vec<Collection>>> {
    require_permission(&session, Permission::OwnLibrary)?;
    Ok(Json(manager.replace_collections(session.user_id, &body)?))
}

async fn get_collection(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Collection>> {
    require_permission(&session, Permission::OwnLibrary)?;
    Ok(Json(manager.get_collection(session.user_id, id)?))
}

async fn update_collection(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
    Path(id): Path<i64>,
    Json(body): Json<CollectionInput>,
) -> ApiResult<Json<Collection>> {
    require_permission(&session, Permission::OwnLibrary)?;
    Ok(Json(manager.update_collection(session.user_id, id, &body)?))
}

async fn delete_collection(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    require_permission(&session, Permission::OwnLibrary)?;
    manager.delete_collection(session.user_id, id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_media(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
    Path(id): Path<i64>,
    Json(body): Json<MediaItemRef>,
) -> ApiResult<Json<Collection>> {
    require_permission(&session, Permission::OwnLibrary)?;
    Ok(Json(manager.add_media_to_collection(
        session.user_id,
        id,
        body.media_item_id,
    )?))
}

async fn remove_media(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
    Path(id): Path<i64>,
    Json(body): Json<MediaItemRef>,
) -> ApiResult<Json<Collection>> {
    require_permission(&session, Permission::OwnLibrary)?;
    Ok(Json(manager.remove_media_from_collection(
        session.user_id,
        id,
        body.media_item_id,
    )?))
}

pub(super) fn routes() -> Router<ServerState> {
    Router::new()
        .route(
            "/v1/collections",
            get(list_collections)
                .post(create_collection)
                .put(replace_collections),
        )
        .route(
            "/v1/collections/{id}",
            get(get_collection)
                .put(update_collection)
                .delete(delete_collection),
        )
        .route("/v1/collections/{id}/add-media", post(add_media))
        .route("/v1/collections/{id}/remove-media", post(remove_media))
}
