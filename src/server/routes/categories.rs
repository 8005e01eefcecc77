use super::{require_permission, ServerState};
use crate::library::models::{
    Category, CategoryFilter, CategoryInput, CategoryMigrationReport, CategoryStatistics,
    CategorySummary,
};
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
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Deserialize)]
struct FindOrCreateBody {
    #[serde(default)]
    name: String,
}

#[derive(Serialize)]
struct CleanupResponse {
    removed_duplicates: usize,
    remaining_categories: usize,
}

async fn list_categories(
    _session: Session,
    State(manager): State<GuardedLibraryManager>,
    Query(filter): Query<CategoryFilter>,
) -> ApiResult<Json<Vec<CategorySummary>>> {
    Ok(Json(manager.list_categories(&filter)?))
}

async fn create_category(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
    Json(body): Json<CategoryInput>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    require_permission(&session, Permission::EditCategories)?;
    Ok((StatusCode::CREATED, Json(manager.create_category(&body)?)))
}

async fn get_category(
    _session: Session,
    State(manager): State<GuardedLibraryManager>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Category>> {
    Ok(Json(manager.get_category(id)?))
}

async fn update_category(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
    Path(id): Path<i64>,
    Json(body): Json<CategoryInput>,
) -> ApiResult<Json<Category>> {
    require_permission(&session, Permission::EditCategories)?;
    Ok(Json(manager.update_category(id, &body)?))
}

async fn delete_category(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    require_permission(&session, Permission::EditCategories)?;
    manager.delete_category(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn find_or_create_category(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
    Json(body): Json<FindOrCreateBody>,
) -> ApiResult<Json<Category>> {
    require_permission(&session, Permission::EditCategories)?;
    Ok(Json(manager.find_or_create_category(&body.name)?))
}

async fn category_statistics(
    _session: Session,
    State(manager): State<GuardedLibraryManager>,
) -> ApiResult<Json<CategoryStatistics>> {
    Ok(Json(manager.category_statistics()?))
}

async fn cleanup_duplicates(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
) -> ApiResult<Json<CleanupResponse>> {
    require_permission(&session, Permission::ManageCategories)?;
    let (report, remaining_categories) = manager.cleanup_duplicate_categories()?;
    if report.failed_groups > 0 {
        return Err(ApiError::Internal(format!(
            "{} duplicate groups could not be merged.",
            report.failed_groups
        )));
    }
    info!(
        "User {} removed {} duplicate categories",
        session.user_id, report.removed_duplicates
    );
    Ok(Json(CleanupResponse {
        removed_duplicates: report.removed_duplicates,
        remaining_categories,
    }))
}

async fn migrate_from_media(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
) -> ApiResult<Json<CategoryMigrationReport>> {
    require_permission(&session, Permission::ManageCategories)?;
    Ok(Json(manager.migrate_categories_from_media(false)?))
}

pub(super) fn routes() -> Router<ServerState> {
    Router::new()
        .route("/v1/categories", get(list_categories).post(create_category))
        .route("/v1/categories/find-or-create", post(find_or_create_category))
        .route("/v1/categories/statistics", get(category_statistics))
        .route("/v1/categories/cleanup-duplicates", post(cleanup_duplicates))
        .route("/v1/categories/migrate-from-media", post(migrate_from_media))
        .route(
            "/v1/categories/{id}",
            get(get_category)
                .put(update_category)
                .delete(delete_category),
        )
}
