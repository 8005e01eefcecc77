use super::{require_permission, ServerState};
use crate::background_jobs::{JobInfo, JobRunInfo, SchedulerHandle};
use crate::library::models::LibraryCounts;
use crate::server::error::{ApiError, ApiResult};
use crate::server::session::Session;
use crate::server::state::{GuardedLibraryManager, GuardedUserManager, OptionalSchedulerHandle};
use crate::user::{Permission, UserCounts, UserProfile, UserUpdate};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 100;

#[derive(Serialize)]
struct AdminStatistics {
    users: UserCounts,
    library: LibraryCounts,
}

#[derive(Serialize)]
struct JobDetails {
    #[serde(flatten)]
    job: JobInfo,
    history: Vec<JobRunInfo>,
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct TriggerResponse {
    job_id: String,
    triggered: bool,
}

fn scheduler(handle: &OptionalSchedulerHandle) -> ApiResult<&SchedulerHandle> {
    handle
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Job scheduler not available.".to_string()))
}

async fn list_users(
    session: Session,
    State(users): State<GuardedUserManager>,
) -> ApiResult<Json<Vec<UserProfile>>> {
    require_permission(&session, Permission::ManageUsers)?;
    Ok(Json(users.list_users()?))
}

async fn get_user(
    session: Session,
    State(users): State<GuardedUserManager>,
    Path(id): Path<usize>,
) -> ApiResult<Json<UserProfile>> {
    require_permission(&session, Permission::ManageUsers)?;
    Ok(Json(users.get_user(id)?))
}

async fn update_user(
    session: Session,
    State(users): State<GuardedUserManager>,
    Path(id): Path<usize>,
    Json(body): Json<UserUpdate>,
) -> ApiResult<Json<UserProfile>> {
    require_permission(&session, Permission::ManageUsers)?;
    let profile = users.update_user(id, &body)?;
    info!("User {} updated user {}", session.user_id, id);
    Ok(Json(profile))
}

async fn delete_user(
    session: Session,
    State(users): State<GuardedUserManager>,
    State(library): State<GuardedLibraryManager>,
    Path(id): Path<usize>,
) -> ApiResult<StatusCode> {
    require_permission(&session, Permission::ManageUsers)?;
    if id == session.user_id {
        return Err(ApiError::BadRequest(
            "You cannot delete your own account.".to_string(),
        ));
    }
    users.delete_user(id)?;
    let (items, collections) = library.delete_user_library(id)?;
    info!(
        "User {} deleted user {} with {} media items and {} collections",
        session.user_id, id, items, collections
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn statistics(
    session: Session,
    State(users): State<GuardedUserManager>,
    State(library): State<GuardedLibraryManager>,
) -> ApiResult<Json<AdminStatistics>> {
    require_permission(&session, Permission::ManageUsers)?;
    Ok(Json(AdminStatistics {
        users: users.counts()?,
        library: library.counts()?,
    }))
}

async fn list_jobs(
    session: Session,
    State(handle): State<OptionalSchedulerHandle>,
) -> ApiResult<Json<Vec<JobInfo>>> {
    require_permission(&session, Permission::ServerAdmin)?;
    Ok(Json(scheduler(&handle)?.list_jobs().await?))
}

async fn get_job(
    session: Session,
    State(handle): State<OptionalSchedulerHandle>,
    Path(job_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<JobDetails>> {
    require_permission(&session, Permission::ServerAdmin)?;
    let scheduler = scheduler(&handle)?;
    let job = scheduler
        .get_job(&job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Job not found.".to_string()))?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    let history = scheduler.run_history(&job_id, limit)?;
    Ok(Json(JobDetails { job, history }))
}

async fn trigger_job(
    session: Session,
    State(handle): State<OptionalSchedulerHandle>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<TriggerResponse>> {
    require_permission(&session, Permission::ServerAdmin)?;
    scheduler(&handle)?.trigger_job(&job_id).await?;
    info!("User {} triggered job {}", session.user_id, job_id);
    Ok(Json(TriggerResponse {
        job_id,
        triggered: true,
    }))
}

pub(super) fn routes() -> Router<ServerState> {
    Router::new()
        .route("/v1/admin/users", get(list_users))
        .route(
            "/v1/admin/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/v1/admin/statistics", get(statistics))
        .route("/v1/admin/jobs", get(list_jobs))
        .route("/v1/admin/jobs/{id}", get(get_job))
        .route("/v1/admin/jobs/{id}/trigger", post(trigger_job))
}
