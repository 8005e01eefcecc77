use super::ServerState;
use crate::server::error::ApiResult;
use crate::server::metrics;
use crate::server::session::{Session, COOKIE_SESSION_TOKEN_KEY};
use crate::server::state::GuardedUserManager;
use crate::user::{AuthToken, AuthTokenValue, Registration, UserError, UserProfile};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Deserialize)]
struct LoginBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
struct SessionResponse {
    user: UserProfile,
    token: String,
}

fn session_cookie(token: &str) -> Cookie<'static> {
    Cookie::build((COOKIE_SESSION_TOKEN_KEY, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build((COOKIE_SESSION_TOKEN_KEY, ""))
        .path("/")
        .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1))
        .same_site(SameSite::Lax)
        .build()
}

fn session_created(user: UserProfile, token: AuthToken) -> Response {
    let cookie = session_cookie(&token.value.0);
    (
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie.to_string())],
        Json(SessionResponse {
            user,
            token: token.value.0,
        }),
    )
        .into_response()
}

async fn register(
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<Registration>,
) -> ApiResult<Response> {
    let (user, token) = user_manager.register(&body)?;
    info!("Registered user {}", user.user.id);
    Ok(session_created(user, token))
}

async fn login(
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<LoginBody>,
) -> ApiResult<Response> {
    let start = Instant::now();
    match user_manager.login(&body.email, &body.password) {
        Ok((user, token)) => {
            metrics::record_login_attempt("success", start.elapsed());
            debug!("User {} logged in", user.user.id);
            Ok(session_created(user, token))
        }
        Err(err) => {
            let status = match &err {
                UserError::InvalidCredentials => "failure",
                _ => "error",
            };
            metrics::record_login_attempt(status, start.elapsed());
            Err(err.into())
        }
    }
}

async fn logout(
    State(user_manager): State<GuardedUserManager>,
    session: Session,
) -> ApiResult<Response> {
    user_manager.delete_auth_token(session.user_id, &AuthTokenValue(session.token))?;
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, expired_session_cookie().to_string())],
        Json(json!({ "message": "Logged out." })),
    )
        .into_response())
}

async fn me(
    State(user_manager): State<GuardedUserManager>,
    session: Session,
) -> ApiResult<Json<UserProfile>> {
    Ok(Json(user_manager.get_user(session.user_id)?))
}

pub(super) fn routes() -> Router<ServerState> {
    Router::new()
        .route("/v1/auth/register", post(register))
        .route("/v1/auth/login", post(login))
        .route("/v1/auth/logout", post(logout))
        .route("/v1/auth/me", get(me))
}
