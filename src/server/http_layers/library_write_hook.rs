//! Notifies the job scheduler after successful library writes.

use super::super::state::ServerState;
use crate::background_jobs::HookEvent;
use axum::extract::{MatchedPath, State};
use axum::{
    body::Body,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Routes whose 2xx responses schedule a category reconciliation pass.
const RECONCILING_ROUTES: &[(Method, &str)] = &[
    (Method::POST, "/v1/auth/login"),
    (Method::POST, "/v1/auth/register"),
    (Method::POST, "/v1/media"),
    (Method::PUT, "/v1/media/{id}"),
    (Method::POST, "/v1/media/sync"),
    (Method::POST, "/v1/collections"),
    (Method::PUT, "/v1/collections"),
    (Method::PUT, "/v1/collections/{id}"),
    (Method::POST, "/v1/library/import"),
    (Method::POST, "/v1/library/import/stream"),
];

/// `route` is the matched route template, not the concrete uri.
pub fn triggers_reconciliation(method: &Method, route: &str) -> bool {
    RECONCILING_ROUTES
        .iter()
        .any(|(m, r)| m == method && *r == route)
}

pub async fn emit_library_write_hook(
    State(state): State<ServerState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string());

    let response = next.run(request).await;

    let Some(route) = route else {
        return response;
    };
    if !response.status().is_success() || !triggers_reconciliation(&method, &route) {
        return response;
    }

    if let Some(sender) = &state.hook_sender {
        match sender.try_send(HookEvent::OnLibraryWrite) {
            Ok(()) => debug!("Emitted {} after {} {}", HookEvent::OnLibraryWrite, method, route),
            // a queued event already covers this write
            Err(TrySendError::Full(_)) => debug!("Hook channel full, dropping event"),
            Err(TrySendError::Closed(_)) => warn!("Job scheduler is gone, hook event dropped"),
        }
    }

    response
}
