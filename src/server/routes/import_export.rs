use super::{require_permission, ServerState};
use crate::library::archive::{decode_archive, encode_archive};
use crate::library::models::MediaItemInput;
use crate::library::ImportReport;
use crate::server::error::{ApiError, ApiResult};
use crate::server::session::Session;
use crate::server::state::GuardedLibraryManager;
use crate::user::Permission;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use futures::TryStreamExt;
use serde::Serialize;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};

const ARCHIVE_FIELD: &str = "file";
const MAX_IMPORT_SIZE: usize = 64 * 1024 * 1024;

#[derive(Serialize, Default)]
struct StreamImportResponse {
    imported: usize,
    failed: usize,
}

async fn export_library(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
) -> ApiResult<Response> {
    require_permission(&session, Permission::OwnLibrary)?;
    let export = manager.export_library(session.user_id)?;
    let archive = encode_archive(&export)?;
    let filename = format!("media-library-{}.zip", Utc::now().format("%Y%m%d-%H%M%S"));
    debug!(
        "Exported {} media items ({} bytes) for user {}",
        export.data.len(),
        archive.len(),
        session.user_id
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        archive,
    )
        .into_response())
}

/// Imports a zip archive uploaded as the `file` field of a multipart form.
async fn import_library(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
    mut multipart: Multipart,
) -> ApiResult<Json<ImportReport>> {
    require_permission(&session, Permission::OwnLibrary)?;

    let mut data: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed upload: {}", e)))?
    {
        if field.name() == Some(ARCHIVE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
            data = Some(bytes.to_vec());
        }
    }

    let data = match data {
        Some(d) if !d.is_empty() => d,
        _ => return Err(ApiError::BadRequest("No file data provided.".to_string())),
    };
    let export = decode_archive(&data).map_err(|e| ApiError::BadRequest(format!("{:#}", e)))?;
    let report = manager.import_library(session.user_id, &export)?;
    info!(
        "User {} imported {} items ({} failed, {} collections)",
        session.user_id, report.imported, report.failed, report.collections
    );
    Ok(Json(report))
}

/// Imports newline-delimited JSON media items as they arrive. Blank lines
/// are skipped, lines that fail to parse or validate are counted as failed.
async fn import_stream(
    session: Session,
    State(manager): State<GuardedLibraryManager>,
    body: Body,
) -> ApiResult<Json<StreamImportResponse>> {
    require_permission(&session, Permission::OwnLibrary)?;

    let stream = body.into_data_stream().map_err(std::io::Error::other);
    let mut lines = StreamReader::new(stream).lines();
    let mut response = StreamImportResponse::default();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read stream: {}", e)))?
    {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let item: MediaItemInput = match serde_json::from_str(line) {
            Ok(item) => item,
            Err(e) => {
                warn!("Skipping malformed import line: {}", e);
                response.failed += 1;
                continue;
            }
        };
        match manager.import_media_item(session.user_id, &item) {
            Ok(_) => response.imported += 1,
            Err(crate::library::LibraryError::Persistence(err)) => return Err(err.into()),
            Err(e) => {
                warn!("Skipping imported item \"{}\": {}", item.title, e);
                response.failed += 1;
            }
        }
    }

    info!(
        "User {} streamed {} items ({} failed)",
        session.user_id, response.imported, response.failed
    );
    Ok(Json(response))
}

pub(super) fn routes() -> Router<ServerState> {
    Router::new()
        .route("/v1/library/export", get(export_library))
        .route("/v1/library/import", post(import_library))
        .route("/v1/library/import/stream", post(import_stream))
        .layer(DefaultBodyLimit::max(MAX_IMPORT_SIZE))
}
