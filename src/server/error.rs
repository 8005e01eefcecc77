use crate::background_jobs::JobError;
use crate::library::{LibraryError, ValidationErrors};
use crate::server::metrics;
use crate::user::UserError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Errors returned by route handlers, rendered as
/// `{ "message": ..., "errors": { field: [messages] } }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    /// 422, or 400 when `bad_request` is set.
    #[error("{}", .errors.first_message().unwrap_or("The given data was invalid."))]
    Validation {
        errors: ValidationErrors,
        bad_request: bool,
    },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("This action is unauthorized.")]
    Forbidden,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),

    #[error("{0}")]
    Unavailable(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a ValidationErrors>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation { bad_request: true, .. } | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn validation(errors: ValidationErrors) -> Self {
        ApiError::Validation {
            errors,
            bad_request: false,
        }
    }

    /// Media payload errors: validation is reported as 400 and storage
    /// failures as "could not save item".
    pub fn from_media_error(err: LibraryError) -> Self {
        match err {
            LibraryError::Validation(errors) => ApiError::Validation {
                errors,
                bad_request: true,
            },
            LibraryError::Persistence(err) => {
                error!("Could not save media item: {:#}", err);
                ApiError::Internal("Could not save item.".to_string())
            }
            other => other.into(),
        }
    }
}

impl From<LibraryError> for ApiError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::NotFound(what) => ApiError::NotFound(format!("{} not found.", what)),
            LibraryError::Validation(errors) => ApiError::validation(errors),
            LibraryError::Conflict(message) => ApiError::Conflict(message),
            LibraryError::Persistence(err) => {
                error!("Library persistence error: {:#}", err);
                ApiError::Internal("Internal server error.".to_string())
            }
        }
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound => ApiError::NotFound("User not found.".to_string()),
            UserError::Validation(errors) => ApiError::validation(errors),
            UserError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid credentials.".to_string())
            }
            UserError::LastAdmin => ApiError::BadRequest(err.to_string()),
            UserError::Persistence(err) => {
                error!("User persistence error: {:#}", err);
                ApiError::Internal("Internal server error.".to_string())
            }
        }
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound => ApiError::NotFound("Job not found.".to_string()),
            JobError::AlreadyRunning => ApiError::Conflict(err.to_string()),
            JobError::ExecutionFailed(_) | JobError::Cancelled => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        error!("Unexpected error: {:#}", err);
        ApiError::Internal("Internal server error.".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            metrics::record_error("internal", "api");
        }
        let body = ErrorBody {
            message: self.to_string(),
            errors: match &self {
                ApiError::Validation { errors, .. } => Some(errors),
                _ => None,
            },
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
