use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;

use crate::repository::RepositoryError;

pub const LOGIN_PATH: &str = "/login";

/// AppError
///
/// Every failure a request can hit. Nothing here is fatal to the process: each variant is
/// translated into a status code or a redirect for the single request that raised it.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Unknown email or wrong password. One signal for both.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// No valid session on a protected path. Answered with a redirect, not an error page.
    #[error("authentication required")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::Unauthenticated => "unauthenticated",
            AppError::Forbidden => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::Conflict(_) => "conflict",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidCredentials => {
                return Redirect::to(&format!("{LOGIN_PATH}?error")).into_response();
            }
            AppError::Unauthenticated => return Redirect::to(LOGIN_PATH).into_response(),
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(detail) => {
                // The detail stays in the logs; clients get a generic message.
                tracing::error!(error = %detail, "request failed");
                return json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    self.code(),
                    "internal server error",
                );
            }
        };
        json_error(status, self.code(), self.to_string())
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => AppError::NotFound(what),
            RepositoryError::DuplicateEmail(email) => {
                AppError::Conflict(format!("email {email} is already registered"))
            }
            RepositoryError::InvalidReference(what) => {
                AppError::BadRequest(format!("unknown {what}"))
            }
            RepositoryError::Database(e) => AppError::Internal(e.to_string()),
        }
    }
}
