use axum::{
    extract::{Path, rejection::PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;
use thiserror::Error;
use tracing::error;

use warbler_db::DbError;

use crate::views;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,
    #[error("database: {0}")]
    Db(#[from] DbError),
    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Numeric id from the URL. Anything that doesn't parse gets the 404 page.
pub type IdPath = WithRejection<Path<i64>, AppError>;

impl From<PathRejection> for AppError {
    fn from(_: PathRejection) -> Self {
        AppError::NotFound
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, views::not_found()).into_response(),
            AppError::Db(DbError::Conflict(field)) => (
                StatusCode::CONFLICT,
                views::error_page("Conflict", &format!("That {field} is already taken.")),
            )
                .into_response(),
            other => {
                error!("request failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, views::server_error()).into_response()
            }
        }
    }
}
