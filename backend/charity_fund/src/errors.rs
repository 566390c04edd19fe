//! Application-wide error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("{0}")]
    Validation(String),

    #[error("A project with this name already exists")]
    DuplicateName,

    #[error("A closed project cannot be edited")]
    ProjectClosed,

    #[error("The new full amount cannot be less than the amount already invested")]
    AmountBelowInvested,

    #[error("The project has already received funds and cannot be deleted")]
    ProjectFunded,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Missing or invalid credentials")]
    Unauthorized,

    #[error("Superuser privileges required")]
    Forbidden,
}

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::DuplicateName
            | AppError::ProjectClosed
            | AppError::AmountBelowInvested
            | AppError::ProjectFunded => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Database(_)
            | AppError::Migrate(_)
            | AppError::Http(_)
            | AppError::Json(_)
            | AppError::Config(_)
            | AppError::Report(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {self}");
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
