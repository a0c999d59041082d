use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel export error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl Error {
    fn server_error(message: &str, detail: String) -> (StatusCode, serde_json::Value) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": message, "detail": detail }),
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            Error::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            Error::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            Error::Validation(err) => (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() })),
            Error::Json(err) => (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() })),
            Error::Multipart(err) => (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() })),
            Error::Csv(err) => (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() })),
            Error::Reqwest(err) => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": format!("External service error: {}", err) }),
            ),
            Error::Database(err) => Self::server_error("Database error", err.to_string()),
            Error::Internal(msg) => Self::server_error("Internal error", msg),
            Error::Io(err) => Self::server_error("IO error", err.to_string()),
            Error::Xlsx(err) => Self::server_error("Export error", err.to_string()),
            Error::PasswordHash(msg) => Self::server_error("Credential error", msg),
            Error::Token(err) => Self::server_error("Token error", err.to_string()),
            Error::Config(msg) => Self::server_error("Configuration error", msg),
        };

        if status.is_server_error() {
            tracing::error!(status = %status, body = %body, "request failed");
        }

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                let what = db.constraint().unwrap_or("unique constraint").to_string();
                Error::Conflict(format!("Duplicate value violates {}", what))
            }
            other => Error::Database(other),
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::BadRequest(rejection.body_text())
    }
}

impl From<argon2::password_hash::Error> for Error {
    fn from(err: argon2::password_hash::Error) -> Self {
        Error::PasswordHash(err.to_string())
    }
}
