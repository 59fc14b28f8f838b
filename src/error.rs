use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Universe fetch failed: {0}")]
    UniverseFetch(String),

    #[error("Unknown scan category: {0}")]
    UnknownCategory(String),

    #[error("Scan already running for category {0}")]
    ScanInProgress(String),

    #[error("No target expiry for category {0}")]
    MissingExpiry(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::UnknownCategory(_) => StatusCode::NOT_FOUND,
            AppError::ScanInProgress(_) => StatusCode::CONFLICT,
            AppError::MissingExpiry(_) => StatusCode::BAD_REQUEST,
            AppError::UniverseFetch(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
