use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

/// Error taxonomy for the pipeline (§7). Each variant maps to exactly one
/// recovery policy; callers match on the variant rather than the message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("token bucket exhausted after waiting {waited_ms}ms")]
    TokensExhausted { waited_ms: u64 },

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("upstream throttled (429)")]
    UpstreamThrottled,

    #[error("deal endpoint access denied for this process")]
    DealAccessDenied,

    #[error("upstream response shape mismatch: {0}")]
    InvalidResponse(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("event log unavailable: {0}")]
    EventLogUnavailable(String),

    #[error("search index unavailable: {0}")]
    SearchIndexUnavailable(String),

    #[error("dispatch channel failed: {0}")]
    DispatchChannelFailed(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("bootstrap error: {0}")]
    Bootstrap(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::TokensExhausted { .. } | AppError::UpstreamThrottled => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppError::DealAccessDenied => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
