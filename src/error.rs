use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BannerError>;

#[derive(Debug, Error)]
pub enum BannerError {
    /// No qualifying commit in a repository, or across every tracked repository
    #[error("Commit not found: {0}")]
    CommitNotFound(String),

    #[error("Upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned {status}: {body}")]
    UpstreamStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Malformed upstream payload: {0}")]
    Malformed(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BannerError {
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            BannerError::Http(_) | BannerError::UpstreamStatus { .. } | BannerError::Malformed(_)
        )
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

impl IntoResponse for BannerError {
    fn into_response(self) -> Response {
        let (status, label) = match &self {
            BannerError::CommitNotFound(_) => (StatusCode::SERVICE_UNAVAILABLE, "No commit available"),
            e if e.is_upstream() => (StatusCode::BAD_GATEWAY, "Upstream failure"),
            BannerError::Render(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Render failure"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };

        tracing::error!(status = %status, error = %self, "Banner request failed");

        (status, Json(ErrorResponse::with_details(label, self.to_string()))).into_response()
    }
}
