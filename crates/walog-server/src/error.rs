use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use walog_shared::ValidationError;
use walog_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Upload too large (max {max} bytes)")]
    TooLarge { max: usize },

    #[error("Unsupported media: {0}")]
    Unsupported(String),

    #[error("Remote storage error: {0}")]
    Upstream(String),

    #[error("Media storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::BadRequest(_) | ServerError::Validation(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ServerError::TooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            ServerError::Unsupported(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, self.to_string())
            }
            ServerError::Upstream(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            ServerError::Store(StoreError::Duplicate(_)) => (StatusCode::CONFLICT, self.to_string()),
            ServerError::Storage(_) | ServerError::Store(_) | ServerError::Internal(_) => {
                tracing::error!(error = %self, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
