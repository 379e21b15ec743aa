use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use hs_streamer::StreamError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("CAR error: {0}")]
    Car(String),

    #[error("sdk error: {0}")]
    Sdk(#[from] hs_sdk::SdkError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Errors a request handler answers with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid CID: {0}")]
    InvalidCid(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported response format: {0}")]
    NotAcceptable(String),

    /// Indexed content whose blocks are missing or do not verify.
    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCid(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            Self::Integrity(_) => StatusCode::BAD_GATEWAY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StreamError> for ApiError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::NotFound(cid) => Self::NotFound(cid.to_string()),
            StreamError::Integrity { .. } => Self::Integrity(err.to_string()),
            StreamError::Unavailable(reason) => Self::Unavailable(reason),
        }
    }
}

impl From<hs_sdk::SdkError> for ApiError {
    fn from(err: hs_sdk::SdkError) -> Self {
        match err {
            hs_sdk::SdkError::Stream(err) => err.into(),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
