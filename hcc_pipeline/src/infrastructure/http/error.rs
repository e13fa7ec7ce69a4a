//! Maps `HccError` onto HTTP status codes for the gateway (§7, §6.1).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use hcc_domain::HccError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: u16,
}

pub struct ApiError(pub HccError);

impl From<HccError> for ApiError {
    fn from(err: HccError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            HccError::NotFound(_) | HccError::ArtifactNotFound { .. } => StatusCode::NOT_FOUND,
            HccError::Conflict(_) => StatusCode::CONFLICT,
            HccError::InvalidMessage(_) | HccError::Configuration(_) | HccError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            HccError::MessageBus(_) => StatusCode::SERVICE_UNAVAILABLE,
            HccError::Registry(_) | HccError::ArtifactStore(_) | HccError::LlmFailure(_) | HccError::Io(_) | HccError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "gateway request failed");
        }
        let body = ErrorBody {
            error: self.0.to_string(),
            code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}
