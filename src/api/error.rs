use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::DomainError;

/// HTTP face of a [`DomainError`].
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            DomainError::Load(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DomainError::Validation(_) => StatusCode::BAD_REQUEST,
            DomainError::Auth(_) => StatusCode::UNAUTHORIZED,
            DomainError::Provider(_) => StatusCode::BAD_GATEWAY,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Conflict(_) => StatusCode::CONFLICT,
            DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, "request rejected");
        }

        let body = Json(json!({ "error": self.0.user_message() }));
        (status, body).into_response()
    }
}
