use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use permreg_registry::RegistryError;
use serde::{Deserialize, Serialize};
use tracing::error;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Wire error payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Registry(e) => match e {
                RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
                RegistryError::Conflict(_) => StatusCode::CONFLICT,
                RegistryError::BadRequest(_) => StatusCode::BAD_REQUEST,
                RegistryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::ValidationError(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Registry(e) => e.code(),
            ApiError::ValidationError(_) | ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors.to_string())
    }
}

impl ApiError {
    /// Extractor rejections are client errors unless axum reports a server fault
    fn from_rejection(status: StatusCode, detail: String) -> Self {
        if status.is_server_error() {
            ApiError::Registry(RegistryError::internal(detail))
        } else {
            ApiError::BadRequest(detail)
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Registry(RegistryError::Internal(detail)) => {
                error!(error = %detail, "internal error");
                "internal server error".to_string()
            }
            ApiError::Registry(RegistryError::NotFound(msg))
            | ApiError::Registry(RegistryError::Conflict(msg))
            | ApiError::Registry(RegistryError::BadRequest(msg))
            | ApiError::ValidationError(msg)
            | ApiError::NotFound(msg)
            | ApiError::BadRequest(msg) => msg.clone(),
        };

        let body = Json(ErrorResponse {
            code: self.code().to_string(),
            message,
        });

        (status, body).into_response()
    }
}
