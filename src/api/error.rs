use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use super::models::ErrorResponse;
use crate::http::FetchError;
use crate::marks::MarkError;
use crate::plugins::{PluginError, RegistryError};
use crate::scheduler::SchedulerError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("payload invalid: {0}")]
    InvalidPayload(String),
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream query failed: {0}")]
    Upstream(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Upstream(_) => "QUERY_FAILED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::InvalidPayload(value.to_string())
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            FetchError::InvalidConfig(_) => ApiError::Internal(err.to_string()),
            _ => ApiError::Upstream(err.to_string()),
        }
    }
}

impl From<PluginError> for ApiError {
    fn from(err: PluginError) -> Self {
        match err {
            PluginError::Fetch(inner) => inner.into(),
            PluginError::UnsupportedUrl(_) => ApiError::InvalidPayload(err.to_string()),
            PluginError::NotFound(_) => ApiError::NotFound(err.to_string()),
            PluginError::Payload(_) => ApiError::Upstream(err.to_string()),
            PluginError::Config(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        ApiError::NotFound(err.to_string())
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::UnknownPlugin(_) | SchedulerError::NotFound(_) => ApiError::NotFound(err.to_string()),
            SchedulerError::InvalidInput(_) => ApiError::InvalidPayload(err.to_string()),
            SchedulerError::IdExhausted { .. } | SchedulerError::PoolClosed => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<MarkError> for ApiError {
    fn from(err: MarkError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::JobId;

    #[test]
    fn test_taxonomy_status_codes() {
        let not_found: ApiError = SchedulerError::NotFound(JobId::from("x")).into();
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let remote_404: ApiError = PluginError::Fetch(FetchError::NotFound { url: "u".into() }).into();
        assert_eq!(remote_404.status_code(), StatusCode::NOT_FOUND);

        let failed: ApiError = FetchError::QueryFailed {
            url: "u".into(),
            status: 500,
            reason: "Internal Server Error".into(),
        }
        .into();
        assert_eq!(failed.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(failed.code(), "QUERY_FAILED");

        let bad_url: ApiError = PluginError::UnsupportedUrl("u".into()).into();
        assert_eq!(bad_url.status_code(), StatusCode::BAD_REQUEST);
    }
}
