//! Mapping of service errors to HTTP responses.

use crate::core::error::{FetchError, QuotaError};
use crate::service::ServiceError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

#[derive(Debug)]
pub enum AppError {
    /// Bad request parameters.
    Validation(String),
    Service(ServiceError),
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        AppError::Service(e)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Service(ServiceError::Quota(e)) => match e {
                QuotaError::ProviderNotFound(_) => StatusCode::BAD_REQUEST,
                QuotaError::QuotaExceeded { .. } => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Service(ServiceError::Fetch(e)) => match e {
                FetchError::QuotaRejected(_) | FetchError::MissingCredential(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                _ => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Service(e) => e.to_string(),
        };

        if status.is_server_error() {
            error!(%status, error = %message, "Request failed");
        } else {
            warn!(%status, error = %message, "Rejected request");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
