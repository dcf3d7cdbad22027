//! HTTP mapping of [`ServiceError`].

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use inkplane_core::ServiceError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Error body returned by every route.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// A [`ServiceError`] on its way out as an HTTP response.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub ServiceError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ServiceError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ServiceError::MissingProfile | ServiceError::Unauthorized => StatusCode::FORBIDDEN,
            ServiceError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::BatchTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::NotFound => StatusCode::NOT_FOUND,
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ServiceError::Storage(detail) = &self.0 {
            error!("Storage failure: {}", detail);
        }
        let mut response = (status, Json(ErrorBody { error: self.0.to_string() })).into_response();
        if let ServiceError::RateLimited { retry_after_secs, .. } = &self.0 {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
        }
        response
    }
}
