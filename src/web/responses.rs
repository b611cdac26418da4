//! HTTP response types and utilities
//!
//! Standardized response envelope and error-to-status mapping for the web
//! layer, so every endpoint reports success and failure the same way.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{AdmissionError, AppError};

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Whether the operation was successful
    pub success: bool,
    /// Response data (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error message (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Request timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    /// Create a successful response
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Create an error response
    pub fn error(message: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Convert an AppResult into the standard envelope with the right status
pub fn handle_result<T>(result: Result<T, AppError>, success_status: StatusCode) -> Response
where
    T: Serialize,
{
    match result {
        Ok(data) => (success_status, Json(ApiResponse::success(data))).into_response(),
        Err(error) => handle_error(error),
    }
}

/// Map an AppError to its HTTP representation
///
/// Admission refusals are the interesting cases: denied access is 403,
/// saturation is 429, and a full queue is 429 with a Retry-After hint.
pub fn handle_error(error: AppError) -> Response {
    let (status, message, retry_after) = match &error {
        AppError::Admission(admission) => match admission {
            AdmissionError::AccessDenied { .. } => {
                (StatusCode::FORBIDDEN, admission.to_string(), None)
            }
            AdmissionError::ResourceSaturated { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, admission.to_string(), None)
            }
            AdmissionError::QueueFull {
                retry_after_secs, ..
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                admission.to_string(),
                Some(*retry_after_secs),
            ),
            AdmissionError::MonitorSaturated { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, admission.to_string(), None)
            }
            AdmissionError::DailyCapReached {
                retry_after_secs, ..
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                admission.to_string(),
                Some(*retry_after_secs),
            ),
        },
        AppError::Validation { message } => (StatusCode::BAD_REQUEST, message.clone(), None),
        AppError::NotFound { resource, id } => (
            StatusCode::NOT_FOUND,
            format!("{} with id '{}' not found", resource, id),
            None,
        ),
        AppError::Configuration { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Configuration error: {}", message),
            None,
        ),
        AppError::Database(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database operation failed".to_string(),
            None,
        ),
        AppError::Repository(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Data access failed".to_string(),
            None,
        ),
        AppError::Internal { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal error: {}", message),
            None,
        ),
    };

    let mut response =
        (status, Json(ApiResponse::<()>::error(message))).into_response();
    if let Some(secs) = retry_after
        && let Ok(value) = HeaderValue::from_str(&secs.to_string())
    {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_denied_maps_to_forbidden() {
        let response = handle_error(
            AdmissionError::AccessDenied {
                resource_id: "p1".to_string(),
            }
            .into(),
        );
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn queue_full_carries_retry_after() {
        let response = handle_error(
            AdmissionError::QueueFull {
                depth: 250,
                retry_after_secs: 60,
            }
            .into(),
        );
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            &HeaderValue::from_static("60")
        );
    }

    #[test]
    fn daily_cap_maps_to_too_many_requests_with_retry_after() {
        let response = handle_error(
            AdmissionError::DailyCapReached {
                config_id: "c1".to_string(),
                cap: 1,
                retry_after_secs: 3600,
            }
            .into(),
        );
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            &HeaderValue::from_static("3600")
        );
    }

    #[test]
    fn saturation_has_no_retry_after() {
        let response = handle_error(
            AdmissionError::ResourceSaturated {
                resource_id: "p1".to_string(),
                active: 5,
                limit: 5,
            }
            .into(),
        );
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }
}
