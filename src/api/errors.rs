use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use validator::ValidationErrors;

use crate::services::service_error::ServiceError;
use crate::services::workflow_error::WorkflowError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remediation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    missing_question_indices: Option<Vec<usize>>,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    BadRequest(String),
    NotFound(String),
    /// A typed engine failure, rendered with its code and remediation.
    Workflow(WorkflowError),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Workflow(err) => ApiError::Workflow(err),
            ServiceError::NotFound { entity } => ApiError::NotFound(format!("{entity} not found")),
            ServiceError::Stale { .. } => {
                tracing::warn!(error = %err, "Write abandoned after repeated conflicts");
                ApiError::ServiceUnavailable("The record is busy; retry the request".to_string())
            }
            ServiceError::Store(err) => ApiError::internal(err, "Store operation failed"),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(err: ValidationErrors) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

fn workflow_status(err: &WorkflowError) -> StatusCode {
    match err {
        WorkflowError::InvalidTransition { .. } | WorkflowError::AlreadyFinalized { .. } => {
            StatusCode::CONFLICT
        }
        WorkflowError::IncompleteAttempt { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::NotApproved => StatusCode::NOT_FOUND,
        WorkflowError::NotPermitted { .. } => StatusCode::FORBIDDEN,
        WorkflowError::ScoreOutOfRange { .. }
        | WorkflowError::InvalidDefinition { .. }
        | WorkflowError::InvalidAnswer { .. }
        | WorkflowError::InvalidFeedback { .. } => StatusCode::BAD_REQUEST,
    }
}

fn plain(status: StatusCode, detail: String) -> Response {
    let body = ErrorResponse {
        status: status.as_u16(),
        detail,
        code: None,
        remediation: None,
        missing_question_indices: None,
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(message) => {
                let mut response = plain(StatusCode::UNAUTHORIZED, message.to_string());
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            ApiError::BadRequest(message) => plain(StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => plain(StatusCode::NOT_FOUND, message),
            ApiError::Workflow(err) => {
                let status = workflow_status(&err);
                let missing = match &err {
                    WorkflowError::IncompleteAttempt { missing } => Some(missing.clone()),
                    _ => None,
                };
                let body = ErrorResponse {
                    status: status.as_u16(),
                    detail: err.to_string(),
                    code: Some(err.kind()),
                    remediation: Some(err.remediation()),
                    missing_question_indices: missing,
                };
                (status, Json(body)).into_response()
            }
            ApiError::ServiceUnavailable(message) => {
                tracing::error!(error = %message, "Service unavailable");
                plain(StatusCode::SERVICE_UNAVAILABLE, message)
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                plain(StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn body_of(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn incomplete_attempt_lists_missing_indices() {
        let error = ApiError::from(ServiceError::Workflow(WorkflowError::IncompleteAttempt {
            missing: vec![1, 2],
        }));
        let (status, body) = body_of(error).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["missing_question_indices"], serde_json::json!([1, 2]));
        assert_eq!(body["code"], "incomplete_attempt");
    }

    #[tokio::test]
    async fn not_approved_maps_to_404_with_message() {
        let (status, body) = body_of(ApiError::Workflow(WorkflowError::NotApproved)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "no assessment available");
    }

    #[tokio::test]
    async fn invalid_transition_carries_remediation() {
        let error = WorkflowError::invalid_transition("reject", "pending_review", "rejection requires notes");
        let (status, body) = body_of(ApiError::Workflow(error)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["remediation"], "rejection requires notes");
        assert!(body.get("missing_question_indices").is_none());
    }
}
