use crate::{models::draft::ValidationErrors, services::ServiceError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// HTTP-facing error: a status, a message safe to show, and field errors for
/// validation failures.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub fields: Option<ValidationErrors>,
}

impl AppError {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            fields: None,
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "missing or invalid bearer token")
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.message,
            "status": self.status.as_u16()
        });
        if let Some(fields) = self.fields {
            body["fields"] = json!(fields);
        }

        (self.status, Json(body)).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(fields) => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: "validation failed".into(),
                fields: Some(fields),
            },
            ServiceError::Authorization(reason) => Self::new(StatusCode::FORBIDDEN, reason),
            err @ ServiceError::InvalidStateTransition { .. } => {
                Self::new(StatusCode::CONFLICT, err.to_string())
            }
            err @ ServiceError::NotFound { .. } => Self::not_found(err.to_string()),
            err @ (ServiceError::Persistence(_) | ServiceError::ObjectStore(_)) => {
                tracing::error!(error = %err, "request failed");
                Self::internal("internal server error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_errors_carry_fields() {
        let err = AppError::from(ServiceError::invalid("title", "Title must be at least 3 characters"));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["status"], 422);
        assert_eq!(body["fields"][0]["field"], "title");
    }

    #[tokio::test]
    async fn internal_details_stay_in_the_log() {
        let io = std::io::Error::other("disk on fire");
        let (status, body) = body_json(ServiceError::from(io).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal server error");
        assert!(body.get("fields").is_none());
    }

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (ServiceError::denied("no"), StatusCode::FORBIDDEN),
            (ServiceError::not_found("recipe", "x"), StatusCode::NOT_FOUND),
            (
                ServiceError::InvalidStateTransition {
                    entity: "recipe",
                    id: "x".into(),
                    current: "approved".into(),
                    expected: "pending",
                },
                StatusCode::CONFLICT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }
}
