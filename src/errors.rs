use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Unprocessable Entity",
    "message": "Nomor telepon minimal 10 digit",
    "field": "phone",
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category
    #[schema(example = "Not Found")]
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Offending input field for field-scoped validation failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "phone")]
    pub field: Option<String>,
    /// Where the client should send the user to recover
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "/checkout")]
    pub redirect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{message}")]
    FieldValidation { field: String, message: String },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Gagal membuat pesanan: {message}")]
    CheckoutFailed { message: String, redirect: String },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        // Report one offending field, picked deterministically, so clients can highlight it.
        let mut fields: Vec<_> = err.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);
        let first = fields.into_iter().find_map(|(field, errors)| {
            errors.first().map(|e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field));
                (field.to_string(), message)
            })
        });
        match first {
            Some((field, message)) => ServiceError::FieldValidation { field, message },
            None => ServiceError::ValidationError(err.to_string()),
        }
    }
}

impl ServiceError {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::FieldValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Maps a store error, separating CHECK/UNIQUE violations from other failures.
    pub fn from_db(err: DbErr) -> Self {
        let text = err.to_string();
        let lowered = text.to_ascii_lowercase();
        if lowered.contains("check constraint")
            || lowered.contains("unique constraint")
            || lowered.contains("violates")
        {
            ServiceError::ConstraintViolation(text)
        } else {
            ServiceError::DatabaseError(err)
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::ConstraintViolation(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::FieldValidation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::StorageError(_) | Self::CheckoutFailed { .. } => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::Other(_) => "Internal server error".to_string(),
            Self::ConstraintViolation(_) => "Data ditolak oleh aturan penyimpanan".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.response_message();
        let (field, redirect) = match &self {
            Self::FieldValidation { field, .. } => (Some(field.clone()), None),
            Self::CheckoutFailed { redirect, .. } => (None, Some(redirect.clone())),
            _ => (None, None),
        };

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message,
            field,
            redirect,
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use validator::Validate;

    #[tokio::test]
    async fn service_error_response_includes_request_id() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::NotFound("missing".into()).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
    }

    #[tokio::test]
    async fn field_validation_carries_field_name() {
        let response = ServiceError::field("phone", "too short").into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.field.as_deref(), Some("phone"));
        assert_eq!(payload.message, "too short");
    }

    #[tokio::test]
    async fn checkout_failure_carries_redirect() {
        let response = ServiceError::CheckoutFailed {
            message: "insert failed".into(),
            redirect: "/checkout".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.redirect.as_deref(), Some("/checkout"));
    }

    #[test]
    fn check_constraint_failures_are_distinguished() {
        let sqlite = DbErr::Custom("CHECK constraint failed: payment_method".into());
        assert!(matches!(
            ServiceError::from_db(sqlite),
            ServiceError::ConstraintViolation(_)
        ));

        let postgres = DbErr::Custom(
            "new row for relation \"purchases\" violates check constraint".into(),
        );
        assert!(matches!(
            ServiceError::from_db(postgres),
            ServiceError::ConstraintViolation(_)
        ));

        let other = DbErr::Custom("connection reset".into());
        assert!(matches!(
            ServiceError::from_db(other),
            ServiceError::DatabaseError(_)
        ));
    }

    #[test]
    fn internal_details_are_hidden() {
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("secret".into())).response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::NotFound("Purchase not found".into()).response_message(),
            "Not found: Purchase not found"
        );
    }

    #[derive(Validate)]
    struct Contact {
        #[validate(length(min = 10, message = "Nomor telepon minimal 10 digit"))]
        phone: String,
    }

    #[test]
    fn validator_errors_become_field_errors() {
        let err = Contact {
            phone: "0812".into(),
        }
        .validate()
        .unwrap_err();
        match ServiceError::from(err) {
            ServiceError::FieldValidation { field, message } => {
                assert_eq!(field, "phone");
                assert_eq!(message, "Nomor telepon minimal 10 digit");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
