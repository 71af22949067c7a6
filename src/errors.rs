use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::{DbErr, SqlErr};
use serde::{Deserialize, Serialize};

/// Per-field validation messages, keyed by the request's field names.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

static DEBUG_MODE: AtomicBool = AtomicBool::new(false);

/// Toggle whether internal error detail is exposed in responses.
pub fn set_debug_mode(enabled: bool) {
    DEBUG_MODE.store(enabled, Ordering::Relaxed);
}

fn debug_mode() -> bool {
    DEBUG_MODE.load(Ordering::Relaxed)
}

/// Uniform wire envelope for every error the API produces.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("{0}")]
    NotFound(String),

    #[error("The given data was invalid.")]
    Validation(FieldErrors),

    /// A business-rule rejection with a field-addressed explanation
    /// (e.g. rating a product from an undelivered order).
    #[error("{message}")]
    Rejected {
        message: String,
        errors: FieldErrors,
    },

    /// A uniqueness violation (duplicate email, duplicate rating).
    #[error("{message}")]
    Conflict {
        message: String,
        errors: FieldErrors,
    },

    #[error("{message}")]
    Unauthenticated {
        message: String,
        errors: Option<FieldErrors>,
    },

    #[error("{message}")]
    Forbidden {
        message: String,
        errors: Option<FieldErrors>,
    },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Single-field validation failure.
    pub fn validation(field: impl Into<String>, detail: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.into(), vec![detail.into()]);
        ServiceError::Validation(errors)
    }

    pub fn rejected(
        message: impl Into<String>,
        field: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.into(), vec![detail.into()]);
        ServiceError::Rejected {
            message: message.into(),
            errors,
        }
    }

    pub fn conflict(
        message: impl Into<String>,
        field: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.into(), vec![detail.into()]);
        ServiceError::Conflict {
            message: message.into(),
            errors,
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ServiceError::Unauthenticated {
            message: message.into(),
            errors: None,
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ServiceError::Forbidden {
            message: message.into(),
            errors: None,
        }
    }

    pub fn forbidden_field(
        message: impl Into<String>,
        field: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.into(), vec![detail.into()]);
        ServiceError::Forbidden {
            message: message.into(),
            errors: Some(errors),
        }
    }

    /// Login failure, addressed at the `email` field.
    pub fn invalid_credentials() -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(
            "email".to_string(),
            vec!["These credentials do not match our records.".to_string()],
        );
        ServiceError::Unauthenticated {
            message: "Invalid email or password".to_string(),
            errors: Some(errors),
        }
    }

    /// Returns the HTTP status code for this error. This is the single
    /// source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::Rejected { .. } | Self::Conflict { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Builds the wire envelope. Internal errors carry their detail in
    /// the `error` key only when debug mode is on.
    pub fn body(&self) -> ErrorBody {
        match self {
            Self::Database(err) => internal_body("An unexpected error occurred", err.to_string()),
            Self::Internal(detail) => {
                internal_body("An unexpected error occurred", detail.clone())
            }
            Self::Validation(errors) => ErrorBody {
                message: self.to_string(),
                errors: Some(errors.clone()),
                error: None,
            },
            Self::Rejected { message, errors } | Self::Conflict { message, errors } => ErrorBody {
                message: message.clone(),
                errors: Some(errors.clone()),
                error: None,
            },
            Self::Unauthenticated { message, errors } | Self::Forbidden { message, errors } => {
                ErrorBody {
                    message: message.clone(),
                    errors: errors.clone(),
                    error: None,
                }
            }
            _ => ErrorBody {
                message: self.to_string(),
                errors: None,
                error: None,
            },
        }
    }
}

fn internal_body(message: &str, detail: String) -> ErrorBody {
    ErrorBody {
        message: message.to_string(),
        errors: None,
        error: Some(if debug_mode() {
            detail
        } else {
            "Please try again later".to_string()
        }),
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(self.body())).into_response()
    }
}

/// Whether a database error is a uniqueness-constraint violation.
/// Used to reclassify storage conflicts (duplicate rating, duplicate
/// email) instead of surfacing a raw database error.
pub fn is_unique_violation(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }
    // sqlite and postgres messages when the driver does not classify
    let text = err.to_string();
    text.contains("UNIQUE constraint failed")
        || text.contains("duplicate key value violates unique constraint")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn status_code_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::validation("email", "required").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::conflict("dup", "email", "taken").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::unauthenticated("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::invalid_credentials().status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::forbidden("x").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_body_is_field_addressed() {
        let err = ServiceError::validation("rating", "The rating must be between 1 and 5.");
        let body = err.body();
        assert_eq!(body.message, "The given data was invalid.");
        let errors = body.errors.expect("field errors expected");
        assert_eq!(
            errors.get("rating").map(|v| v.as_slice()),
            Some(&["The rating must be between 1 and 5.".to_string()][..])
        );
    }

    #[test]
    fn internal_detail_is_hidden_outside_debug_mode() {
        set_debug_mode(false);
        let body = ServiceError::Internal("secret detail".into()).body();
        assert_eq!(body.error.as_deref(), Some("Please try again later"));

        set_debug_mode(true);
        let body = ServiceError::Internal("secret detail".into()).body();
        assert_eq!(body.error.as_deref(), Some("secret detail"));
        set_debug_mode(false);
    }

    #[tokio::test]
    async fn response_envelope_shape() {
        let response = ServiceError::rejected(
            "You can only rate products from delivered orders.",
            "order_id",
            "Order must be delivered before rating.",
        )
        .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body.message,
            "You can only rate products from delivered orders."
        );
        assert!(body.errors.unwrap().contains_key("order_id"));
    }

    #[test]
    fn unique_violation_detection_from_message() {
        let err = DbErr::Custom("UNIQUE constraint failed: ratings.user_id".into());
        assert!(is_unique_violation(&err));
        let err = DbErr::Custom(
            "duplicate key value violates unique constraint \"ratings_user_product_order\"".into(),
        );
        assert!(is_unique_violation(&err));
        let err = DbErr::Custom("connection reset".into());
        assert!(!is_unique_violation(&err));
    }
}
