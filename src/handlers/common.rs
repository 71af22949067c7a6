use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use validator::Validate;

use crate::errors::{FieldErrors, ServiceError};

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// `{"message": ...}` acknowledgement, used by delete endpoints.
pub fn message_response(message: &str) -> Response {
    (StatusCode::OK, Json(json!({ "message": message }))).into_response()
}

/// Validate request input, converting derive-level failures into the
/// field-addressed 422 envelope.
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input.validate().map_err(|errors| {
        let mut fields = FieldErrors::new();
        for (field, failures) in errors.field_errors() {
            let messages = failures
                .iter()
                .map(|failure| {
                    failure
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("The {field} field is invalid."))
                })
                .collect();
            fields.insert(field.to_string(), messages);
        }
        ServiceError::Validation(fields)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(range(min = 1, max = 5, message = "The rating must be between 1 and 5."))]
        rating: i32,
        #[validate(email(message = "The email must be a valid email address."))]
        email: String,
    }

    #[test]
    fn failures_map_to_request_field_names() {
        let bad = Sample {
            rating: 9,
            email: "not-an-email".to_string(),
        };
        let err = validate_input(&bad).unwrap_err();
        let ServiceError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        assert_eq!(
            fields.get("rating").map(|v| v.as_slice()),
            Some(&["The rating must be between 1 and 5.".to_string()][..])
        );
        assert!(fields.contains_key("email"));
    }

    #[test]
    fn valid_input_passes() {
        let ok = Sample {
            rating: 4,
            email: "a@b.test".to_string(),
        };
        assert!(validate_input(&ok).is_ok());
    }
}
