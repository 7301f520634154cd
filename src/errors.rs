use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Error body returned to API callers.
///
/// `code` is a stable machine-readable reason string; `message` is for
/// humans and may change between releases.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Cart is empty")]
    CartEmpty,

    #[error("Requested variant is not available: {0}")]
    VariantUnavailable(String),

    #[error("Unable to resolve a price: {0}")]
    PricingUnresolved(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Not eligible for this transition: {0}")]
    IneligibleTransition(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),
}

impl ServiceError {
    /// Stable machine-readable reason string for the wire.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::DatabaseError(_) => "database_error",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::ValidationError(_) => "validation_error",
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::CartEmpty => "cart_empty",
            ServiceError::VariantUnavailable(_) => "variant_unavailable",
            ServiceError::PricingUnresolved(_) => "pricing_unresolved",
            ServiceError::InvalidStatus(_) => "invalid_status",
            ServiceError::IneligibleTransition(_) => "ineligible_transition",
            ServiceError::EventError(_) => "event_error",
            ServiceError::ExternalServiceError(_) => "external_service_error",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::DatabaseError(_)
            | ServiceError::EventError(_)
            | ServiceError::ExternalServiceError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::ValidationError(_)
            | ServiceError::CartEmpty
            | ServiceError::VariantUnavailable(_)
            | ServiceError::PricingUnresolved(_)
            | ServiceError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::IneligibleTransition(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal failures keep their detail out of the response body.
        let message = match &self {
            ServiceError::DatabaseError(e) => {
                tracing::error!(error = %e, "database error surfaced to handler");
                "Internal server error".to_string()
            }
            ServiceError::EventError(e) | ServiceError::ExternalServiceError(e) => {
                tracing::error!(error = %e, "internal error surfaced to handler");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!(ErrorResponse {
            code: self.code().to_string(),
            message,
            details: None,
        }));

        (status, body).into_response()
    }
}
