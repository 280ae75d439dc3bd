use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::errors::CatalogError;

/// HTTP-facing error: validation → 400, not-found → 404, anything else →
/// 500. The body is `{"errors": [{code, message, widget?}]}`.
#[derive(Debug)]
pub enum ApiError {
    Catalog(CatalogError),
    /// Route-level not-found with a ready-made message.
    NotFound(String),
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        Self::Catalog(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, errors) = match self {
            ApiError::Catalog(CatalogError::Validation(errors)) => (
                StatusCode::BAD_REQUEST,
                errors
                    .into_iter()
                    .map(|e| {
                        json!({ "code": "BAD_VALUE", "message": e.message, "widget": e.field })
                    })
                    .collect(),
            ),
            ApiError::Catalog(e @ CatalogError::NotFound { .. }) => (
                StatusCode::NOT_FOUND,
                vec![json!({ "code": "NOT_FOUND", "message": e.to_string() })],
            ),
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                vec![json!({ "code": "NOT_FOUND", "message": message })],
            ),
            ApiError::Catalog(e @ CatalogError::Data(_)) => {
                tracing::error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    vec![json!({ "code": "INTERNAL", "message": e.to_string() })],
                )
            }
        };
        (status, Json(json!({ "errors": errors }))).into_response()
    }
}
