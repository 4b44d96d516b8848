//! The sole code→HTTP-status mapping point in the workspace.
//!
//! Every other crate surfaces an [`OdinError`] and stops there; only this
//! module calls [`OdinError::http_status`] to turn one into a response, per
//! the Locality rule.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use odin_error::{ErrorCode, ErrorResponse, OdinError};

/// Wraps an [`OdinError`] so it can be returned directly from an Axum
/// handler.
pub struct ApiError(pub OdinError);

impl From<OdinError> for ApiError {
    fn from(err: OdinError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        // spec.md §8's boundary behavior calls for a plain-text body on
        // quota rejection, not the structured JSON error shape every other
        // code uses.
        if self.0.code == ErrorCode::TenantQuotaExceeded {
            return (status, "tenant_quota_exceeded").into_response();
        }
        let body: ErrorResponse = (&self.0).into();
        (status, Json(body)).into_response()
    }
}
