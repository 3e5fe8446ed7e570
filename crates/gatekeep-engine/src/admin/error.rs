// HTTP polish for admin handlers.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use gatekeep_core::GatekeepError;

/// `GatekeepError` rendered as a JSON error body.
#[derive(Debug)]
pub struct ApiError(pub GatekeepError);

impl From<GatekeepError> for ApiError {
    fn from(e: GatekeepError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            GatekeepError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatekeepError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error=%self.0, "admin request failed");
        }
        let body = Json(json!({
            "error": self.0.client_code().as_str(),
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}
