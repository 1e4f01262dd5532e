use crate::error::LipaError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

impl LipaError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) | Self::DecodeError(_) => StatusCode::BAD_REQUEST,
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
            Self::NotEligible => StatusCode::FORBIDDEN,
            Self::AlreadyRated => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::StoreError(_)
            | Self::ConfigError(_)
            | Self::IoError(_)
            | Self::CsvError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LipaError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Gateway(err) => json!({
                "message": "STK Push failed",
                "error": err.payload(),
            }),
            err if status.is_server_error() => {
                tracing::error!(error = %err, "Request failed");
                json!({ "message": "Internal server error" })
            }
            err => json!({ "message": err.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
