//! Error handling

use axum::response::IntoResponse;
use tracing::{error, info, warn};

use crate::settings::InvalidSetting;
use crate::watermark::WatermarkError;

/// Request failures of the promptvision web app.
#[derive(Debug)]
pub enum PromptVisionError {
    /// When you didn't do the right thing
    BadRequest(String),
    /// When a requested resource is not found
    NotFound(String),
    /// When the same operation is already running
    Conflict(String),
    /// When no preview can be drawn
    RenderUnavailable(String),
    /// When an internal server error occurs
    InternalServerError(String),
}

impl From<WatermarkError> for PromptVisionError {
    fn from(err: WatermarkError) -> Self {
        match err {
            WatermarkError::InvalidConfig(msg) => PromptVisionError::BadRequest(msg),
            other => PromptVisionError::RenderUnavailable(other.to_string()),
        }
    }
}

impl From<InvalidSetting> for PromptVisionError {
    fn from(err: InvalidSetting) -> Self {
        PromptVisionError::BadRequest(err.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for PromptVisionError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        PromptVisionError::BadRequest(err.body_text())
    }
}

impl From<axum::http::Error> for PromptVisionError {
    fn from(err: axum::http::Error) -> Self {
        PromptVisionError::InternalServerError(err.to_string())
    }
}

impl From<url::ParseError> for PromptVisionError {
    fn from(err: url::ParseError) -> Self {
        PromptVisionError::InternalServerError(err.to_string())
    }
}

impl PromptVisionError {
    fn status_and_body(&self) -> (axum::http::StatusCode, &'static str) {
        use axum::http::StatusCode;
        match self {
            PromptVisionError::BadRequest(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
            PromptVisionError::NotFound(_) => (StatusCode::NOT_FOUND, "Not Found"),
            PromptVisionError::Conflict(_) => (
                StatusCode::CONFLICT,
                "Another request is already in progress, please wait.",
            ),
            PromptVisionError::RenderUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Preview unavailable")
            }
            PromptVisionError::InternalServerError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl IntoResponse for PromptVisionError {
    fn into_response(self) -> axum::response::Response {
        match &self {
            PromptVisionError::BadRequest(msg) => info!("Bad request received: {msg}"),
            PromptVisionError::NotFound(what) => info!("404 {what}"),
            PromptVisionError::Conflict(what) => info!("Rejected overlapping {what}"),
            PromptVisionError::RenderUnavailable(msg) => warn!("Render unavailable: {msg}"),
            PromptVisionError::InternalServerError(msg) => {
                error!("Internal server error: {}", msg)
            }
        }
        let (status, body) = self.status_and_body();
        let mut response = axum::response::Response::new(axum::body::Body::from(body));
        *response.status_mut() = status;
        response
    }
}
