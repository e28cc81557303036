use actix_multipart::MultipartError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use forreal_shared::ErrorResponse;

use crate::routes::ALLOWED_EXTENSIONS;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Model not loaded")]
    ModelUnavailable,
    #[error("Missing upload field 'file'")]
    MissingFile,
    #[error("File must be an image")]
    NotAnImage,
    #[error("Allowed formats: {}", ALLOWED_EXTENSIONS.join(", "))]
    DisallowedExtension,
    #[error("File too large")]
    TooLarge,
    #[error("Invalid multipart payload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Prediction failed: {0}")]
    Prediction(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::MissingFile => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotAnImage | ApiError::DisallowedExtension | ApiError::Multipart(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Prediction(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            detail: self.to_string(),
        })
    }
}
