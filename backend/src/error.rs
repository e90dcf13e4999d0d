use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::detection::DetectionError;
use crate::lists::{ListError, StoreError};

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Error surface of the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Detection(#[from] DetectionError),
    #[error(transparent)]
    List(#[from] ListError),
    #[error("{0}")]
    BadRequest(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::List(ListError::Store(err))
    }
}

impl ApiError {
    /// Message shown to clients. Ownership failures read exactly like a
    /// missing list and back-end failures stay generic.
    fn client_message(&self) -> String {
        match self {
            ApiError::Detection(DetectionError::InvalidImage(msg)) => msg.clone(),
            ApiError::Detection(DetectionError::Unavailable(_)) => {
                "Failed to process image".to_string()
            }
            ApiError::List(ListError::NotFound(_)) | ApiError::List(ListError::NotOwner { .. }) => {
                "Shopping list not found".to_string()
            }
            ApiError::List(ListError::InvalidStatus(_)) => "Invalid status value".to_string(),
            ApiError::List(ListError::Validation(msg)) => msg.clone(),
            ApiError::List(ListError::Conflict(_)) => {
                "Shopping list was modified concurrently, please retry".to_string()
            }
            ApiError::List(ListError::Store(_)) => "Internal server error".to_string(),
            ApiError::BadRequest(msg) => msg.clone(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Detection(DetectionError::InvalidImage(_)) => StatusCode::BAD_REQUEST,
            ApiError::Detection(DetectionError::Unavailable(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::List(ListError::NotFound(_)) | ApiError::List(ListError::NotOwner { .. }) => {
                StatusCode::NOT_FOUND
            }
            ApiError::List(ListError::InvalidStatus(_))
            | ApiError::List(ListError::Validation(_))
            | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::List(ListError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::List(ListError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            log::error!("Request failed: {}", self);
        }
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.client_message(),
        })
    }
}
