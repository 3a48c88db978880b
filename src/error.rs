// Error types: domain errors (thiserror) and the HTTP-facing AppError

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::time::Duration;

/// Failure of a call to the suggestion provider.
#[derive(Debug, thiserror::Error)]
pub enum SuggestionError {
    #[error("AI functionality is disabled: no API key configured")]
    Disabled,
    #[error("suggestion provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("suggestion provider did not answer within {0:?}")]
    Timeout(Duration),
    #[error("malformed suggestion provider reply: {0}")]
    Malformed(String),
}

/// Reasons a saved search could not be captured.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("a saved search needs a non-empty name")]
    EmptyName,
}

/// Reasons a listing draft was refused by the posting flow.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ListingError {
    #[error("a listing needs a title")]
    MissingTitle,
    #[error("unknown subcategory '{0}'")]
    UnknownCategory(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("subcategory id '{id}' appears under both '{first}' and '{second}'")]
    DuplicateSubcategory {
        id: String,
        first: String,
        second: String,
    },
    #[error("invalid catalog document: {0}")]
    Invalid(#[from] serde_json::Error),
}

#[derive(Debug)]
pub enum AppError {
    InternalServerError(anyhow::Error),
    Unauthorized(String),
    BadRequest(String),
    NotFound(String),
    ServiceUnavailable(String),
}

// Implement conversion from anyhow::Error for easier error propagation
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::InternalServerError(error)
    }
}

impl From<SuggestionError> for AppError {
    fn from(error: SuggestionError) -> Self {
        match error {
            SuggestionError::Disabled => {
                AppError::ServiceUnavailable(SuggestionError::Disabled.to_string())
            }
            other => AppError::InternalServerError(anyhow::Error::new(other)),
        }
    }
}

impl From<CaptureError> for AppError {
    fn from(error: CaptureError) -> Self {
        AppError::BadRequest(error.to_string())
    }
}

impl From<ListingError> for AppError {
    fn from(error: ListingError) -> Self {
        AppError::BadRequest(error.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(e) => {
                tracing::error!("Internal server error: {:?}", e);
                // Don't expose internal details to the client
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Unauthorized(message) => {
                tracing::warn!("Unauthorized request: {}", message);
                (StatusCode::UNAUTHORIZED, message)
            }
            AppError::BadRequest(message) => {
                tracing::warn!("Bad request: {}", message);
                (StatusCode::BAD_REQUEST, message)
            }
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::ServiceUnavailable(message) => {
                tracing::warn!("Service unavailable: {}", message);
                (StatusCode::SERVICE_UNAVAILABLE, message)
            }
        };

        (status, error_message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_provider_maps_to_service_unavailable() {
        let response = AppError::from(SuggestionError::Disabled).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn internal_errors_hide_details() {
        let response =
            AppError::from(SuggestionError::Malformed("not json".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn empty_name_is_a_bad_request() {
        let response = AppError::from(CaptureError::EmptyName).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
