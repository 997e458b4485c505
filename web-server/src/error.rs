// web-server/src/error.rs
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use pod_core::{AuthError, Error};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ApiError {
    #[error("not logged in")]
    NotLoggedIn,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Core(#[from] Error),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Core(Error::Auth(e))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotLoggedIn => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Core(e) => match e {
                Error::Auth(AuthError::ProviderUnavailable { .. })
                | Error::Auth(AuthError::InvalidProviderMetadata { .. })
                | Error::Auth(AuthError::RegistrationUnsupported(_))
                | Error::Auth(AuthError::RegistrationRejected { .. }) => StatusCode::BAD_GATEWAY,
                Error::Auth(_) => StatusCode::UNAUTHORIZED,
                Error::WriteConflict { .. } => StatusCode::CONFLICT,
                Error::InvalidUri { .. } => StatusCode::BAD_REQUEST,
                Error::Provisioning { .. } | Error::Pod(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        HttpResponse::build(status).json(json!({
            "error": self.to_string()
        }))
    }
}
