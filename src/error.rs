use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use thiserror::Error;
use uuid::Uuid;

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("authentication required")]
    AuthRequired,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("missing or undecodable file name")]
    InvalidFilename,

    #[error("only PDF files are accepted")]
    NotPdf,

    #[error("an upload is already in progress")]
    UploadInProgress,

    #[error("upload exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("file not found: {0}")]
    FileNotFound(Uuid),

    #[error("stored object not found: {0}")]
    ObjectMissing(String),

    #[error("object store error: {0}")]
    Storage(String),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("database unavailable: {0}")]
    Pool(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<actix_web::error::BlockingError> for VaultError {
    fn from(e: actix_web::error::BlockingError) -> Self {
        VaultError::Internal(e.to_string())
    }
}

impl ResponseError for VaultError {
    fn status_code(&self) -> StatusCode {
        match self {
            VaultError::AuthRequired | VaultError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            VaultError::InvalidFilename => StatusCode::BAD_REQUEST,
            VaultError::NotPdf => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            VaultError::UploadInProgress => StatusCode::CONFLICT,
            VaultError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            VaultError::FileNotFound(_) | VaultError::ObjectMissing(_) => StatusCode::NOT_FOUND,
            VaultError::Storage(_) | VaultError::Session(_) => StatusCode::BAD_GATEWAY,
            VaultError::Pool(_) => StatusCode::SERVICE_UNAVAILABLE,
            VaultError::Database(_) | VaultError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}", self);
        }
        HttpResponse::build(status).json(serde_json::json!({ "error": self.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_required_message_is_user_facing() {
        assert_eq!(VaultError::AuthRequired.to_string(), "authentication required");
        assert_eq!(VaultError::AuthRequired.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn backend_failures_map_to_gateway_or_server_errors() {
        assert_eq!(
            VaultError::Storage("boom".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            VaultError::Database(diesel::result::Error::NotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            VaultError::FileNotFound(Uuid::nil()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            VaultError::Pool("timed out".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn bad_file_name_is_a_client_error() {
        assert_eq!(VaultError::InvalidFilename.status_code(), StatusCode::BAD_REQUEST);
    }
}
