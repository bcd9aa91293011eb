// HTTP API error types and the taxonomy that maps them to status codes
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::dataaccess::DataAccessError;
use crate::telemetry;

/// Public message for malformed request bodies. Parser detail is never echoed.
pub const CORRUPT_PAYLOAD_MESSAGE: &str = "Corrupt JSON payload";

const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

/// Taxonomy tag every handler error classifies into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required field is empty or missing
    MissingField,
    NotFound,
    Forbidden,
    AlreadyExists,
    NotImplemented,
    /// The data access layer itself failed
    StorageFailure,
    MalformedPayload,
    Unclassified,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::MissingField => StatusCode::EXPECTATION_FAILED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::AlreadyExists => StatusCode::CONFLICT,
            ErrorKind::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            ErrorKind::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::MalformedPayload => StatusCode::NOT_ACCEPTABLE,
            ErrorKind::Unclassified => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MissingField => "missing_field",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::NotImplemented => "not_implemented",
            ErrorKind::StorageFailure => "storage_failure",
            ErrorKind::MalformedPayload => "malformed_payload",
            ErrorKind::Unclassified => "unclassified",
        }
    }
}

impl From<&DataAccessError> for ErrorKind {
    fn from(err: &DataAccessError) -> Self {
        match err {
            DataAccessError::EmptyGroupName
            | DataAccessError::EmptyRoleName
            | DataAccessError::EmptyUserName
            | DataAccessError::FieldRequired(_) => ErrorKind::MissingField,

            DataAccessError::NoSuchGroup
            | DataAccessError::NoSuchRole
            | DataAccessError::NoSuchToken
            | DataAccessError::NoSuchUser => ErrorKind::NotFound,

            DataAccessError::AdminUndeletable => ErrorKind::Forbidden,

            DataAccessError::GroupExists
            | DataAccessError::RoleExists
            | DataAccessError::UserExists => ErrorKind::AlreadyExists,

            DataAccessError::NotImplemented => ErrorKind::NotImplemented,

            DataAccessError::NotInitialized
            | DataAccessError::CantInitialize(_)
            | DataAccessError::CantConnect(_)
            | DataAccessError::Storage(_) => ErrorKind::StorageFailure,
        }
    }
}

/// Error returned by request handlers.
///
/// Handlers never pick status codes on the error path; converting an
/// `ApiError` into a response is the only place that happens.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),

    #[error("missing value: {0}")]
    MissingValue(&'static str),

    #[error("failed to unmarshal payload: {0}")]
    Unmarshal(#[source] serde_json::Error),

    #[error(transparent)]
    Unclassified(#[from] anyhow::Error),
}

impl ApiError {
    pub fn unclassified(message: impl std::fmt::Display) -> Self {
        ApiError::Unclassified(anyhow::anyhow!("{}", message))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::DataAccess(err) => ErrorKind::from(err),
            ApiError::MissingValue(_) => ErrorKind::MissingField,
            ApiError::Unmarshal(_) => ErrorKind::MalformedPayload,
            ApiError::Unclassified(_) => ErrorKind::Unclassified,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.kind().status()
    }

    /// Client-safe message for this error.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::DataAccess(err) => err.public_message(),
            ApiError::MissingValue(_) => self.to_string(),
            ApiError::Unmarshal(_) => CORRUPT_PAYLOAD_MESSAGE.to_string(),
            ApiError::Unclassified(_) => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }
}

/// Decodes a JSON request body, classifying any failure as a malformed payload.
pub fn decode_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(ApiError::Unmarshal)
}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = kind.status();

        match kind {
            ErrorKind::StorageFailure => {
                tracing::error!(status = status.as_u16(), "{}", self);
            }
            ErrorKind::Unclassified => {
                tracing::warn!(error = %self, "Unhandled server error");
                telemetry::record_error(kind.as_str());
                tracing::error!(error = %self, status = status.as_u16(), "{}", self);
            }
            ErrorKind::MalformedPayload => {
                tracing::debug!(error = %self, "Rejected malformed payload");
            }
            _ => {}
        }

        (status, self.public_message()).into_response()
    }
}
