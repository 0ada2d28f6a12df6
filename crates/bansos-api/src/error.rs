use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bansos_db::StoreError;
use bansos_types::rules::RuleError;
use serde::Serialize;
use tracing::error;

use crate::storage::StorageError;

pub const CODE_NIK_VERIFIED_EXISTS: &str = "NIK_VERIFIED_EXISTS";
pub const CODE_NIK_PENDING_VERIFICATION: &str = "NIK_PENDING_VERIFICATION";
pub const CODE_EMAIL_EXISTS: &str = "EMAIL_EXISTS";
pub const CODE_INVALID_NIK_FORMAT: &str = "INVALID_NIK_FORMAT";
pub const CODE_NIK_AVAILABLE: &str = "NIK_AVAILABLE";

/// Every failure a handler can return. The message is user-facing
/// (Indonesian); internal details are logged and never sent to the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Conflict { message: String, code: &'static str },

    /// Already logged where it was raised.
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Log `err` with `context` and return the generic server error.
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, err);
        Self::Internal(format!("{}: {}", context, err))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Conflict { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (message, code) = match &self {
            Self::Internal(_) => ("Server error", None),
            Self::Conflict { message, code } => (message.as_str(), Some(*code)),
            Self::Validation(m) | Self::Unauthorized(m) | Self::Forbidden(m) | Self::NotFound(m) => {
                (m.as_str(), None)
            }
        };
        (self.status(), Json(ErrorBody { message, code })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            // A unique key was taken between our existence check and the insert.
            StoreError::Duplicate("email") => Self::Conflict {
                message: "Email sudah terdaftar".into(),
                code: CODE_EMAIL_EXISTS,
            },
            StoreError::Duplicate(_) => Self::Conflict {
                message: "NIK sudah terdaftar tetapi belum diverifikasi. Tunggu verifikasi admin atau hubungi admin kelurahan.".into(),
                code: CODE_NIK_PENDING_VERIFICATION,
            },
            other => Self::internal("storage backend", other),
        }
    }
}

/// Rule violations coming straight from request input.
impl From<RuleError> for ApiError {
    fn from(e: RuleError) -> Self {
        match e {
            RuleError::InvalidStatus(_) | RuleError::MissingRejectionReason => {
                Self::Validation(e.to_string())
            }
            RuleError::MissingTarget { .. } => Self::internal("inconsistent dispute", e),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Unsupported(message) => Self::Validation(message.into()),
            StorageError::InvalidPath(_) => Self::validation("Path file tidak valid"),
            other => Self::internal("object storage", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(err: ApiError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) = body_of(ApiError::internal("db", "disk on fire")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({ "message": "Server error" }));
    }

    #[tokio::test]
    async fn conflicts_carry_a_code() {
        let err: ApiError = StoreError::Duplicate("email").into();
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], CODE_EMAIL_EXISTS);
    }

    #[test]
    fn rule_errors_split_between_input_and_backend() {
        assert_eq!(ApiError::from(RuleError::MissingRejectionReason).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(RuleError::MissingTarget { dispute_id: 3 }).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
