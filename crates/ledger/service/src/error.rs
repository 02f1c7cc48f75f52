//! HTTP error mapping.
//!
//! The error taxonomy maps one-to-one onto status codes: validation is
//! 422, a malformed request is 400, conflicts are 409, quarantine is 202
//! with the held record's id, and system failures are 5xx. Identical
//! malformed input always produces the same `error_code`, and every error
//! body carries the `request_id` that also appears in the audit trail.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ledger_channels::ChannelError;
use ledger_core::LedgerError;
use ledger_types::{ErrorCode, EvidenceId, FieldError, RequestId};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {code}")]
    Validation {
        code: ErrorCode,
        field_errors: Vec<FieldError>,
        request_id: RequestId,
    },

    #[error("bad request: {message}")]
    BadRequest {
        message: String,
        request_id: RequestId,
    },

    #[error("conflict: {message}")]
    Conflict {
        code: ErrorCode,
        message: String,
        request_id: RequestId,
    },

    #[error("evidence {evidence_id} held in quarantine")]
    Quarantined {
        code: ErrorCode,
        evidence_id: EvidenceId,
        request_id: RequestId,
    },

    #[error("not found: {0}")]
    NotFound(EvidenceId, RequestId),

    #[error("system error: {message}")]
    System {
        code: ErrorCode,
        message: String,
        request_id: RequestId,
    },
}

impl ApiError {
    pub fn from_ledger(err: LedgerError, request_id: RequestId) -> Self {
        match err {
            LedgerError::Validation { code, field_errors } => ApiError::Validation {
                code,
                field_errors,
                request_id,
            },
            LedgerError::Conflict { code, message } => ApiError::Conflict {
                code,
                message,
                request_id,
            },
            LedgerError::Quarantined { code, evidence_id } => ApiError::Quarantined {
                code,
                evidence_id,
                request_id,
            },
            LedgerError::NotFound(id) => ApiError::NotFound(id, request_id),
            LedgerError::System { code, message } => ApiError::System {
                code,
                message,
                request_id,
            },
        }
    }

    pub fn from_channel(err: ChannelError, request_id: RequestId) -> Self {
        match err {
            ChannelError::Validation { code, field_errors } => ApiError::Validation {
                code,
                field_errors,
                request_id,
            },
            ChannelError::Upstream { code, message } => ApiError::System {
                code,
                message,
                request_id,
            },
        }
    }

    pub fn bad_request(message: impl Into<String>, request_id: RequestId) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            request_id,
        }
    }
}

/// Error response body. `field_errors` is present for validation failures.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error_code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_id: Option<EvidenceId>,
    pub request_id: RequestId,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error_code, field_errors, evidence_id, request_id) = match self {
            ApiError::Validation {
                code,
                field_errors,
                request_id,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                code.as_str(),
                field_errors,
                None,
                request_id,
            ),
            ApiError::BadRequest { request_id, .. } => (
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidFieldValue.as_str(),
                vec![],
                None,
                request_id,
            ),
            ApiError::Conflict {
                code, request_id, ..
            } => (StatusCode::CONFLICT, code.as_str(), vec![], None, request_id),
            ApiError::Quarantined {
                code,
                evidence_id,
                request_id,
            } => (
                StatusCode::ACCEPTED,
                code.as_str(),
                vec![],
                Some(evidence_id),
                request_id,
            ),
            ApiError::NotFound(id, request_id) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                vec![],
                Some(id),
                request_id,
            ),
            ApiError::System {
                code, request_id, ..
            } => {
                let status = match code {
                    ErrorCode::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
                    ErrorCode::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, code.as_str(), vec![], None, request_id)
            }
        };

        if status.is_server_error() {
            tracing::error!(%request_id, error_code, "request failed: {message}");
        }

        let body = ErrorResponse {
            error_code: error_code.to_string(),
            message,
            field_errors,
            evidence_id,
            request_id,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
