use ledger_canonical::CanonicalError;
use ledger_storage::StorageError;
use ledger_types::{ErrorCode, EvidenceId, FieldError};
use thiserror::Error;

/// Ledger-level errors, aligned with the error taxonomy the service maps to
/// status codes.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Declared fields failed validation. Recoverable by the caller; carries
    /// field-level detail for the first violation category found.
    #[error("validation failed: {code}")]
    Validation {
        code: ErrorCode,
        field_errors: Vec<FieldError>,
    },

    /// Attempted mutation of immutable state, or an idempotency-key replay
    /// whose payload does not match. Never silently merged.
    #[error("conflict: {message}")]
    Conflict { code: ErrorCode, message: String },

    /// The request was valid but required provenance is missing. The record
    /// is persisted and held; resumable.
    #[error("evidence {evidence_id} quarantined: {code}")]
    Quarantined {
        code: ErrorCode,
        evidence_id: EvidenceId,
    },

    #[error("evidence not found: {0}")]
    NotFound(EvidenceId),

    /// Hashing, storage, or upstream failure. Safe to retry with the same
    /// idempotency key.
    #[error("system error: {message}")]
    System { code: ErrorCode, message: String },
}

impl LedgerError {
    pub fn validation(code: ErrorCode, field_errors: Vec<FieldError>) -> Self {
        Self::Validation { code, field_errors }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            LedgerError::Validation { code, .. } => *code,
            LedgerError::Conflict { code, .. } => *code,
            LedgerError::Quarantined { code, .. } => *code,
            LedgerError::NotFound(_) => ErrorCode::InvalidFieldValue,
            LedgerError::System { code, .. } => *code,
        }
    }
}

impl From<StorageError> for LedgerError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound(msg) => LedgerError::System {
                code: ErrorCode::StorageFailure,
                message: msg,
            },
            StorageError::Conflict(msg) => LedgerError::Conflict {
                code: ErrorCode::ImmutableRecord,
                message: msg,
            },
            StorageError::InvariantViolation(msg) => LedgerError::Conflict {
                code: ErrorCode::InvalidStateTransition,
                message: msg,
            },
            StorageError::InvalidInput(msg) | StorageError::Serialization(msg) => {
                LedgerError::System {
                    code: ErrorCode::Internal,
                    message: msg,
                }
            }
            StorageError::Backend(msg) => LedgerError::System {
                code: ErrorCode::StorageFailure,
                message: msg,
            },
        }
    }
}

impl From<CanonicalError> for LedgerError {
    fn from(value: CanonicalError) -> Self {
        match value {
            CanonicalError::NoHashComputed(msg) => LedgerError::Validation {
                code: ErrorCode::NoHashComputed,
                field_errors: vec![FieldError::new("payload", msg)],
            },
            CanonicalError::Serialization(msg) => LedgerError::System {
                code: ErrorCode::Internal,
                message: msg,
            },
        }
    }
}
