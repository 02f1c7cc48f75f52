use serde::{Deserialize, Serialize};

/// Stable machine-readable error codes. The same malformed input always maps
/// to the same code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation
    MissingRequiredField,
    InvalidFieldValue,
    MissingLegalBasis,
    MissingScopeTarget,
    InvalidRetentionPolicy,
    IntentTooShort,
    EmptyPurposeTags,
    MissingAttachment,
    AttachmentForbidden,
    MissingSnapshotDate,
    MissingExternalReference,
    MissingEntryNotes,
    // Hashing
    NoHashComputed,
    // Conflict
    ImmutableRecord,
    InvalidStateTransition,
    IdempotencyPayloadMismatch,
    AlreadySuperseded,
    // Quarantine
    MissingPortalContext,
    ParityViolation,
    // System
    UpstreamTimeout,
    UpstreamUnavailable,
    StorageFailure,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            ErrorCode::InvalidFieldValue => "INVALID_FIELD_VALUE",
            ErrorCode::MissingLegalBasis => "MISSING_LEGAL_BASIS",
            ErrorCode::MissingScopeTarget => "MISSING_SCOPE_TARGET",
            ErrorCode::InvalidRetentionPolicy => "INVALID_RETENTION_POLICY",
            ErrorCode::IntentTooShort => "INTENT_TOO_SHORT",
            ErrorCode::EmptyPurposeTags => "EMPTY_PURPOSE_TAGS",
            ErrorCode::MissingAttachment => "MISSING_ATTACHMENT",
            ErrorCode::AttachmentForbidden => "ATTACHMENT_FORBIDDEN",
            ErrorCode::MissingSnapshotDate => "MISSING_SNAPSHOT_DATE",
            ErrorCode::MissingExternalReference => "MISSING_EXTERNAL_REFERENCE",
            ErrorCode::MissingEntryNotes => "MISSING_ENTRY_NOTES",
            ErrorCode::NoHashComputed => "NO_HASH_COMPUTED",
            ErrorCode::ImmutableRecord => "IMMUTABLE_RECORD",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::IdempotencyPayloadMismatch => "IDEMPOTENCY_PAYLOAD_MISMATCH",
            ErrorCode::AlreadySuperseded => "ALREADY_SUPERSEDED",
            ErrorCode::MissingPortalContext => "MISSING_PORTAL_CONTEXT",
            ErrorCode::ParityViolation => "PARITY_VIOLATION",
            ErrorCode::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            ErrorCode::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            ErrorCode::StorageFailure => "STORAGE_FAILURE",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One field-level validation failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
