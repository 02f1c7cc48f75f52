use chrono::{DateTime, Utc};
use ledger_types::{
    Attachment, CaptureChannel, DeclaredMetadata, ErrorCode, EvidencePayload, FieldError,
    IngestionRequest,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Channel-native input, before shaping. Extras a given channel does not use
/// are simply ignored by its adapter; extras a channel requires are enforced
/// additively on top of the common field set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelInput {
    pub metadata: DeclaredMetadata,
    pub payload: EvidencePayload,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub snapshot_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub portal_submission_id: Option<String>,
    #[serde(default)]
    pub external_reference_id: Option<String>,
    #[serde(default)]
    pub entry_notes: Option<String>,
    #[serde(default)]
    pub retention_end_override: Option<DateTime<Utc>>,
}

/// Result of shaping channel input.
#[derive(Clone, Debug)]
pub enum ShapedOutcome {
    /// The request is fit for ingestion.
    Ready(IngestionRequest),
    /// The request is valid but missing required provenance; it must be
    /// persisted into quarantine, never dropped.
    Quarantined {
        request: IngestionRequest,
        reason: ErrorCode,
    },
}

impl ShapedOutcome {
    pub fn request(&self) -> &IngestionRequest {
        match self {
            ShapedOutcome::Ready(request) => request,
            ShapedOutcome::Quarantined { request, .. } => request,
        }
    }
}

/// Adapter errors. Validation failures carry field detail; upstream
/// failures are distinct so callers can retry safely.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel validation failed: {code}")]
    Validation {
        code: ErrorCode,
        field_errors: Vec<FieldError>,
    },

    /// A bounded-timeout upstream call failed; the ingestion pipeline is
    /// never blocked indefinitely and no record is partially sealed.
    #[error("upstream call failed: {message}")]
    Upstream { code: ErrorCode, message: String },
}

impl ChannelError {
    pub fn validation(code: ErrorCode, field: &str, message: &str) -> Self {
        Self::Validation {
            code,
            field_errors: vec![FieldError::new(field, message)],
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            ChannelError::Validation { code, .. } => *code,
            ChannelError::Upstream { code, .. } => *code,
        }
    }
}

/// One ingestion channel's shaping logic.
///
/// Implementations copy declared fields verbatim: no trimming, no casting,
/// no injecting defaults for undeclared fields. The parity enforcer treats
/// any such rewrite as a critical violation.
#[async_trait::async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// The channel this adapter owns.
    fn channel(&self) -> CaptureChannel;

    /// Shape channel-native input into the canonical request.
    async fn shape(&self, input: &ChannelInput) -> Result<ShapedOutcome, ChannelError>;
}

/// Assemble the canonical request shared by all adapters. Channel-specific
/// context is layered on by each caller.
pub(crate) fn base_request(
    channel: CaptureChannel,
    input: &ChannelInput,
) -> IngestionRequest {
    IngestionRequest {
        capture_channel: channel,
        metadata: input.metadata.clone(),
        payload: input.payload.clone(),
        attachments: input.attachments.clone(),
        channel_context: Default::default(),
        idempotency_key: None,
        retention_end_override: input.retention_end_override,
    }
}
