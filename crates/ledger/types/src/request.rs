use crate::evidence::{CaptureChannel, DatasetType, DeclaredScope, RetentionPolicy};
use crate::ids::{EvidenceId, RequestId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Payload carried by an ingestion request. The variant a channel may use is
/// fixed by that channel's payload mode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum EvidencePayload {
    /// Raw bytes, typically file content.
    Bytes {
        #[serde(with = "base64_bytes")]
        content: Vec<u8>,
    },
    /// Structured value pushed by an upstream system.
    Structured { value: Value },
    /// Digest-only reference: the payload stays upstream, only its
    /// pre-computed digest and locator travel.
    DigestReference {
        external_digest: String,
        locator: String,
    },
}

impl EvidencePayload {
    pub fn is_empty(&self) -> bool {
        match self {
            EvidencePayload::Bytes { content } => content.is_empty(),
            EvidencePayload::Structured { value } => value.is_null(),
            EvidencePayload::DigestReference { external_digest, .. } => external_digest.is_empty(),
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

/// A file attached to a file-bearing submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    /// Storage reference issued by the file-storage collaborator.
    pub storage_ref: String,
    pub size_bytes: u64,
}

/// Channel-specific provenance, supplied by the adapter that shaped the
/// request. These fields are the ones legitimately allowed to differ across
/// channels for otherwise identical input.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelContext {
    /// Snapshot moment declared by scheduled/batch exports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_date: Option<DateTime<Utc>>,
    /// Server-issued portal submission token, verified before shaping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portal_submission_id: Option<String>,
    /// Upstream reference id, doubles as the idempotency key for pushes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_reference_id: Option<String>,
    /// Operator attestation notes for manual entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_notes: Option<String>,
}

/// The declared-metadata object hashed into `metadata_hash`. Collections are
/// ordered so the digest is insensitive to declaration order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredMetadata {
    pub upstream_system: String,
    pub dataset_type: DatasetType,
    pub declared_scope: DeclaredScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_target_id: Option<String>,
    pub primary_intent: String,
    pub purpose_tags: BTreeSet<String>,
    pub contains_personal_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal_basis: Option<String>,
    pub retention_policy: RetentionPolicy,
}

/// Canonical ingestion request. Every channel adapter produces exactly this
/// shape; the ledger accepts nothing else.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IngestionRequest {
    pub capture_channel: CaptureChannel,
    pub metadata: DeclaredMetadata,
    pub payload: EvidencePayload,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub channel_context: ChannelContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Explicit retention-end override; logged when used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_end_override: Option<DateTime<Utc>>,
}

/// Receipt returned on successful ingestion, and verbatim on idempotent
/// replay.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestionReceipt {
    pub evidence_id: EvidenceId,
    pub state: crate::evidence::EvidenceState,
    pub payload_hash: String,
    pub metadata_hash: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_end: Option<DateTime<Utc>>,
    pub request_id: RequestId,
}
