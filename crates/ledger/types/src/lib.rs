//! Shared vocabulary for the evidence ledger and the mapping gate.
//!
//! Every crate in the workspace speaks in these types. Nothing here performs
//! IO or holds state; this crate is the contract layer.

#![deny(unsafe_code)]

mod audit;
mod decision;
mod error;
mod evidence;
mod ids;
mod request;

pub use audit::{AuditAction, AuditSubject};
pub use decision::{
    BlockingReason, DuplicateCandidate, EntitySnapshot, EntityType, FieldSeverity, Framework,
    FrameworkReadiness, MappingDecision, MappingStatus, MissingField, NextAction,
};
pub use error::{ErrorCode, FieldError};
pub use evidence::{
    CaptureChannel, DatasetType, DeclaredScope, Evidence, EvidenceState, RetentionPolicy,
    StateTransition,
};
pub use ids::{
    ActorId, AuditEventId, EvidenceId, MappingDecisionId, RequestId, TenantId,
};
pub use request::{
    Attachment, ChannelContext, DeclaredMetadata, EvidencePayload, IngestionReceipt,
    IngestionRequest,
};
