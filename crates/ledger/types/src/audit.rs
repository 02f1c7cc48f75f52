use crate::ids::{EvidenceId, MappingDecisionId};
use serde::{Deserialize, Serialize};

/// What an audit event is about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum AuditSubject {
    Evidence(EvidenceId),
    MappingDecision(MappingDecisionId),
}

/// Lifecycle and decision verbs recorded in the audit trail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    DraftCreated,
    Ingested,
    Sealed,
    Updated,
    Rejected,
    Quarantined,
    QuarantineResumed,
    Superseded,
    RetentionOverridden,
    IdempotentReplay,
    ParityViolation,
    MappingEvaluated,
    EscalationCreated,
}
