use chrono::{DateTime, Utc};
use ledger_types::{
    ActorId, AuditAction, AuditSubject, DatasetType, DeclaredScope, EvidenceId, MappingDecisionId,
    RequestId, RetentionPolicy, TenantId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Audit append payload. Sequence and chain hashes are assigned by storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditAppend {
    pub tenant_id: TenantId,
    pub subject: AuditSubject,
    pub actor_id: ActorId,
    pub actor_role: String,
    pub action: AuditAction,
    pub request_id: RequestId,
    pub occurred_at: DateTime<Utc>,
    pub result_code: String,
    /// Structured context, opaque to the ledger.
    #[serde(default)]
    pub context: Value,
}

/// Persistent tamper-evident audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub audit_event_id: String,
    pub sequence: u64,
    pub tenant_id: TenantId,
    pub subject: AuditSubject,
    pub actor_id: ActorId,
    pub actor_role: String,
    pub action: AuditAction,
    pub request_id: RequestId,
    pub occurred_at: DateTime<Utc>,
    pub result_code: String,
    pub context: Value,
    pub previous_hash: Option<String>,
    pub hash: String,
}

/// Values written onto a draft when it is ingested. Applied atomically with
/// the `Draft -> Ingested` transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionUpdate {
    pub payload_hash: String,
    pub metadata_hash: String,
    pub retention_end: DateTime<Utc>,
    pub idempotency_key: Option<String>,
}

/// Field-level patch for records still in a mutable state. `None` leaves the
/// field untouched; no value is ever injected for an undeclared field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidencePatch {
    pub upstream_system: Option<String>,
    pub dataset_type: Option<DatasetType>,
    pub declared_scope: Option<DeclaredScope>,
    pub scope_target_id: Option<Option<String>>,
    pub primary_intent: Option<String>,
    pub purpose_tags: Option<BTreeSet<String>>,
    pub contains_personal_data: Option<bool>,
    pub legal_basis: Option<Option<String>>,
    pub retention_policy: Option<RetentionPolicy>,
}

impl EvidencePatch {
    pub fn is_empty(&self) -> bool {
        self.upstream_system.is_none()
            && self.dataset_type.is_none()
            && self.declared_scope.is_none()
            && self.scope_target_id.is_none()
            && self.primary_intent.is_none()
            && self.purpose_tags.is_none()
            && self.contains_personal_data.is_none()
            && self.legal_basis.is_none()
            && self.retention_policy.is_none()
    }
}

/// Outcome of an idempotency-key registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyOutcome {
    /// The key was free and is now bound to the given record.
    Registered,
    /// The key is already bound; the holder is returned for replay handling.
    Existing(EvidenceId),
}

/// Follow-up work item created by the escalation router. At most one exists
/// per mapping decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub escalation_id: String,
    pub tenant_id: TenantId,
    pub decision_id: MappingDecisionId,
    pub reason_code: String,
    pub resolver_role: String,
    pub priority: String,
    pub sla_hours: u32,
    pub due_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
