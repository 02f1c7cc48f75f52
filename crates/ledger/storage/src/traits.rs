use crate::model::{
    AuditAppend, AuditRecord, EscalationRecord, EvidencePatch, IdempotencyOutcome, IngestionUpdate,
};
use crate::StorageResult;
use async_trait::async_trait;
use ledger_types::{
    AuditSubject, Evidence, EvidenceId, EvidenceState, MappingDecision, MappingDecisionId,
    StateTransition, TenantId,
};

/// Generic query window for paged reads. A zero limit means unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

/// Storage interface for evidence records.
///
/// Every mutation is a conditional write keyed on the record's current
/// state, executed under the backend's single-writer guarantee. Concurrent
/// callers racing the same transition see exactly one winner; the loser gets
/// a conflict, never a second transition.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Insert a new draft record. Conflict if the id already exists.
    async fn create_evidence(&self, evidence: Evidence) -> StorageResult<()>;

    /// Bind an idempotency key to a record, or report the existing holder.
    /// Registration is atomic per (tenant, key).
    async fn register_idempotency_key(
        &self,
        tenant_id: &TenantId,
        key: &str,
        evidence_id: &EvidenceId,
    ) -> StorageResult<IdempotencyOutcome>;

    /// Apply ingestion results and the `Draft -> Ingested` transition as one
    /// conditional write.
    async fn apply_ingestion(
        &self,
        evidence_id: &EvidenceId,
        update: IngestionUpdate,
        transition: StateTransition,
    ) -> StorageResult<Evidence>;

    /// Transition state conditionally: fails unless the record currently
    /// holds `transition.from`.
    async fn transition_state(
        &self,
        evidence_id: &EvidenceId,
        transition: StateTransition,
    ) -> StorageResult<Evidence>;

    /// Patch declared fields. Fails unless the record is in one of the
    /// allowed states. When the record already carries a metadata hash, the
    /// caller supplies the recomputed hash for the merged metadata so the
    /// digest never goes stale.
    async fn update_fields(
        &self,
        evidence_id: &EvidenceId,
        allowed_states: &[EvidenceState],
        patch: EvidencePatch,
        metadata_hash: Option<String>,
    ) -> StorageResult<Evidence>;

    /// Mark a sealed record superseded by its successor, exactly once.
    async fn mark_superseded(
        &self,
        evidence_id: &EvidenceId,
        successor: &EvidenceId,
        transition: StateTransition,
    ) -> StorageResult<Evidence>;

    /// Get one record by id.
    async fn get_evidence(&self, evidence_id: &EvidenceId) -> StorageResult<Option<Evidence>>;

    /// Find the record holding an idempotency key, if any.
    async fn find_by_idempotency_key(
        &self,
        tenant_id: &TenantId,
        key: &str,
    ) -> StorageResult<Option<Evidence>>;

    /// List a tenant's records newest-first.
    async fn list_evidence(
        &self,
        tenant_id: &TenantId,
        window: QueryWindow,
    ) -> StorageResult<Vec<Evidence>>;
}

/// Storage interface for the append-only audit trail. The public contract
/// deliberately has no update or delete.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append an event and return the canonical, hash-linked stored record.
    async fn append_audit(&self, event: AuditAppend) -> StorageResult<AuditRecord>;

    /// Read events newest-first.
    async fn list_audit(&self, window: QueryWindow) -> StorageResult<Vec<AuditRecord>>;

    /// Read events for one subject, oldest-first, for replay.
    async fn list_audit_for_subject(
        &self,
        subject: &AuditSubject,
    ) -> StorageResult<Vec<AuditRecord>>;

    /// Get the latest audit hash anchor.
    async fn latest_audit_hash(&self) -> StorageResult<Option<String>>;
}

/// Storage interface for immutable mapping decisions.
#[async_trait]
pub trait DecisionStore: Send + Sync {
    /// Insert a decision. Conflict if the id already exists; decisions are
    /// never rewritten.
    async fn record_decision(&self, decision: MappingDecision) -> StorageResult<()>;

    async fn get_decision(
        &self,
        decision_id: &MappingDecisionId,
    ) -> StorageResult<Option<MappingDecision>>;

    /// Decisions tied to an evidence record, oldest-first. Supersession of
    /// the record never touches these.
    async fn list_decisions_for_evidence(
        &self,
        evidence_id: &EvidenceId,
    ) -> StorageResult<Vec<MappingDecision>>;
}

/// Storage interface for escalation work items, idempotent per decision.
#[async_trait]
pub trait EscalationStore: Send + Sync {
    /// Insert a work item unless one already exists for the decision. The
    /// stored record is returned along with whether this call created it.
    async fn create_escalation(
        &self,
        record: EscalationRecord,
    ) -> StorageResult<(EscalationRecord, bool)>;

    async fn get_escalation_for_decision(
        &self,
        decision_id: &MappingDecisionId,
    ) -> StorageResult<Option<EscalationRecord>>;
}

/// Unified storage bundle the ledger runtime runs on.
pub trait LedgerStorage:
    EvidenceStore + AuditStore + DecisionStore + EscalationStore + Send + Sync
{
}

impl<T> LedgerStorage for T where
    T: EvidenceStore + AuditStore + DecisionStore + EscalationStore + Send + Sync
{
}
