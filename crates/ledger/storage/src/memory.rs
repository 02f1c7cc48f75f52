//! In-memory reference implementation of the ledger storage traits.
//!
//! Deterministic and test-friendly. Each trait method takes the relevant
//! write lock once, so every conditional transition is a single-writer
//! operation: of two racing callers, exactly one observes the expected state.

use crate::model::{
    AuditAppend, AuditRecord, EscalationRecord, EvidencePatch, IdempotencyOutcome, IngestionUpdate,
};
use crate::traits::{
    AuditStore, DecisionStore, EscalationStore, EvidenceStore, QueryWindow,
};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use ledger_types::{
    AuditSubject, Evidence, EvidenceId, EvidenceState, MappingDecision, MappingDecisionId,
    StateTransition, TenantId,
};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory ledger storage adapter.
#[derive(Default)]
pub struct InMemoryLedgerStorage {
    evidence: RwLock<HashMap<EvidenceId, Evidence>>,
    idempotency: RwLock<HashMap<(TenantId, String), EvidenceId>>,
    audits: RwLock<Vec<AuditRecord>>,
    decisions: RwLock<HashMap<MappingDecisionId, MappingDecision>>,
    escalations: RwLock<HashMap<MappingDecisionId, EscalationRecord>>,
}

impl InMemoryLedgerStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EvidenceStore for InMemoryLedgerStorage {
    async fn create_evidence(&self, evidence: Evidence) -> StorageResult<()> {
        let mut guard = self
            .evidence
            .write()
            .map_err(|_| StorageError::Backend("evidence lock poisoned".to_string()))?;

        if guard.contains_key(&evidence.evidence_id) {
            return Err(StorageError::Conflict(format!(
                "evidence {} already exists",
                evidence.evidence_id
            )));
        }
        guard.insert(evidence.evidence_id.clone(), evidence);
        Ok(())
    }

    async fn register_idempotency_key(
        &self,
        tenant_id: &TenantId,
        key: &str,
        evidence_id: &EvidenceId,
    ) -> StorageResult<IdempotencyOutcome> {
        let mut guard = self
            .idempotency
            .write()
            .map_err(|_| StorageError::Backend("idempotency lock poisoned".to_string()))?;

        match guard.get(&(tenant_id.clone(), key.to_string())) {
            Some(existing) if existing != evidence_id => {
                Ok(IdempotencyOutcome::Existing(existing.clone()))
            }
            Some(_) => Ok(IdempotencyOutcome::Registered),
            None => {
                guard.insert(
                    (tenant_id.clone(), key.to_string()),
                    evidence_id.clone(),
                );
                Ok(IdempotencyOutcome::Registered)
            }
        }
    }

    async fn apply_ingestion(
        &self,
        evidence_id: &EvidenceId,
        update: IngestionUpdate,
        transition: StateTransition,
    ) -> StorageResult<Evidence> {
        let mut guard = self
            .evidence
            .write()
            .map_err(|_| StorageError::Backend("evidence lock poisoned".to_string()))?;
        let record = guard
            .get_mut(evidence_id)
            .ok_or_else(|| StorageError::NotFound(format!("evidence {} not found", evidence_id)))?;

        check_transition(record, &transition)?;

        record.payload_hash = Some(update.payload_hash);
        record.metadata_hash = Some(update.metadata_hash);
        record.retention_end = Some(update.retention_end);
        record.idempotency_key = update.idempotency_key;
        record.state = transition.to;
        record.state_history.push(transition);
        Ok(record.clone())
    }

    async fn transition_state(
        &self,
        evidence_id: &EvidenceId,
        transition: StateTransition,
    ) -> StorageResult<Evidence> {
        let mut guard = self
            .evidence
            .write()
            .map_err(|_| StorageError::Backend("evidence lock poisoned".to_string()))?;
        let record = guard
            .get_mut(evidence_id)
            .ok_or_else(|| StorageError::NotFound(format!("evidence {} not found", evidence_id)))?;

        check_transition(record, &transition)?;

        record.state = transition.to;
        record.state_history.push(transition);
        Ok(record.clone())
    }

    async fn update_fields(
        &self,
        evidence_id: &EvidenceId,
        allowed_states: &[EvidenceState],
        patch: EvidencePatch,
        metadata_hash: Option<String>,
    ) -> StorageResult<Evidence> {
        let mut guard = self
            .evidence
            .write()
            .map_err(|_| StorageError::Backend("evidence lock poisoned".to_string()))?;
        let record = guard
            .get_mut(evidence_id)
            .ok_or_else(|| StorageError::NotFound(format!("evidence {} not found", evidence_id)))?;

        if !allowed_states.contains(&record.state) {
            return Err(StorageError::Conflict(format!(
                "evidence {} is {:?} and cannot be updated",
                evidence_id, record.state
            )));
        }

        if let Some(value) = patch.upstream_system {
            record.upstream_system = value;
        }
        if let Some(value) = patch.dataset_type {
            record.dataset_type = value;
        }
        if let Some(value) = patch.declared_scope {
            record.declared_scope = value;
        }
        if let Some(value) = patch.scope_target_id {
            record.scope_target_id = value;
        }
        if let Some(value) = patch.primary_intent {
            record.primary_intent = value;
        }
        if let Some(value) = patch.purpose_tags {
            record.purpose_tags = value;
        }
        if let Some(value) = patch.contains_personal_data {
            record.contains_personal_data = value;
        }
        if let Some(value) = patch.legal_basis {
            record.legal_basis = value;
        }
        if let Some(value) = patch.retention_policy {
            record.retention_policy = value;
        }
        if let Some(hash) = metadata_hash {
            record.metadata_hash = Some(hash);
        }
        Ok(record.clone())
    }

    async fn mark_superseded(
        &self,
        evidence_id: &EvidenceId,
        successor: &EvidenceId,
        transition: StateTransition,
    ) -> StorageResult<Evidence> {
        let mut guard = self
            .evidence
            .write()
            .map_err(|_| StorageError::Backend("evidence lock poisoned".to_string()))?;
        let record = guard
            .get_mut(evidence_id)
            .ok_or_else(|| StorageError::NotFound(format!("evidence {} not found", evidence_id)))?;

        if record.superseded_by.is_some() {
            return Err(StorageError::Conflict(format!(
                "evidence {} is already superseded",
                evidence_id
            )));
        }
        check_transition(record, &transition)?;

        record.superseded_by = Some(successor.clone());
        record.state = transition.to;
        record.state_history.push(transition);
        Ok(record.clone())
    }

    async fn get_evidence(&self, evidence_id: &EvidenceId) -> StorageResult<Option<Evidence>> {
        let guard = self
            .evidence
            .read()
            .map_err(|_| StorageError::Backend("evidence lock poisoned".to_string()))?;
        Ok(guard.get(evidence_id).cloned())
    }

    async fn find_by_idempotency_key(
        &self,
        tenant_id: &TenantId,
        key: &str,
    ) -> StorageResult<Option<Evidence>> {
        let id = {
            let guard = self
                .idempotency
                .read()
                .map_err(|_| StorageError::Backend("idempotency lock poisoned".to_string()))?;
            guard.get(&(tenant_id.clone(), key.to_string())).cloned()
        };
        match id {
            Some(id) => self.get_evidence(&id).await,
            None => Ok(None),
        }
    }

    async fn list_evidence(
        &self,
        tenant_id: &TenantId,
        window: QueryWindow,
    ) -> StorageResult<Vec<Evidence>> {
        let guard = self
            .evidence
            .read()
            .map_err(|_| StorageError::Backend("evidence lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|record| &record.tenant_id == tenant_id)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(apply_window(values, window))
    }
}

fn check_transition(record: &Evidence, transition: &StateTransition) -> StorageResult<()> {
    if record.state != transition.from {
        return Err(StorageError::InvariantViolation(format!(
            "invalid state transition for {}: expected {:?}, found {:?}",
            record.evidence_id, transition.from, record.state
        )));
    }
    Ok(())
}

#[async_trait]
impl AuditStore for InMemoryLedgerStorage {
    async fn append_audit(&self, event: AuditAppend) -> StorageResult<AuditRecord> {
        let mut guard = self
            .audits
            .write()
            .map_err(|_| StorageError::Backend("audit lock poisoned".to_string()))?;

        let previous_hash = guard.last().map(|e| e.hash.clone());
        let sequence = guard.len() as u64 + 1;
        let hash = compute_audit_hash(&event, previous_hash.as_deref(), sequence)?;

        let record = AuditRecord {
            audit_event_id: format!("audit-{}", Uuid::new_v4()),
            sequence,
            tenant_id: event.tenant_id,
            subject: event.subject,
            actor_id: event.actor_id,
            actor_role: event.actor_role,
            action: event.action,
            request_id: event.request_id,
            occurred_at: event.occurred_at,
            result_code: event.result_code,
            context: event.context,
            previous_hash,
            hash,
        };

        guard.push(record.clone());
        Ok(record)
    }

    async fn list_audit(&self, window: QueryWindow) -> StorageResult<Vec<AuditRecord>> {
        let guard = self
            .audits
            .read()
            .map_err(|_| StorageError::Backend("audit lock poisoned".to_string()))?;
        let mut values = guard.clone();
        values.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        Ok(apply_window(values, window))
    }

    async fn list_audit_for_subject(
        &self,
        subject: &AuditSubject,
    ) -> StorageResult<Vec<AuditRecord>> {
        let guard = self
            .audits
            .read()
            .map_err(|_| StorageError::Backend("audit lock poisoned".to_string()))?;
        Ok(guard
            .iter()
            .filter(|record| &record.subject == subject)
            .cloned()
            .collect())
    }

    async fn latest_audit_hash(&self) -> StorageResult<Option<String>> {
        let guard = self
            .audits
            .read()
            .map_err(|_| StorageError::Backend("audit lock poisoned".to_string()))?;
        Ok(guard.last().map(|e| e.hash.clone()))
    }
}

#[async_trait]
impl DecisionStore for InMemoryLedgerStorage {
    async fn record_decision(&self, decision: MappingDecision) -> StorageResult<()> {
        let mut guard = self
            .decisions
            .write()
            .map_err(|_| StorageError::Backend("decision lock poisoned".to_string()))?;
        if guard.contains_key(&decision.mapping_decision_id) {
            return Err(StorageError::Conflict(format!(
                "decision {} already exists",
                decision.mapping_decision_id
            )));
        }
        guard.insert(decision.mapping_decision_id.clone(), decision);
        Ok(())
    }

    async fn get_decision(
        &self,
        decision_id: &MappingDecisionId,
    ) -> StorageResult<Option<MappingDecision>> {
        let guard = self
            .decisions
            .read()
            .map_err(|_| StorageError::Backend("decision lock poisoned".to_string()))?;
        Ok(guard.get(decision_id).cloned())
    }

    async fn list_decisions_for_evidence(
        &self,
        evidence_id: &EvidenceId,
    ) -> StorageResult<Vec<MappingDecision>> {
        let guard = self
            .decisions
            .read()
            .map_err(|_| StorageError::Backend("decision lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|decision| decision.evidence_id.as_ref() == Some(evidence_id))
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| a.evaluated_at.cmp(&b.evaluated_at));
        Ok(values)
    }
}

#[async_trait]
impl EscalationStore for InMemoryLedgerStorage {
    async fn create_escalation(
        &self,
        record: EscalationRecord,
    ) -> StorageResult<(EscalationRecord, bool)> {
        let mut guard = self
            .escalations
            .write()
            .map_err(|_| StorageError::Backend("escalation lock poisoned".to_string()))?;
        if let Some(existing) = guard.get(&record.decision_id) {
            return Ok((existing.clone(), false));
        }
        guard.insert(record.decision_id.clone(), record.clone());
        Ok((record, true))
    }

    async fn get_escalation_for_decision(
        &self,
        decision_id: &MappingDecisionId,
    ) -> StorageResult<Option<EscalationRecord>> {
        let guard = self
            .escalations
            .read()
            .map_err(|_| StorageError::Backend("escalation lock poisoned".to_string()))?;
        Ok(guard.get(decision_id).cloned())
    }
}

fn compute_audit_hash(
    event: &AuditAppend,
    previous_hash: Option<&str>,
    sequence: u64,
) -> StorageResult<String> {
    let serializable = serde_json::json!({
        "previous_hash": previous_hash,
        "sequence": sequence,
        "tenant_id": event.tenant_id,
        "subject": event.subject,
        "actor_id": event.actor_id,
        "actor_role": event.actor_role,
        "action": event.action,
        "request_id": event.request_id,
        "occurred_at": event.occurred_at,
        "result_code": event.result_code,
        "context": event.context,
    });
    let serialized = ledger_canonical::canonical_json(&serializable)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(blake3::hash(serialized.as_bytes()).to_hex().to_string())
}

/// Walk a chain oldest-first and confirm every link references its
/// predecessor's hash.
pub fn chain_is_linked(records: &[AuditRecord]) -> bool {
    records.windows(2).all(|pair| {
        pair[1].previous_hash.as_deref() == Some(pair[0].hash.as_str())
    })
}

fn apply_window<T>(items: Vec<T>, window: QueryWindow) -> Vec<T> {
    let iter = items.into_iter().skip(window.offset);
    if window.limit == 0 {
        iter.collect()
    } else {
        iter.take(window.limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use ledger_types::{
        ActorId, AuditAction, CaptureChannel, DatasetType, DeclaredScope, RequestId,
        RetentionPolicy,
    };
    use std::collections::BTreeSet;

    fn draft(tenant: &str) -> Evidence {
        Evidence {
            evidence_id: EvidenceId::generate(),
            tenant_id: TenantId::new(tenant),
            capture_channel: CaptureChannel::Manual,
            upstream_system: "internal manual".to_string(),
            dataset_type: DatasetType::PartnerMaster,
            declared_scope: DeclaredScope::WholeOrganization,
            scope_target_id: None,
            primary_intent: "register new supplier for onboarding".to_string(),
            purpose_tags: BTreeSet::from(["onboarding".to_string()]),
            contains_personal_data: false,
            legal_basis: None,
            retention_policy: RetentionPolicy::Standard,
            retention_end: None,
            payload_hash: None,
            metadata_hash: None,
            state: EvidenceState::Draft,
            created_by: ActorId::new("ops-1"),
            created_at: Utc::now(),
            idempotency_key: None,
            superseded_by: None,
            supersedes: None,
            state_history: vec![],
        }
    }

    fn transition(from: EvidenceState, to: EvidenceState) -> StateTransition {
        StateTransition {
            from,
            to,
            actor: ActorId::new("ops-1"),
            occurred_at: Utc::now(),
            reason: "test".to_string(),
        }
    }

    fn audit_event(tenant: &str, subject: AuditSubject, action: AuditAction) -> AuditAppend {
        AuditAppend {
            tenant_id: TenantId::new(tenant),
            subject,
            actor_id: ActorId::new("ops-1"),
            actor_role: "operator".to_string(),
            action,
            request_id: RequestId::generate(),
            occurred_at: Utc::now(),
            result_code: "OK".to_string(),
            context: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn conditional_transition_rejects_stale_expectation() {
        let storage = InMemoryLedgerStorage::new();
        let record = draft("t1");
        let id = record.evidence_id.clone();
        storage.create_evidence(record).await.unwrap();

        let result = storage
            .transition_state(&id, transition(EvidenceState::Ingested, EvidenceState::Sealed))
            .await;
        assert!(matches!(result, Err(StorageError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn exactly_one_seal_winner_under_concurrency() {
        let storage = std::sync::Arc::new(InMemoryLedgerStorage::new());
        let mut record = draft("t1");
        record.state = EvidenceState::Ingested;
        let id = record.evidence_id.clone();
        storage.create_evidence(record).await.unwrap();

        let a = {
            let storage = storage.clone();
            let id = id.clone();
            tokio::spawn(async move {
                storage
                    .transition_state(
                        &id,
                        transition(EvidenceState::Ingested, EvidenceState::Sealed),
                    )
                    .await
            })
        };
        let b = {
            let storage = storage.clone();
            let id = id.clone();
            tokio::spawn(async move {
                storage
                    .transition_state(
                        &id,
                        transition(EvidenceState::Ingested, EvidenceState::Sealed),
                    )
                    .await
            })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn idempotency_key_binds_once_per_tenant() {
        let storage = InMemoryLedgerStorage::new();
        let first = draft("t1");
        let second = draft("t1");
        let other_tenant = draft("t2");
        let tenant = TenantId::new("t1");

        storage.create_evidence(first.clone()).await.unwrap();
        storage.create_evidence(second.clone()).await.unwrap();
        storage.create_evidence(other_tenant.clone()).await.unwrap();

        let outcome = storage
            .register_idempotency_key(&tenant, "push-42", &first.evidence_id)
            .await
            .unwrap();
        assert_eq!(outcome, IdempotencyOutcome::Registered);

        let outcome = storage
            .register_idempotency_key(&tenant, "push-42", &second.evidence_id)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            IdempotencyOutcome::Existing(first.evidence_id.clone())
        );

        // The same key under another tenant is independent.
        let outcome = storage
            .register_idempotency_key(
                &TenantId::new("t2"),
                "push-42",
                &other_tenant.evidence_id,
            )
            .await
            .unwrap();
        assert_eq!(outcome, IdempotencyOutcome::Registered);
    }

    #[tokio::test]
    async fn audit_chain_hashes_are_linked() {
        let storage = InMemoryLedgerStorage::new();
        let subject = AuditSubject::Evidence(EvidenceId::generate());

        let mut first = audit_event("t1", subject.clone(), AuditAction::DraftCreated);
        first.occurred_at = Utc::now();
        let first = storage.append_audit(first).await.unwrap();

        let mut second = audit_event("t1", subject.clone(), AuditAction::Ingested);
        second.occurred_at = Utc::now() + Duration::seconds(1);
        let second = storage.append_audit(second).await.unwrap();

        assert_eq!(second.previous_hash, Some(first.hash.clone()));

        let replay = storage.list_audit_for_subject(&subject).await.unwrap();
        assert!(chain_is_linked(&replay));
    }

    #[tokio::test]
    async fn superseding_twice_is_a_conflict() {
        let storage = InMemoryLedgerStorage::new();
        let mut record = draft("t1");
        record.state = EvidenceState::Sealed;
        let id = record.evidence_id.clone();
        storage.create_evidence(record).await.unwrap();

        let successor = EvidenceId::generate();
        storage
            .mark_superseded(
                &id,
                &successor,
                transition(EvidenceState::Sealed, EvidenceState::Superseded),
            )
            .await
            .unwrap();

        let result = storage
            .mark_superseded(
                &id,
                &EvidenceId::generate(),
                transition(EvidenceState::Superseded, EvidenceState::Superseded),
            )
            .await;
        assert!(matches!(result, Err(StorageError::Conflict(_))));
    }

    #[tokio::test]
    async fn escalations_are_idempotent_per_decision() {
        let storage = InMemoryLedgerStorage::new();
        let decision_id = MappingDecisionId::generate();
        let record = EscalationRecord {
            escalation_id: "esc-1".to_string(),
            tenant_id: TenantId::new("t1"),
            decision_id: decision_id.clone(),
            reason_code: "SANCTIONS_MATCH".to_string(),
            resolver_role: "compliance-officer".to_string(),
            priority: "critical".to_string(),
            sla_hours: 4,
            due_at: Utc::now(),
            created_at: Utc::now(),
        };

        let (_, created) = storage.create_escalation(record.clone()).await.unwrap();
        assert!(created);

        let mut duplicate = record.clone();
        duplicate.escalation_id = "esc-2".to_string();
        let (stored, created) = storage.create_escalation(duplicate).await.unwrap();
        assert!(!created);
        assert_eq!(stored.escalation_id, "esc-1");
    }
}
