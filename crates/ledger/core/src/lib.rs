//! Evidence Ledger - the state machine and storage contract for evidence
//! records.
//!
//! The ledger exclusively owns evidence and audit-event lifecycles. Every
//! state transition appends an audit event carrying the caller's request id,
//! so any record's history can be replayed from the audit log alone. Sealing
//! is the immutability boundary: past it, only `state` and `superseded_by`
//! may ever change.

#![deny(unsafe_code)]

mod error;
mod retention;
mod validate;

pub use error::LedgerError;
pub use retention::retention_end;
pub use validate::{validate_metadata, validate_request, MIN_INTENT_LEN};

use chrono::{DateTime, Utc};
use ledger_storage::{
    memory::InMemoryLedgerStorage, AuditAppend, AuditRecord, EscalationRecord, EvidencePatch,
    IdempotencyOutcome, IngestionUpdate, LedgerStorage, QueryWindow,
};
use ledger_types::{
    ActorId, AuditAction, AuditSubject, DeclaredMetadata, ErrorCode, Evidence, EvidenceId,
    EvidencePayload, EvidenceState, IngestionReceipt, IngestionRequest, MappingDecision, RequestId,
    RetentionPolicy, StateTransition, TenantId,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Verified caller identity, supplied by the authentication collaborator.
#[derive(Clone, Debug)]
pub struct ActorContext {
    pub tenant_id: TenantId,
    pub actor_id: ActorId,
    pub actor_role: String,
    pub request_id: RequestId,
}

impl ActorContext {
    pub fn new(
        tenant_id: impl Into<String>,
        actor_id: impl Into<String>,
        actor_role: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: TenantId::new(tenant_id),
            actor_id: ActorId::new(actor_id),
            actor_role: actor_role.into(),
            request_id: RequestId::generate(),
        }
    }
}

/// The evidence ledger facade.
///
/// Wraps a `LedgerStorage` backend; conditional writes inside the backend
/// give each transition a single winner under concurrency.
pub struct EvidenceLedger {
    storage: Arc<dyn LedgerStorage>,
}

impl EvidenceLedger {
    /// Create a ledger backed by in-memory storage.
    pub fn new() -> Self {
        Self {
            storage: Arc::new(InMemoryLedgerStorage::new()),
        }
    }

    /// Create a ledger backed by an explicit storage adapter.
    pub fn with_storage(storage: Arc<dyn LedgerStorage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> Arc<dyn LedgerStorage> {
        Arc::clone(&self.storage)
    }

    /// Validate declared fields and create a `Draft` record. Nothing is
    /// persisted when validation fails.
    pub async fn create_draft(
        &self,
        ctx: &ActorContext,
        request: &IngestionRequest,
    ) -> Result<Evidence, LedgerError> {
        validate_request(request)?;
        let evidence = self.new_draft(ctx, request);
        self.storage.create_evidence(evidence.clone()).await?;
        self.audit(
            ctx,
            AuditSubject::Evidence(evidence.evidence_id.clone()),
            AuditAction::DraftCreated,
            "OK",
            serde_json::json!({ "capture_channel": evidence.capture_channel }),
        )
        .await?;
        info!(evidence_id = %evidence.evidence_id, channel = %evidence.capture_channel, "draft created");
        Ok(evidence)
    }

    /// Full ingestion: validate, hash, create, and transition to `Ingested`.
    ///
    /// When the request carries an idempotency key already bound to a record
    /// that reached `Ingested` or later, the original receipt is returned
    /// and no new record is created. A replay whose payload hash differs is
    /// a conflict, never a merge.
    pub async fn ingest(
        &self,
        ctx: &ActorContext,
        request: &IngestionRequest,
    ) -> Result<IngestionReceipt, LedgerError> {
        validate_request(request)?;

        // Hashes are computed before anything persists: a hashing failure
        // leaves no partial record.
        let payload_hash = ledger_canonical::hash_payload(&request.payload)?;
        let metadata_hash = ledger_canonical::hash_metadata(&request.metadata)?;

        if let Some(key) = request.idempotency_key.as_deref() {
            if let Some(existing) = self
                .storage
                .find_by_idempotency_key(&ctx.tenant_id, key)
                .await?
            {
                return self
                    .replay_or_conflict(ctx, existing, request, &payload_hash, &metadata_hash)
                    .await;
            }
        }

        let evidence = self.new_draft(ctx, request);
        let evidence_id = evidence.evidence_id.clone();
        self.storage.create_evidence(evidence).await?;
        self.audit(
            ctx,
            AuditSubject::Evidence(evidence_id.clone()),
            AuditAction::DraftCreated,
            "OK",
            serde_json::json!({ "capture_channel": request.capture_channel }),
        )
        .await?;

        if let Some(key) = request.idempotency_key.as_deref() {
            let outcome = self
                .storage
                .register_idempotency_key(&ctx.tenant_id, key, &evidence_id)
                .await?;
            if let IdempotencyOutcome::Existing(holder) = outcome {
                // Lost the registration race. Retire our draft and defer to
                // the holder.
                self.transition(
                    ctx,
                    &evidence_id,
                    EvidenceState::Draft,
                    EvidenceState::Rejected,
                    "duplicate idempotency key",
                    AuditAction::Rejected,
                )
                .await?;
                let existing = self
                    .storage
                    .get_evidence(&holder)
                    .await?
                    .ok_or_else(|| LedgerError::NotFound(holder.clone()))?;
                return self
                    .replay_or_conflict(ctx, existing, request, &payload_hash, &metadata_hash)
                    .await;
            }
        }

        self.complete_ingestion(
            ctx,
            &evidence_id,
            request.metadata.retention_policy,
            payload_hash,
            metadata_hash,
            request.idempotency_key.clone(),
            request.retention_end_override,
        )
        .await
    }

    /// Advance an existing `Draft` to `Ingested`, hashing the supplied
    /// payload against the declared metadata already on the record. This is
    /// the ingestion path for supersession successors, resumed quarantine
    /// drafts, and records staged through `create_draft`.
    pub async fn ingest_draft(
        &self,
        ctx: &ActorContext,
        evidence_id: &EvidenceId,
        payload: &EvidencePayload,
        retention_end_override: Option<DateTime<Utc>>,
    ) -> Result<IngestionReceipt, LedgerError> {
        let current = self.require(evidence_id).await?;
        if current.state != EvidenceState::Draft {
            return Err(LedgerError::Conflict {
                code: ErrorCode::InvalidStateTransition,
                message: format!(
                    "only drafts can be ingested, {} is {:?}",
                    evidence_id, current.state
                ),
            });
        }
        let payload_hash = ledger_canonical::hash_payload(payload)?;
        let metadata_hash = ledger_canonical::hash_metadata(&declared_metadata_of(&current))?;
        self.complete_ingestion(
            ctx,
            evidence_id,
            current.retention_policy,
            payload_hash,
            metadata_hash,
            current.idempotency_key.clone(),
            retention_end_override,
        )
        .await
    }

    /// Hash stamping and the `Draft -> Ingested` conditional transition,
    /// shared by every ingestion path.
    #[allow(clippy::too_many_arguments)]
    async fn complete_ingestion(
        &self,
        ctx: &ActorContext,
        evidence_id: &EvidenceId,
        retention_policy: RetentionPolicy,
        payload_hash: String,
        metadata_hash: String,
        idempotency_key: Option<String>,
        retention_end_override: Option<DateTime<Utc>>,
    ) -> Result<IngestionReceipt, LedgerError> {
        let ingested_at = Utc::now();
        let retention_end_at = match retention_end_override {
            Some(explicit) => {
                self.audit(
                    ctx,
                    AuditSubject::Evidence(evidence_id.clone()),
                    AuditAction::RetentionOverridden,
                    "OK",
                    serde_json::json!({ "retention_end": explicit }),
                )
                .await?;
                explicit
            }
            None => retention_end(retention_policy, ingested_at),
        };

        let update = IngestionUpdate {
            payload_hash: payload_hash.clone(),
            metadata_hash: metadata_hash.clone(),
            retention_end: retention_end_at,
            idempotency_key,
        };
        let transition = StateTransition {
            from: EvidenceState::Draft,
            to: EvidenceState::Ingested,
            actor: ctx.actor_id.clone(),
            occurred_at: ingested_at,
            reason: "ingested".to_string(),
        };
        let evidence = self
            .storage
            .apply_ingestion(evidence_id, update, transition)
            .await?;

        self.audit(
            ctx,
            AuditSubject::Evidence(evidence_id.clone()),
            AuditAction::Ingested,
            "OK",
            serde_json::json!({
                "payload_hash": payload_hash,
                "metadata_hash": metadata_hash,
            }),
        )
        .await?;
        info!(evidence_id = %evidence_id, "evidence ingested");
        Ok(receipt_of(&evidence, ctx))
    }

    async fn replay_or_conflict(
        &self,
        ctx: &ActorContext,
        existing: Evidence,
        request: &IngestionRequest,
        payload_hash: &str,
        metadata_hash: &str,
    ) -> Result<IngestionReceipt, LedgerError> {
        if matches!(existing.state, EvidenceState::Draft) {
            // The holder never completed ingestion, so the retry finishes it
            // under the same key rather than binding a second record. The
            // conditional transition inside storage keeps a concurrent
            // completion from applying twice.
            info!(
                evidence_id = %existing.evidence_id,
                "idempotency key held by unfinished draft, completing its ingestion"
            );
            return self
                .complete_ingestion(
                    ctx,
                    &existing.evidence_id,
                    existing.retention_policy,
                    payload_hash.to_string(),
                    metadata_hash.to_string(),
                    request.idempotency_key.clone(),
                    request.retention_end_override,
                )
                .await;
        }
        if existing.payload_hash.as_deref() != Some(payload_hash) {
            return Err(LedgerError::Conflict {
                code: ErrorCode::IdempotencyPayloadMismatch,
                message: format!(
                    "idempotency key replay for {} carries a different payload",
                    existing.evidence_id
                ),
            });
        }
        self.audit(
            ctx,
            AuditSubject::Evidence(existing.evidence_id.clone()),
            AuditAction::IdempotentReplay,
            "OK",
            serde_json::json!({ "payload_hash": payload_hash }),
        )
        .await?;
        info!(evidence_id = %existing.evidence_id, "idempotent replay");
        Ok(receipt_of(&existing, ctx))
    }

    /// Seal a record: the one-way transition into immutability. Forbidden
    /// unless the record is currently `Ingested`; of two concurrent callers
    /// exactly one wins and the loser receives a conflict.
    pub async fn seal(
        &self,
        ctx: &ActorContext,
        evidence_id: &EvidenceId,
    ) -> Result<Evidence, LedgerError> {
        let evidence = self
            .transition(
                ctx,
                evidence_id,
                EvidenceState::Ingested,
                EvidenceState::Sealed,
                "sealed",
                AuditAction::Sealed,
            )
            .await?;
        info!(evidence_id = %evidence_id, "evidence sealed");
        Ok(evidence)
    }

    /// Patch declared fields. Allowed only while `Draft` or `Ingested`; any
    /// attempt against a sealed or rejected record is a conflict, never a
    /// silent no-op. The metadata hash is recomputed for records already
    /// ingested.
    pub async fn update(
        &self,
        ctx: &ActorContext,
        evidence_id: &EvidenceId,
        patch: EvidencePatch,
    ) -> Result<Evidence, LedgerError> {
        let current = self
            .storage
            .get_evidence(evidence_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(evidence_id.clone()))?;

        if current.state.is_immutable() || current.state == EvidenceState::Quarantined {
            return Err(LedgerError::Conflict {
                code: ErrorCode::ImmutableRecord,
                message: format!(
                    "evidence {} is {:?} and cannot be updated",
                    evidence_id, current.state
                ),
            });
        }

        let merged = merged_metadata(&current, &patch);
        validate_metadata(&merged)?;
        let new_hash = if current.metadata_hash.is_some() {
            Some(ledger_canonical::hash_metadata(&merged)?)
        } else {
            None
        };

        let evidence = self
            .storage
            .update_fields(
                evidence_id,
                &[EvidenceState::Draft, EvidenceState::Ingested],
                patch,
                new_hash,
            )
            .await?;

        self.audit(
            ctx,
            AuditSubject::Evidence(evidence_id.clone()),
            AuditAction::Updated,
            "OK",
            serde_json::json!({ "state": evidence.state }),
        )
        .await?;
        Ok(evidence)
    }

    /// Reject a record. Terminal.
    pub async fn reject(
        &self,
        ctx: &ActorContext,
        evidence_id: &EvidenceId,
        reason: &str,
    ) -> Result<Evidence, LedgerError> {
        let current = self.require(evidence_id).await?;
        if current.state.is_terminal() || current.state == EvidenceState::Sealed {
            return Err(LedgerError::Conflict {
                code: ErrorCode::InvalidStateTransition,
                message: format!("evidence {} is {:?}", evidence_id, current.state),
            });
        }
        self.transition(
            ctx,
            evidence_id,
            current.state,
            EvidenceState::Rejected,
            reason,
            AuditAction::Rejected,
        )
        .await
    }

    /// Hold a record pending missing provenance. Resumable.
    pub async fn quarantine(
        &self,
        ctx: &ActorContext,
        evidence_id: &EvidenceId,
        reason_code: ErrorCode,
    ) -> Result<Evidence, LedgerError> {
        let current = self.require(evidence_id).await?;
        if current.state.is_immutable() || current.state == EvidenceState::Quarantined {
            return Err(LedgerError::Conflict {
                code: ErrorCode::InvalidStateTransition,
                message: format!("evidence {} is {:?}", evidence_id, current.state),
            });
        }
        let evidence = self
            .transition_with_code(
                ctx,
                evidence_id,
                current.state,
                EvidenceState::Quarantined,
                reason_code.as_str(),
                AuditAction::Quarantined,
                reason_code.as_str(),
            )
            .await?;
        warn!(evidence_id = %evidence_id, code = %reason_code, "evidence quarantined");
        Ok(evidence)
    }

    /// Hold a record whose channel failed a parity run. The violations are
    /// appended to the audit trail and the record is quarantined, so it
    /// cannot reach `Sealed` until the divergence is resolved and the hold
    /// is resumed.
    pub async fn hold_for_parity(
        &self,
        ctx: &ActorContext,
        evidence_id: &EvidenceId,
        violations: serde_json::Value,
    ) -> Result<Evidence, LedgerError> {
        let evidence = self
            .quarantine(ctx, evidence_id, ErrorCode::ParityViolation)
            .await?;
        self.audit(
            ctx,
            AuditSubject::Evidence(evidence_id.clone()),
            AuditAction::ParityViolation,
            "CRITICAL",
            serde_json::json!({ "violations": violations }),
        )
        .await?;
        warn!(evidence_id = %evidence_id, "evidence held for channel parity violation");
        Ok(evidence)
    }

    /// Create a record directly into quarantine, for adapters that detect
    /// missing provenance before ingestion. The quarantine outcome is
    /// visible, never dropped.
    pub async fn create_quarantined(
        &self,
        ctx: &ActorContext,
        request: &IngestionRequest,
        reason_code: ErrorCode,
    ) -> Result<Evidence, LedgerError> {
        let draft = self.create_draft(ctx, request).await?;
        self.quarantine(ctx, &draft.evidence_id, reason_code).await
    }

    /// Resume a quarantined record into the state it held before quarantine.
    pub async fn resume_quarantined(
        &self,
        ctx: &ActorContext,
        evidence_id: &EvidenceId,
    ) -> Result<Evidence, LedgerError> {
        let current = self.require(evidence_id).await?;
        if current.state != EvidenceState::Quarantined {
            return Err(LedgerError::Conflict {
                code: ErrorCode::InvalidStateTransition,
                message: format!("evidence {} is not quarantined", evidence_id),
            });
        }
        let target = current
            .pre_quarantine_state()
            .unwrap_or(EvidenceState::Draft);
        self.transition(
            ctx,
            evidence_id,
            EvidenceState::Quarantined,
            target,
            "quarantine resumed",
            AuditAction::QuarantineResumed,
        )
        .await
    }

    /// Replace a sealed record with a successor draft. The old record stays
    /// fully queryable as `Superseded`, and its historical mapping decisions
    /// are never recomputed or touched.
    pub async fn supersede(
        &self,
        ctx: &ActorContext,
        old_id: &EvidenceId,
        successor_request: &IngestionRequest,
        reason: &str,
    ) -> Result<(Evidence, Evidence), LedgerError> {
        let old = self.require(old_id).await?;
        if old.superseded_by.is_some() {
            return Err(LedgerError::Conflict {
                code: ErrorCode::AlreadySuperseded,
                message: format!("evidence {} is already superseded", old_id),
            });
        }
        if old.state != EvidenceState::Sealed {
            return Err(LedgerError::Conflict {
                code: ErrorCode::InvalidStateTransition,
                message: format!(
                    "only sealed evidence can be superseded, {} is {:?}",
                    old_id, old.state
                ),
            });
        }

        validate_request(successor_request)?;
        let mut successor = self.new_draft(ctx, successor_request);
        successor.supersedes = Some(old_id.clone());
        let successor_id = successor.evidence_id.clone();
        self.storage.create_evidence(successor.clone()).await?;
        self.audit(
            ctx,
            AuditSubject::Evidence(successor_id.clone()),
            AuditAction::DraftCreated,
            "OK",
            serde_json::json!({ "supersedes": old_id }),
        )
        .await?;

        let transition = StateTransition {
            from: EvidenceState::Sealed,
            to: EvidenceState::Superseded,
            actor: ctx.actor_id.clone(),
            occurred_at: Utc::now(),
            reason: reason.to_string(),
        };
        let old = self
            .storage
            .mark_superseded(old_id, &successor_id, transition)
            .await?;
        self.audit(
            ctx,
            AuditSubject::Evidence(old_id.clone()),
            AuditAction::Superseded,
            "OK",
            serde_json::json!({ "superseded_by": successor_id, "reason": reason }),
        )
        .await?;
        info!(evidence_id = %old_id, successor = %successor_id, "evidence superseded");
        Ok((old, successor))
    }

    /// Record a mapping decision and its audit event. The gate owns decision
    /// creation but requests all side effects through this append-only API.
    pub async fn record_decision(
        &self,
        ctx: &ActorContext,
        decision: MappingDecision,
    ) -> Result<(), LedgerError> {
        let decision_id = decision.mapping_decision_id.clone();
        let status = decision.status;
        self.storage.record_decision(decision).await?;
        self.audit(
            ctx,
            AuditSubject::MappingDecision(decision_id),
            AuditAction::MappingEvaluated,
            &format!("{status:?}").to_uppercase(),
            serde_json::json!({ "status": status }),
        )
        .await?;
        Ok(())
    }

    /// Audit the creation of an escalation work item for a decision.
    pub async fn record_escalation(
        &self,
        ctx: &ActorContext,
        escalation: &EscalationRecord,
    ) -> Result<(), LedgerError> {
        self.audit(
            ctx,
            AuditSubject::MappingDecision(escalation.decision_id.clone()),
            AuditAction::EscalationCreated,
            "OK",
            serde_json::json!({
                "escalation_id": escalation.escalation_id,
                "reason_code": escalation.reason_code,
                "resolver_role": escalation.resolver_role,
                "priority": escalation.priority,
                "due_at": escalation.due_at,
            }),
        )
        .await?;
        Ok(())
    }

    pub async fn get(&self, evidence_id: &EvidenceId) -> Result<Option<Evidence>, LedgerError> {
        Ok(self.storage.get_evidence(evidence_id).await?)
    }

    pub async fn list(
        &self,
        tenant_id: &TenantId,
        window: QueryWindow,
    ) -> Result<Vec<Evidence>, LedgerError> {
        Ok(self.storage.list_evidence(tenant_id, window).await?)
    }

    /// Audit events for one record, oldest-first, for replay.
    pub async fn audit_trail(
        &self,
        evidence_id: &EvidenceId,
    ) -> Result<Vec<AuditRecord>, LedgerError> {
        Ok(self
            .storage
            .list_audit_for_subject(&AuditSubject::Evidence(evidence_id.clone()))
            .await?)
    }

    pub async fn decisions_for(
        &self,
        evidence_id: &EvidenceId,
    ) -> Result<Vec<MappingDecision>, LedgerError> {
        Ok(self.storage.list_decisions_for_evidence(evidence_id).await?)
    }

    /// Supersession lineage ending at the given record, oldest-first.
    pub async fn evidence_lineage(
        &self,
        evidence_id: &EvidenceId,
    ) -> Result<Vec<EvidenceId>, LedgerError> {
        let mut lineage = vec![evidence_id.clone()];
        let mut cursor = self.require(evidence_id).await?;
        while let Some(predecessor_id) = cursor.supersedes.clone() {
            lineage.push(predecessor_id.clone());
            match self.storage.get_evidence(&predecessor_id).await? {
                Some(predecessor) => cursor = predecessor,
                None => break,
            }
        }
        lineage.reverse();
        Ok(lineage)
    }

    async fn require(&self, evidence_id: &EvidenceId) -> Result<Evidence, LedgerError> {
        self.storage
            .get_evidence(evidence_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(evidence_id.clone()))
    }

    async fn transition(
        &self,
        ctx: &ActorContext,
        evidence_id: &EvidenceId,
        from: EvidenceState,
        to: EvidenceState,
        reason: &str,
        action: AuditAction,
    ) -> Result<Evidence, LedgerError> {
        self.transition_with_code(ctx, evidence_id, from, to, reason, action, "OK")
            .await
    }

    async fn transition_with_code(
        &self,
        ctx: &ActorContext,
        evidence_id: &EvidenceId,
        from: EvidenceState,
        to: EvidenceState,
        reason: &str,
        action: AuditAction,
        result_code: &str,
    ) -> Result<Evidence, LedgerError> {
        let transition = StateTransition {
            from,
            to,
            actor: ctx.actor_id.clone(),
            occurred_at: Utc::now(),
            reason: reason.to_string(),
        };
        let evidence = self
            .storage
            .transition_state(evidence_id, transition)
            .await?;

        let mut context = serde_json::json!({ "from": from, "to": to, "reason": reason });
        if action == AuditAction::Sealed {
            context["payload_hash"] = serde_json::json!(evidence.payload_hash);
            context["metadata_hash"] = serde_json::json!(evidence.metadata_hash);
        }
        self.audit(
            ctx,
            AuditSubject::Evidence(evidence_id.clone()),
            action,
            result_code,
            context,
        )
        .await?;
        Ok(evidence)
    }

    async fn audit(
        &self,
        ctx: &ActorContext,
        subject: AuditSubject,
        action: AuditAction,
        result_code: &str,
        context: serde_json::Value,
    ) -> Result<(), LedgerError> {
        self.storage
            .append_audit(AuditAppend {
                tenant_id: ctx.tenant_id.clone(),
                subject,
                actor_id: ctx.actor_id.clone(),
                actor_role: ctx.actor_role.clone(),
                action,
                request_id: ctx.request_id.clone(),
                occurred_at: Utc::now(),
                result_code: result_code.to_string(),
                context,
            })
            .await?;
        Ok(())
    }

    fn new_draft(&self, ctx: &ActorContext, request: &IngestionRequest) -> Evidence {
        Evidence {
            evidence_id: EvidenceId::generate(),
            tenant_id: ctx.tenant_id.clone(),
            capture_channel: request.capture_channel,
            upstream_system: request.metadata.upstream_system.clone(),
            dataset_type: request.metadata.dataset_type,
            declared_scope: request.metadata.declared_scope,
            scope_target_id: request.metadata.scope_target_id.clone(),
            primary_intent: request.metadata.primary_intent.clone(),
            purpose_tags: request.metadata.purpose_tags.clone(),
            contains_personal_data: request.metadata.contains_personal_data,
            legal_basis: request.metadata.legal_basis.clone(),
            retention_policy: request.metadata.retention_policy,
            retention_end: None,
            payload_hash: None,
            metadata_hash: None,
            state: EvidenceState::Draft,
            created_by: ctx.actor_id.clone(),
            created_at: Utc::now(),
            idempotency_key: None,
            superseded_by: None,
            supersedes: None,
            state_history: vec![],
        }
    }
}

impl Default for EvidenceLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn merged_metadata(current: &Evidence, patch: &EvidencePatch) -> DeclaredMetadata {
    DeclaredMetadata {
        upstream_system: patch
            .upstream_system
            .clone()
            .unwrap_or_else(|| current.upstream_system.clone()),
        dataset_type: patch.dataset_type.unwrap_or(current.dataset_type),
        declared_scope: patch.declared_scope.unwrap_or(current.declared_scope),
        scope_target_id: patch
            .scope_target_id
            .clone()
            .unwrap_or_else(|| current.scope_target_id.clone()),
        primary_intent: patch
            .primary_intent
            .clone()
            .unwrap_or_else(|| current.primary_intent.clone()),
        purpose_tags: patch
            .purpose_tags
            .clone()
            .unwrap_or_else(|| current.purpose_tags.clone()),
        contains_personal_data: patch
            .contains_personal_data
            .unwrap_or(current.contains_personal_data),
        legal_basis: patch
            .legal_basis
            .clone()
            .unwrap_or_else(|| current.legal_basis.clone()),
        retention_policy: patch.retention_policy.unwrap_or(current.retention_policy),
    }
}

fn declared_metadata_of(current: &Evidence) -> DeclaredMetadata {
    DeclaredMetadata {
        upstream_system: current.upstream_system.clone(),
        dataset_type: current.dataset_type,
        declared_scope: current.declared_scope,
        scope_target_id: current.scope_target_id.clone(),
        primary_intent: current.primary_intent.clone(),
        purpose_tags: current.purpose_tags.clone(),
        contains_personal_data: current.contains_personal_data,
        legal_basis: current.legal_basis.clone(),
        retention_policy: current.retention_policy,
    }
}

fn receipt_of(evidence: &Evidence, ctx: &ActorContext) -> IngestionReceipt {
    IngestionReceipt {
        evidence_id: evidence.evidence_id.clone(),
        state: evidence.state,
        payload_hash: evidence.payload_hash.clone().unwrap_or_default(),
        metadata_hash: evidence.metadata_hash.clone().unwrap_or_default(),
        created_at: evidence.created_at,
        retention_end: evidence.retention_end,
        request_id: ctx.request_id.clone(),
    }
}

#[cfg(test)]
mod tests;
