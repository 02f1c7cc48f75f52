use super::*;
use ledger_types::{
    CaptureChannel, ChannelContext, DatasetType, DeclaredScope, EntityType, EvidencePayload,
    MappingDecisionId, MappingStatus, RetentionPolicy,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn ctx() -> ActorContext {
    ActorContext::new("tenant-1", "ops-1", "operator")
}

fn request() -> IngestionRequest {
    IngestionRequest {
        capture_channel: CaptureChannel::Manual,
        metadata: ledger_types::DeclaredMetadata {
            upstream_system: "internal manual".to_string(),
            dataset_type: DatasetType::PartnerMaster,
            declared_scope: DeclaredScope::WholeOrganization,
            scope_target_id: None,
            primary_intent: "register supplier for onboarding".to_string(),
            purpose_tags: BTreeSet::from(["onboarding".to_string(), "cbam".to_string()]),
            contains_personal_data: false,
            legal_basis: None,
            retention_policy: RetentionPolicy::Standard,
        },
        payload: EvidencePayload::Structured {
            value: serde_json::json!({"partner": "ACME", "country": "DE"}),
        },
        attachments: vec![],
        channel_context: ChannelContext::default(),
        idempotency_key: None,
        retention_end_override: None,
    }
}

fn decision_for(evidence_id: EvidenceId) -> MappingDecision {
    MappingDecision {
        mapping_decision_id: MappingDecisionId::generate(),
        evidence_id: Some(evidence_id),
        entity_id: "partner-acme".to_string(),
        entity_type: EntityType::BusinessPartner,
        status: MappingStatus::Approved,
        completeness_score: 92,
        missing_fields: vec![],
        blocking_reasons: vec![],
        framework_readiness: vec![],
        duplicate_candidates: vec![],
        required_next_actions: vec![],
        evidence_lineage: vec![],
        rule_version: "2026.1".to_string(),
        evaluated_at: Utc::now(),
    }
}

#[tokio::test]
async fn seal_then_update_conflicts_and_hashes_are_unchanged() {
    let ledger = EvidenceLedger::new();
    let ctx = ctx();
    let receipt = ledger.ingest(&ctx, &request()).await.unwrap();
    ledger.seal(&ctx, &receipt.evidence_id).await.unwrap();

    let before = ledger.get(&receipt.evidence_id).await.unwrap().unwrap();
    let result = ledger
        .update(
            &ctx,
            &receipt.evidence_id,
            EvidencePatch {
                primary_intent: Some("tampered intent declaration".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(LedgerError::Conflict { .. })));

    let after = ledger.get(&receipt.evidence_id).await.unwrap().unwrap();
    assert_eq!(before.payload_hash, after.payload_hash);
    assert_eq!(before.metadata_hash, after.metadata_hash);
    assert_eq!(after.state, EvidenceState::Sealed);
}

#[tokio::test]
async fn repeated_ingest_with_same_key_returns_one_evidence_id() {
    let ledger = EvidenceLedger::new();
    let ctx = ctx();
    let mut req = request();
    req.capture_channel = CaptureChannel::ApiPush;
    req.idempotency_key = Some("push-ref-7".to_string());

    let first = ledger.ingest(&ctx, &req).await.unwrap();
    let second = ledger.ingest(&ctx, &req).await.unwrap();
    let third = ledger.ingest(&ctx, &req).await.unwrap();

    assert_eq!(first.evidence_id, second.evidence_id);
    assert_eq!(first.evidence_id, third.evidence_id);
    assert_eq!(first.payload_hash, second.payload_hash);
}

#[tokio::test]
async fn idempotent_replay_with_different_payload_is_a_conflict() {
    let ledger = EvidenceLedger::new();
    let ctx = ctx();
    let mut req = request();
    req.idempotency_key = Some("push-ref-9".to_string());
    ledger.ingest(&ctx, &req).await.unwrap();

    req.payload = EvidencePayload::Structured {
        value: serde_json::json!({"partner": "OTHER"}),
    };
    let result = ledger.ingest(&ctx, &req).await;
    match result {
        Err(LedgerError::Conflict { code, .. }) => {
            assert_eq!(code, ErrorCode::IdempotencyPayloadMismatch);
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_seal_produces_one_sealed_event_and_one_conflict() {
    let ledger = std::sync::Arc::new(EvidenceLedger::new());
    let ctx_a = ctx();
    let ctx_b = ctx();
    let receipt = ledger.ingest(&ctx_a, &request()).await.unwrap();
    let id = receipt.evidence_id.clone();

    let a = {
        let ledger = ledger.clone();
        let id = id.clone();
        tokio::spawn(async move { ledger.seal(&ctx_a, &id).await })
    };
    let b = {
        let ledger = ledger.clone();
        let id = id.clone();
        tokio::spawn(async move { ledger.seal(&ctx_b, &id).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(LedgerError::Conflict { .. }))));

    let trail = ledger.audit_trail(&id).await.unwrap();
    let sealed_events = trail
        .iter()
        .filter(|record| record.action == AuditAction::Sealed)
        .count();
    assert_eq!(sealed_events, 1);
}

#[tokio::test]
async fn supersession_preserves_decisions_and_keeps_old_record_queryable() {
    let ledger = EvidenceLedger::new();
    let ctx = ctx();
    let receipt = ledger.ingest(&ctx, &request()).await.unwrap();
    ledger.seal(&ctx, &receipt.evidence_id).await.unwrap();

    let decision = decision_for(receipt.evidence_id.clone());
    let decision_id = decision.mapping_decision_id.clone();
    ledger.record_decision(&ctx, decision).await.unwrap();

    let (old, successor) = ledger
        .supersede(&ctx, &receipt.evidence_id, &request(), "corrected master data")
        .await
        .unwrap();

    assert_eq!(old.state, EvidenceState::Superseded);
    assert_eq!(old.superseded_by, Some(successor.evidence_id.clone()));
    assert_eq!(successor.state, EvidenceState::Draft);
    assert_eq!(successor.supersedes, Some(old.evidence_id.clone()));

    // Still queryable, decisions untouched.
    let fetched = ledger.get(&old.evidence_id).await.unwrap().unwrap();
    assert_eq!(fetched.state, EvidenceState::Superseded);
    let decisions = ledger.decisions_for(&old.evidence_id).await.unwrap();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].mapping_decision_id, decision_id);
    assert_eq!(decisions[0].status, MappingStatus::Approved);

    // A second supersession of the same record is refused.
    let again = ledger
        .supersede(&ctx, &old.evidence_id, &request(), "again")
        .await;
    assert!(matches!(
        again,
        Err(LedgerError::Conflict {
            code: ErrorCode::AlreadySuperseded,
            ..
        })
    ));
}

#[tokio::test]
async fn superseded_successor_can_be_ingested_and_sealed() {
    let ledger = EvidenceLedger::new();
    let ctx = ctx();
    let receipt = ledger.ingest(&ctx, &request()).await.unwrap();
    ledger.seal(&ctx, &receipt.evidence_id).await.unwrap();
    let (_, successor) = ledger
        .supersede(&ctx, &receipt.evidence_id, &request(), "corrected figures")
        .await
        .unwrap();

    // A successor draft cannot be sealed before it is ingested.
    let premature = ledger.seal(&ctx, &successor.evidence_id).await;
    assert!(matches!(premature, Err(LedgerError::Conflict { .. })));

    let payload = EvidencePayload::Structured {
        value: serde_json::json!({"partner": "ACME", "country": "DE", "volume": 12}),
    };
    let ingested = ledger
        .ingest_draft(&ctx, &successor.evidence_id, &payload, None)
        .await
        .unwrap();
    assert_eq!(ingested.evidence_id, successor.evidence_id);
    assert_eq!(ingested.state, EvidenceState::Ingested);
    assert_eq!(ingested.payload_hash.len(), 64);
    assert!(ingested.retention_end.is_some());

    let sealed = ledger.seal(&ctx, &successor.evidence_id).await.unwrap();
    assert_eq!(sealed.state, EvidenceState::Sealed);
}

#[tokio::test]
async fn staged_draft_is_ingestable_exactly_once() {
    let ledger = EvidenceLedger::new();
    let ctx = ctx();
    let draft = ledger.create_draft(&ctx, &request()).await.unwrap();

    let payload = EvidencePayload::Structured {
        value: serde_json::json!({"partner": "ACME"}),
    };
    let receipt = ledger
        .ingest_draft(&ctx, &draft.evidence_id, &payload, None)
        .await
        .unwrap();
    assert_eq!(receipt.state, EvidenceState::Ingested);

    let again = ledger
        .ingest_draft(&ctx, &draft.evidence_id, &payload, None)
        .await;
    assert!(matches!(
        again,
        Err(LedgerError::Conflict {
            code: ErrorCode::InvalidStateTransition,
            ..
        })
    ));
}

#[tokio::test]
async fn lineage_follows_supersession_chain_oldest_first() {
    let ledger = EvidenceLedger::new();
    let ctx = ctx();
    let receipt = ledger.ingest(&ctx, &request()).await.unwrap();
    ledger.seal(&ctx, &receipt.evidence_id).await.unwrap();
    let (_, successor) = ledger
        .supersede(&ctx, &receipt.evidence_id, &request(), "v2")
        .await
        .unwrap();

    let lineage = ledger
        .evidence_lineage(&successor.evidence_id)
        .await
        .unwrap();
    assert_eq!(lineage, vec![receipt.evidence_id, successor.evidence_id]);
}

#[tokio::test]
async fn quarantine_is_resumable_to_prior_state() {
    let ledger = EvidenceLedger::new();
    let ctx = ctx();
    let receipt = ledger.ingest(&ctx, &request()).await.unwrap();

    ledger
        .quarantine(&ctx, &receipt.evidence_id, ErrorCode::MissingPortalContext)
        .await
        .unwrap();
    let held = ledger.get(&receipt.evidence_id).await.unwrap().unwrap();
    assert_eq!(held.state, EvidenceState::Quarantined);

    let resumed = ledger
        .resume_quarantined(&ctx, &receipt.evidence_id)
        .await
        .unwrap();
    assert_eq!(resumed.state, EvidenceState::Ingested);
}

#[tokio::test]
async fn retry_after_partial_ingestion_completes_the_held_draft() {
    let ledger = EvidenceLedger::new();
    let ctx = ctx();
    let mut req = request();
    req.idempotency_key = Some("push-ref-11".to_string());

    // A crash between key registration and hash stamping leaves the key
    // bound to a draft. Stage exactly that state.
    let draft = ledger.create_draft(&ctx, &req).await.unwrap();
    ledger
        .storage()
        .register_idempotency_key(&ctx.tenant_id, "push-ref-11", &draft.evidence_id)
        .await
        .unwrap();

    // The caller retries with the same key and the same request, and the
    // held draft is completed instead of conflicting forever.
    let receipt = ledger.ingest(&ctx, &req).await.unwrap();
    assert_eq!(receipt.evidence_id, draft.evidence_id);
    assert_eq!(receipt.state, EvidenceState::Ingested);
    assert_eq!(receipt.payload_hash.len(), 64);

    // Further replays are ordinary idempotent replays.
    let replay = ledger.ingest(&ctx, &req).await.unwrap();
    assert_eq!(replay.evidence_id, draft.evidence_id);
}

#[tokio::test]
async fn parity_hold_blocks_sealing_until_resumed() {
    let ledger = EvidenceLedger::new();
    let ctx = ctx();
    let receipt = ledger.ingest(&ctx, &request()).await.unwrap();

    let held = ledger
        .hold_for_parity(
            &ctx,
            &receipt.evidence_id,
            serde_json::json!([{"channel": "MANUAL", "field": "metadata.primary_intent",
                "detail": "silently trimmed"}]),
        )
        .await
        .unwrap();
    assert_eq!(held.state, EvidenceState::Quarantined);

    let sealed = ledger.seal(&ctx, &receipt.evidence_id).await;
    assert!(matches!(sealed, Err(LedgerError::Conflict { .. })));

    let trail = ledger.audit_trail(&receipt.evidence_id).await.unwrap();
    let violation = trail
        .iter()
        .find(|r| r.action == AuditAction::ParityViolation)
        .unwrap();
    assert_eq!(violation.result_code, "CRITICAL");
    assert!(violation.context.get("violations").is_some());

    // Once the divergence is fixed the hold is resumable and sealing works.
    ledger
        .resume_quarantined(&ctx, &receipt.evidence_id)
        .await
        .unwrap();
    let sealed = ledger.seal(&ctx, &receipt.evidence_id).await.unwrap();
    assert_eq!(sealed.state, EvidenceState::Sealed);
}

#[tokio::test]
async fn escalation_creation_is_audited_against_the_decision() {
    let ledger = EvidenceLedger::new();
    let ctx = ctx();
    let decision_id = MappingDecisionId::generate();
    let escalation = ledger_storage::EscalationRecord {
        escalation_id: "esc-test-1".to_string(),
        tenant_id: ctx.tenant_id.clone(),
        decision_id: decision_id.clone(),
        reason_code: "FRAMEWORK_GAP".to_string(),
        resolver_role: "sustainability-analyst".to_string(),
        priority: "MEDIUM".to_string(),
        sla_hours: 120,
        due_at: Utc::now() + chrono::Duration::hours(120),
        created_at: Utc::now(),
    };

    ledger.record_escalation(&ctx, &escalation).await.unwrap();

    let trail = ledger
        .storage()
        .list_audit_for_subject(&AuditSubject::MappingDecision(decision_id))
        .await
        .unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].action, AuditAction::EscalationCreated);
    assert_eq!(trail[0].context["escalation_id"], "esc-test-1");
}

#[tokio::test]
async fn every_transition_leaves_an_audit_event_with_the_request_id() {
    let ledger = EvidenceLedger::new();
    let ctx = ctx();
    let receipt = ledger.ingest(&ctx, &request()).await.unwrap();
    ledger.seal(&ctx, &receipt.evidence_id).await.unwrap();

    let trail = ledger.audit_trail(&receipt.evidence_id).await.unwrap();
    let actions: Vec<_> = trail.iter().map(|r| r.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::DraftCreated,
            AuditAction::Ingested,
            AuditAction::Sealed
        ]
    );
    assert!(trail.iter().all(|r| r.request_id == ctx.request_id));

    let sealed = trail.last().unwrap();
    assert!(sealed.context.get("payload_hash").is_some());
    assert!(sealed.context.get("metadata_hash").is_some());
}

#[tokio::test]
async fn retention_override_is_applied_and_audited() {
    let ledger = EvidenceLedger::new();
    let ctx = ctx();
    let mut req = request();
    let explicit = Utc::now() + chrono::Duration::days(400);
    req.retention_end_override = Some(explicit);

    let receipt = ledger.ingest(&ctx, &req).await.unwrap();
    assert_eq!(receipt.retention_end, Some(explicit));

    let trail = ledger.audit_trail(&receipt.evidence_id).await.unwrap();
    assert!(trail
        .iter()
        .any(|r| r.action == AuditAction::RetentionOverridden));
}

#[tokio::test]
async fn invalid_request_creates_nothing() {
    let ledger = EvidenceLedger::new();
    let ctx = ctx();
    let mut req = request();
    req.metadata.purpose_tags.clear();

    let result = ledger.ingest(&ctx, &req).await;
    assert!(matches!(result, Err(LedgerError::Validation { .. })));
    assert!(ledger
        .list(&ctx.tenant_id, QueryWindow::default())
        .await
        .unwrap()
        .is_empty());
}

#[derive(Debug, Clone)]
enum LifecycleOp {
    Seal,
    Update,
    Quarantine,
    Resume,
    Reject,
}

fn op_strategy() -> impl Strategy<Value = Vec<LifecycleOp>> {
    proptest::collection::vec(
        prop_oneof![
            Just(LifecycleOp::Seal),
            Just(LifecycleOp::Update),
            Just(LifecycleOp::Quarantine),
            Just(LifecycleOp::Resume),
            Just(LifecycleOp::Reject),
        ],
        0..10,
    )
}

proptest! {
    #[test]
    fn property_lifecycle_transitions_are_explicit(ops in op_strategy()) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");

        rt.block_on(async move {
            let ledger = EvidenceLedger::new();
            let ctx = ctx();
            let receipt = ledger.ingest(&ctx, &request()).await.expect("ingest");
            let id = receipt.evidence_id.clone();

            for op in ops {
                // Invalid operations must fail loudly; none may corrupt state.
                let _ = match op {
                    LifecycleOp::Seal => ledger.seal(&ctx, &id).await.map(|_| ()),
                    LifecycleOp::Update => ledger
                        .update(
                            &ctx,
                            &id,
                            EvidencePatch {
                                primary_intent: Some(
                                    "updated declaration of intent".to_string(),
                                ),
                                ..Default::default()
                            },
                        )
                        .await
                        .map(|_| ()),
                    LifecycleOp::Quarantine => ledger
                        .quarantine(&ctx, &id, ErrorCode::MissingPortalContext)
                        .await
                        .map(|_| ()),
                    LifecycleOp::Resume => {
                        ledger.resume_quarantined(&ctx, &id).await.map(|_| ())
                    }
                    LifecycleOp::Reject => ledger.reject(&ctx, &id, "prop").await.map(|_| ()),
                };

                let current = ledger.get(&id).await.expect("get").expect("record");
                if current.state == EvidenceState::Sealed {
                    assert!(current.payload_hash.is_some());
                    assert!(current.metadata_hash.is_some());
                }
            }

            // The state history must be a connected chain from Draft.
            let record = ledger.get(&id).await.expect("get").expect("record");
            let mut cursor = EvidenceState::Draft;
            for step in &record.state_history {
                assert_eq!(step.from, cursor);
                cursor = step.to;
            }
            assert_eq!(cursor, record.state);
        });
    }
}
