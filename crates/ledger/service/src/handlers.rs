//! Request handlers.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use gate_engine::EvaluationInput;
use ledger_channels::{ChannelInput, ParityReport, ParitySample, ShapedOutcome};
use ledger_core::ActorContext;
use ledger_storage::{AuditRecord, EvidencePatch, QueryWindow};
use chrono::{DateTime, Utc};
use ledger_types::{
    ActorId, CaptureChannel, EntitySnapshot, Evidence, EvidenceId, EvidencePayload, Framework,
    IngestionReceipt, IngestionRequest, MappingDecision, MappingStatus, RequestId, TenantId,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Caller identity headers. The authentication layer in front of the
/// service verifies them; the handlers only require their presence.
fn actor_context(headers: &HeaderMap) -> Result<ActorContext, ApiError> {
    let request_id = RequestId::generate();
    let tenant_id = required_header(headers, "x-tenant-id", &request_id)?;
    let actor_id = required_header(headers, "x-actor-id", &request_id)?;
    let actor_role = header_value(headers, "x-actor-role").unwrap_or("operator".to_string());
    Ok(ActorContext {
        tenant_id: TenantId::new(tenant_id),
        actor_id: ActorId::new(actor_id),
        actor_role,
        request_id,
    })
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn required_header(
    headers: &HeaderMap,
    name: &str,
    request_id: &RequestId,
) -> Result<String, ApiError> {
    header_value(headers, name)
        .ok_or_else(|| ApiError::bad_request(format!("missing {name} header"), request_id.clone()))
}

fn parse_channel(raw: &str, request_id: &RequestId) -> Result<CaptureChannel, ApiError> {
    CaptureChannel::ALL
        .into_iter()
        .find(|channel| channel.label().eq_ignore_ascii_case(raw))
        .ok_or_else(|| {
            ApiError::bad_request(
                format!(
                    "unknown channel '{raw}'; expected one of: {}",
                    CaptureChannel::ALL.map(|c| c.label()).join(", ")
                ),
                request_id.clone(),
            )
        })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub rule_version: String,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        rule_version: state.gate.rule_version().to_string(),
    })
}

/// Body of a 202 response for a record held in quarantine. The record is
/// persisted and resumable, never dropped.
#[derive(Debug, Serialize)]
pub struct QuarantineResponse {
    pub evidence_id: EvidenceId,
    pub state: String,
    pub error_code: String,
    pub request_id: RequestId,
}

/// Ingest through a named channel adapter. The adapter shapes the
/// channel-native input into the canonical request and assigns the channel
/// label itself.
pub async fn ingest_channel(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    headers: HeaderMap,
    Json(input): Json<ChannelInput>,
) -> ApiResult<Response> {
    let ctx = actor_context(&headers)?;
    let channel = parse_channel(&channel, &ctx.request_id)?;
    let adapter = state
        .adapter_for(channel)
        .ok_or_else(|| ApiError::bad_request("channel not enabled", ctx.request_id.clone()))?;

    let outcome = adapter
        .shape(&input)
        .await
        .map_err(|err| ApiError::from_channel(err, ctx.request_id.clone()))?;

    match outcome {
        ShapedOutcome::Ready(request) => {
            let receipt = state
                .ledger
                .ingest(&ctx, &request)
                .await
                .map_err(|err| ApiError::from_ledger(err, ctx.request_id.clone()))?;
            Ok(Json(receipt).into_response())
        }
        ShapedOutcome::Quarantined { request, reason } => {
            let evidence = state
                .ledger
                .create_quarantined(&ctx, &request, reason)
                .await
                .map_err(|err| ApiError::from_ledger(err, ctx.request_id.clone()))?;
            info!(evidence_id = %evidence.evidence_id, code = %reason, "submission quarantined");
            let body = QuarantineResponse {
                evidence_id: evidence.evidence_id,
                state: format!("{:?}", evidence.state).to_uppercase(),
                error_code: reason.as_str().to_string(),
                request_id: ctx.request_id,
            };
            Ok((StatusCode::ACCEPTED, Json(body)).into_response())
        }
    }
}

/// Ingest an already-canonical request. Idempotent replays return the
/// original receipt with a 200, never a second record.
pub async fn ingest_direct(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<IngestionRequest>,
) -> ApiResult<Json<IngestionReceipt>> {
    let ctx = actor_context(&headers)?;
    let receipt = state
        .ledger
        .ingest(&ctx, &request)
        .await
        .map_err(|err| ApiError::from_ledger(err, ctx.request_id.clone()))?;
    Ok(Json(receipt))
}

#[derive(Debug, Deserialize)]
pub struct DraftIngestRequest {
    pub payload: EvidencePayload,
    #[serde(default)]
    pub retention_end_override: Option<DateTime<Utc>>,
}

/// Advance a staged draft, such as a supersession successor, to `Ingested`
/// by supplying its payload.
pub async fn ingest_existing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<DraftIngestRequest>,
) -> ApiResult<Json<IngestionReceipt>> {
    let ctx = actor_context(&headers)?;
    let receipt = state
        .ledger
        .ingest_draft(
            &ctx,
            &EvidenceId::new(id),
            &body.payload,
            body.retention_end_override,
        )
        .await
        .map_err(|err| ApiError::from_ledger(err, ctx.request_id.clone()))?;
    Ok(Json(receipt))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

pub async fn list_evidence(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Evidence>>> {
    let ctx = actor_context(&headers)?;
    let records = state
        .ledger
        .list(
            &ctx.tenant_id,
            QueryWindow {
                limit: query.limit,
                offset: query.offset,
            },
        )
        .await
        .map_err(|err| ApiError::from_ledger(err, ctx.request_id.clone()))?;
    Ok(Json(records))
}

pub async fn get_evidence(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<Evidence>> {
    let ctx = actor_context(&headers)?;
    let evidence_id = EvidenceId::new(id);
    let evidence = state
        .ledger
        .get(&evidence_id)
        .await
        .map_err(|err| ApiError::from_ledger(err, ctx.request_id.clone()))?
        .ok_or_else(|| ApiError::NotFound(evidence_id, ctx.request_id.clone()))?;
    Ok(Json(evidence))
}

pub async fn seal_evidence(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<Evidence>> {
    let ctx = actor_context(&headers)?;
    let evidence = state
        .ledger
        .seal(&ctx, &EvidenceId::new(id))
        .await
        .map_err(|err| ApiError::from_ledger(err, ctx.request_id.clone()))?;
    Ok(Json(evidence))
}

pub async fn update_evidence(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<EvidencePatch>,
) -> ApiResult<Json<Evidence>> {
    let ctx = actor_context(&headers)?;
    let evidence = state
        .ledger
        .update(&ctx, &EvidenceId::new(id), patch)
        .await
        .map_err(|err| ApiError::from_ledger(err, ctx.request_id.clone()))?;
    Ok(Json(evidence))
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

pub async fn reject_evidence(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<RejectRequest>,
) -> ApiResult<Json<Evidence>> {
    let ctx = actor_context(&headers)?;
    let evidence = state
        .ledger
        .reject(&ctx, &EvidenceId::new(id), &body.reason)
        .await
        .map_err(|err| ApiError::from_ledger(err, ctx.request_id.clone()))?;
    Ok(Json(evidence))
}

pub async fn resume_evidence(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<Evidence>> {
    let ctx = actor_context(&headers)?;
    let evidence = state
        .ledger
        .resume_quarantined(&ctx, &EvidenceId::new(id))
        .await
        .map_err(|err| ApiError::from_ledger(err, ctx.request_id.clone()))?;
    Ok(Json(evidence))
}

#[derive(Debug, Deserialize)]
pub struct SupersedeRequest {
    pub successor: IngestionRequest,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct SupersedeResponse {
    pub superseded: Evidence,
    pub successor: Evidence,
}

pub async fn supersede_evidence(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<SupersedeRequest>,
) -> ApiResult<Json<SupersedeResponse>> {
    let ctx = actor_context(&headers)?;
    let (superseded, successor) = state
        .ledger
        .supersede(&ctx, &EvidenceId::new(id), &body.successor, &body.reason)
        .await
        .map_err(|err| ApiError::from_ledger(err, ctx.request_id.clone()))?;
    Ok(Json(SupersedeResponse {
        superseded,
        successor,
    }))
}

pub async fn evidence_audit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<AuditRecord>>> {
    let ctx = actor_context(&headers)?;
    let trail = state
        .ledger
        .audit_trail(&EvidenceId::new(id))
        .await
        .map_err(|err| ApiError::from_ledger(err, ctx.request_id.clone()))?;
    Ok(Json(trail))
}

pub async fn evidence_lineage(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<EvidenceId>>> {
    let ctx = actor_context(&headers)?;
    let lineage = state
        .ledger
        .evidence_lineage(&EvidenceId::new(id))
        .await
        .map_err(|err| ApiError::from_ledger(err, ctx.request_id.clone()))?;
    Ok(Json(lineage))
}

pub async fn evidence_decisions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<MappingDecision>>> {
    let ctx = actor_context(&headers)?;
    let decisions = state
        .ledger
        .decisions_for(&EvidenceId::new(id))
        .await
        .map_err(|err| ApiError::from_ledger(err, ctx.request_id.clone()))?;
    Ok(Json(decisions))
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub snapshot: EntitySnapshot,
    #[serde(default)]
    pub frameworks: Vec<Framework>,
    #[serde(default)]
    pub evidence_id: Option<EvidenceId>,
    #[serde(default)]
    pub existing_entities: Vec<EntitySnapshot>,
}

/// Evaluate an entity snapshot. The decision is recorded through the
/// ledger's audit API, and non-approved outcomes create their escalation
/// work record, idempotently per decision.
pub async fn evaluate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<EvaluateRequest>,
) -> ApiResult<Json<MappingDecision>> {
    let ctx = actor_context(&headers)?;

    let mut input = EvaluationInput::new(body.snapshot, body.frameworks);
    input.existing_entities = body.existing_entities;
    if let Some(evidence_id) = body.evidence_id {
        input.evidence_lineage = state
            .ledger
            .evidence_lineage(&evidence_id)
            .await
            .map_err(|err| ApiError::from_ledger(err, ctx.request_id.clone()))?;
        input.evidence_id = Some(evidence_id);
    }

    let decision = state.gate.evaluate(&input);
    state
        .ledger
        .record_decision(&ctx, decision.clone())
        .await
        .map_err(|err| ApiError::from_ledger(err, ctx.request_id.clone()))?;

    if decision.status != MappingStatus::Approved {
        let storage = state.ledger.storage();
        let routed = state
            .escalations
            .escalate(storage.as_ref(), &ctx.tenant_id, &decision)
            .await
            .map_err(|err| {
                ApiError::System {
                    code: ledger_types::ErrorCode::StorageFailure,
                    message: err.to_string(),
                    request_id: ctx.request_id.clone(),
                }
            })?;
        if let Some((escalation, created)) = routed {
            if created {
                state
                    .ledger
                    .record_escalation(&ctx, &escalation)
                    .await
                    .map_err(|err| ApiError::from_ledger(err, ctx.request_id.clone()))?;
            }
        }
    }

    Ok(Json(decision))
}

#[derive(Debug, Deserialize)]
pub struct ParityVerifyRequest {
    #[serde(flatten)]
    pub sample: ParitySample,
    /// When named, a failed run holds this record in quarantine so it
    /// cannot be sealed until the divergence is resolved.
    #[serde(default)]
    pub evidence_id: Option<EvidenceId>,
}

#[derive(Debug, Serialize)]
pub struct ParityVerifyResponse {
    #[serde(flatten)]
    pub report: ParityReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub held_evidence_id: Option<EvidenceId>,
}

/// Run the parity enforcer over one canonical sample.
pub async fn parity_verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ParityVerifyRequest>,
) -> ApiResult<Json<ParityVerifyResponse>> {
    let ctx = actor_context(&headers)?;
    let report = state.parity.verify(&body.sample).await;

    let mut held_evidence_id = None;
    if !report.parity {
        if let Some(evidence_id) = body.evidence_id {
            let violations = serde_json::to_value(&report.violations).map_err(|err| {
                ApiError::System {
                    code: ledger_types::ErrorCode::Internal,
                    message: err.to_string(),
                    request_id: ctx.request_id.clone(),
                }
            })?;
            state
                .ledger
                .hold_for_parity(&ctx, &evidence_id, violations)
                .await
                .map_err(|err| ApiError::from_ledger(err, ctx.request_id.clone()))?;
            held_evidence_id = Some(evidence_id);
        }
    }

    Ok(Json(ParityVerifyResponse {
        report,
        held_evidence_id,
    }))
}
