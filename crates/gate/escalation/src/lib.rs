//! Escalation routing for non-approved gate outcomes.
//!
//! A fixed reason-code table maps the primary reason of a BLOCKED or
//! PROVISIONAL decision to a resolver role, a priority, and an SLA in
//! hours; the due date is the decision time plus the SLA. Exactly one
//! work record exists per decision, no matter how often the same decision
//! is escalated.

#![deny(unsafe_code)]

use chrono::Duration;
use ledger_storage::{EscalationRecord, EscalationStore, StorageError};
use ledger_types::{MappingDecision, MappingStatus, TenantId};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EscalationError {
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

/// Resolver priority, ordered most urgent first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Priority {
    Critical,
    High,
    Medium,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "CRITICAL",
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
        }
    }
}

/// One row of the routing table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Route {
    pub resolver_role: &'static str,
    pub priority: Priority,
    pub sla_hours: u32,
}

/// Reason code assigned to PROVISIONAL outcomes caused by framework gaps.
pub const REASON_FRAMEWORK_GAP: &str = "FRAMEWORK_GAP";
/// Reason code assigned to PROVISIONAL outcomes caused by low completeness.
pub const REASON_LOW_COMPLETENESS: &str = "LOW_COMPLETENESS";

/// Deterministically routes decisions to resolver work records.
pub struct EscalationRouter {
    routes: BTreeMap<&'static str, Route>,
    fallback: Route,
}

impl EscalationRouter {
    /// The fixed v1 routing table.
    pub fn new() -> Self {
        let routes = BTreeMap::from([
            (
                "SANCTIONS_MATCH",
                Route {
                    resolver_role: "compliance-officer",
                    priority: Priority::Critical,
                    sla_hours: 24,
                },
            ),
            (
                "ENTITY_BLOCKED",
                Route {
                    resolver_role: "compliance-officer",
                    priority: Priority::High,
                    sla_hours: 48,
                },
            ),
            (
                "LEGAL_ENTITY_INVALID",
                Route {
                    resolver_role: "master-data-steward",
                    priority: Priority::High,
                    sla_hours: 48,
                },
            ),
            (
                "MISSING_MANDATORY_FIELD",
                Route {
                    resolver_role: "master-data-steward",
                    priority: Priority::High,
                    sla_hours: 72,
                },
            ),
            (
                REASON_FRAMEWORK_GAP,
                Route {
                    resolver_role: "sustainability-analyst",
                    priority: Priority::Medium,
                    sla_hours: 120,
                },
            ),
            (
                REASON_LOW_COMPLETENESS,
                Route {
                    resolver_role: "master-data-steward",
                    priority: Priority::Medium,
                    sla_hours: 120,
                },
            ),
        ]);
        Self {
            routes,
            fallback: Route {
                resolver_role: "operations-reviewer",
                priority: Priority::Medium,
                sla_hours: 120,
            },
        }
    }

    pub fn route_for(&self, reason_code: &str) -> Route {
        self.routes.get(reason_code).copied().unwrap_or(self.fallback)
    }

    /// Primary reason of a decision: the first blocking reason, or the kind
    /// of downgrade for PROVISIONAL outcomes. APPROVED has none.
    pub fn primary_reason(decision: &MappingDecision) -> Option<String> {
        match decision.status {
            MappingStatus::Approved => None,
            MappingStatus::Blocked => Some(
                decision
                    .blocking_reasons
                    .first()
                    .map(|r| r.code.clone())
                    .unwrap_or_else(|| "MISSING_MANDATORY_FIELD".to_string()),
            ),
            MappingStatus::Provisional => {
                if decision.framework_readiness.iter().any(|r| !r.ready) {
                    Some(REASON_FRAMEWORK_GAP.to_string())
                } else {
                    Some(REASON_LOW_COMPLETENESS.to_string())
                }
            }
        }
    }

    /// Create the follow-up work record for a decision, once. Returns
    /// `None` for APPROVED decisions; otherwise the stored record and
    /// whether this call created it.
    pub async fn escalate<S>(
        &self,
        storage: &S,
        tenant_id: &TenantId,
        decision: &MappingDecision,
    ) -> Result<Option<(EscalationRecord, bool)>, EscalationError>
    where
        S: EscalationStore + ?Sized,
    {
        let Some(reason_code) = Self::primary_reason(decision) else {
            return Ok(None);
        };
        let route = self.route_for(&reason_code);

        let record = EscalationRecord {
            escalation_id: format!("esc-{}", Uuid::new_v4()),
            tenant_id: tenant_id.clone(),
            decision_id: decision.mapping_decision_id.clone(),
            reason_code,
            resolver_role: route.resolver_role.to_string(),
            priority: route.priority.as_str().to_string(),
            sla_hours: route.sla_hours,
            due_at: decision.evaluated_at + Duration::hours(i64::from(route.sla_hours)),
            created_at: decision.evaluated_at,
        };

        let (stored, created) = storage.create_escalation(record).await?;
        if created {
            info!(
                decision_id = %stored.decision_id,
                reason = %stored.reason_code,
                role = %stored.resolver_role,
                "escalation created"
            );
        }
        Ok(Some((stored, created)))
    }
}

impl Default for EscalationRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ledger_storage::memory::InMemoryLedgerStorage;
    use ledger_types::{
        BlockingReason, EntityType, FrameworkReadiness, Framework, MappingDecisionId,
    };

    fn blocked_decision() -> MappingDecision {
        MappingDecision {
            mapping_decision_id: MappingDecisionId::generate(),
            evidence_id: None,
            entity_id: "partner-1".to_string(),
            entity_type: EntityType::BusinessPartner,
            status: MappingStatus::Blocked,
            completeness_score: 0,
            missing_fields: vec![],
            blocking_reasons: vec![BlockingReason {
                code: "SANCTIONS_MATCH".to_string(),
                message: "matched the sanctions list".to_string(),
            }],
            framework_readiness: vec![],
            duplicate_candidates: vec![],
            required_next_actions: vec![],
            evidence_lineage: vec![],
            rule_version: "gate-rules/v1".to_string(),
            evaluated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn sanctions_block_routes_to_compliance_with_24h_sla() {
        let storage = InMemoryLedgerStorage::new();
        let router = EscalationRouter::new();
        let decision = blocked_decision();

        let (record, created) = router
            .escalate(&storage, &TenantId::new("t-1"), &decision)
            .await
            .unwrap()
            .unwrap();
        assert!(created);
        assert_eq!(record.resolver_role, "compliance-officer");
        assert_eq!(record.priority, "CRITICAL");
        assert_eq!(record.due_at, decision.evaluated_at + Duration::hours(24));
    }

    #[tokio::test]
    async fn repeated_escalation_does_not_duplicate() {
        let storage = InMemoryLedgerStorage::new();
        let router = EscalationRouter::new();
        let tenant = TenantId::new("t-1");
        let decision = blocked_decision();

        let (first, created_first) = router
            .escalate(&storage, &tenant, &decision)
            .await
            .unwrap()
            .unwrap();
        let (second, created_second) = router
            .escalate(&storage, &tenant, &decision)
            .await
            .unwrap()
            .unwrap();

        assert!(created_first);
        assert!(!created_second);
        assert_eq!(first.escalation_id, second.escalation_id);
    }

    #[tokio::test]
    async fn approved_decisions_are_not_escalated() {
        let storage = InMemoryLedgerStorage::new();
        let mut decision = blocked_decision();
        decision.status = MappingStatus::Approved;
        decision.blocking_reasons.clear();

        let outcome = EscalationRouter::new()
            .escalate(&storage, &TenantId::new("t-1"), &decision)
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn provisional_framework_gap_routes_to_analyst() {
        let storage = InMemoryLedgerStorage::new();
        let mut decision = blocked_decision();
        decision.status = MappingStatus::Provisional;
        decision.blocking_reasons.clear();
        decision.completeness_score = 92;
        decision.framework_readiness = vec![FrameworkReadiness {
            framework: Framework::Cbam,
            ready: false,
            completeness_pct: 67,
            missing_fields: vec!["eori_number".to_string()],
        }];

        let (record, _) = EscalationRouter::new()
            .escalate(&storage, &TenantId::new("t-1"), &decision)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.reason_code, REASON_FRAMEWORK_GAP);
        assert_eq!(record.resolver_role, "sustainability-analyst");
    }

    #[test]
    fn unknown_reason_falls_back_deterministically() {
        let router = EscalationRouter::new();
        let route = router.route_for("SOMETHING_NEW");
        assert_eq!(route.resolver_role, "operations-reviewer");
    }
}
