//! Mapping gate: admission control for entity snapshots.
//!
//! Evaluation is a pure function of (entity snapshot, evidence lineage,
//! requested frameworks, rule set). The checks run in strict order and
//! short-circuit at the first terminal outcome:
//!
//! 1. hard stops (sanctions, existing block, failed legal-entity check)
//! 2. global mandatory fields
//! 3. per-framework required fields
//! 4. overall completeness
//!
//! A hard stop yields BLOCKED with a completeness score of zero and no
//! further gating checks. Missing global fields lock the status to BLOCKED
//! but framework gaps are still computed for their informational value.
//! Framework gaps and low completeness only ever downgrade APPROVED to
//! PROVISIONAL. Duplicate detection is independent of gating and attaches
//! non-blocking flags to the decision.

#![deny(unsafe_code)]

mod similarity;

use chrono::{DateTime, Utc};
use gate_rules::{RuleError, RuleSet};
use ledger_types::{
    BlockingReason, DuplicateCandidate, EntitySnapshot, EvidenceId, Framework,
    FrameworkReadiness, MappingDecision, MappingDecisionId, MappingStatus, MissingField,
    NextAction, FieldSeverity,
};
use serde_json::Value;
use tracing::debug;

/// Everything one evaluation looks at. The gate itself holds no state
/// beyond its validated rule set.
#[derive(Clone, Debug)]
pub struct EvaluationInput {
    pub snapshot: EntitySnapshot,
    pub frameworks: Vec<Framework>,
    /// Evidence record that triggered the evaluation, when there is one.
    pub evidence_id: Option<EvidenceId>,
    /// Sealed evidence backing the snapshot, oldest first.
    pub evidence_lineage: Vec<EvidenceId>,
    /// Existing entities to fuzzy-match against; read-only.
    pub existing_entities: Vec<EntitySnapshot>,
}

impl EvaluationInput {
    pub fn new(snapshot: EntitySnapshot, frameworks: Vec<Framework>) -> Self {
        Self {
            snapshot,
            frameworks,
            evidence_id: None,
            evidence_lineage: Vec::new(),
            existing_entities: Vec::new(),
        }
    }
}

/// The admission-control engine. Safe to share and to run with unbounded
/// parallelism across entities.
pub struct MappingGate {
    rules: RuleSet,
}

impl MappingGate {
    /// Build a gate over a validated rule set.
    pub fn new(rules: RuleSet) -> Result<Self, RuleError> {
        rules.validate()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn rule_version(&self) -> &str {
        &self.rules.rule_version
    }

    /// Evaluate one snapshot, stamping a fresh decision id and the current
    /// time. Re-evaluation always produces a new decision.
    pub fn evaluate(&self, input: &EvaluationInput) -> MappingDecision {
        self.evaluate_with(input, MappingDecisionId::generate(), Utc::now())
    }

    /// Deterministic core: identical input, id, and timestamp yield a
    /// byte-identical decision.
    pub fn evaluate_with(
        &self,
        input: &EvaluationInput,
        decision_id: MappingDecisionId,
        evaluated_at: DateTime<Utc>,
    ) -> MappingDecision {
        let snapshot = &input.snapshot;
        let duplicate_candidates =
            self.detect_duplicates(snapshot, &input.existing_entities);

        if let Some(reason) = self.hard_stop(snapshot) {
            debug!(
                entity_id = %snapshot.entity_id,
                code = %reason.code,
                "hard stop, evaluation ends"
            );
            let required_next_actions = vec![hard_stop_action(&reason)];
            return MappingDecision {
                mapping_decision_id: decision_id,
                evidence_id: input.evidence_id.clone(),
                entity_id: snapshot.entity_id.clone(),
                entity_type: snapshot.entity_type,
                status: MappingStatus::Blocked,
                completeness_score: 0,
                missing_fields: Vec::new(),
                blocking_reasons: vec![reason],
                framework_readiness: Vec::new(),
                duplicate_candidates,
                required_next_actions,
                evidence_lineage: input.evidence_lineage.clone(),
                rule_version: self.rules.rule_version.clone(),
                evaluated_at,
            };
        }

        let mut status = MappingStatus::Approved;
        let mut missing_fields = Vec::new();
        let mut blocking_reasons = Vec::new();
        let mut actions = Vec::new();

        // Global mandatory fields lock the status to BLOCKED but framework
        // gaps are still computed below for their informational value.
        for field in &self.rules.global_mandatory {
            if !self.populated(snapshot, field) {
                status = MappingStatus::Blocked;
                missing_fields.push(MissingField {
                    field: field.clone(),
                    scope: "global".to_string(),
                    severity: FieldSeverity::Blocking,
                });
                blocking_reasons.push(BlockingReason {
                    code: "MISSING_MANDATORY_FIELD".to_string(),
                    message: format!("mandatory field {field} is missing"),
                });
            }
        }
        if status == MappingStatus::Blocked {
            actions.push(NextAction {
                code: "PROVIDE_MANDATORY_FIELDS".to_string(),
                description: "populate the missing global mandatory fields".to_string(),
            });
        }

        let mut frameworks = input.frameworks.clone();
        frameworks.sort();
        frameworks.dedup();

        let mut framework_readiness = Vec::with_capacity(frameworks.len());
        for framework in frameworks {
            let required = self.rules.required_fields(framework, snapshot.entity_type);
            let missing: Vec<String> = required
                .iter()
                .filter(|field| !self.populated(snapshot, field))
                .cloned()
                .collect();
            let completeness_pct = if required.is_empty() {
                100
            } else {
                percentage(required.len() - missing.len(), required.len())
            };

            if !missing.is_empty() {
                // Framework gaps downgrade, never block.
                if status == MappingStatus::Approved {
                    status = MappingStatus::Provisional;
                }
                for field in &missing {
                    missing_fields.push(MissingField {
                        field: field.clone(),
                        scope: framework.label().to_string(),
                        severity: FieldSeverity::Required,
                    });
                }
                actions.push(NextAction {
                    code: format!("PROVIDE_{}_FIELDS", framework.label()),
                    description: format!(
                        "populate the fields {} required for {}",
                        missing.join(", "),
                        framework.label()
                    ),
                });
            }

            framework_readiness.push(FrameworkReadiness {
                framework,
                ready: missing.is_empty(),
                completeness_pct,
                missing_fields: missing,
            });
        }

        let completeness_score = self.overall_completeness(snapshot);
        if completeness_score < self.rules.completeness_threshold_pct
            && status == MappingStatus::Approved
        {
            status = MappingStatus::Provisional;
            actions.push(NextAction {
                code: "IMPROVE_COMPLETENESS".to_string(),
                description: format!(
                    "raise overall completeness above {}%",
                    self.rules.completeness_threshold_pct
                ),
            });
        }

        debug!(
            entity_id = %snapshot.entity_id,
            status = ?status,
            completeness_score,
            "gate evaluation complete"
        );

        MappingDecision {
            mapping_decision_id: decision_id,
            evidence_id: input.evidence_id.clone(),
            entity_id: snapshot.entity_id.clone(),
            entity_type: snapshot.entity_type,
            status,
            completeness_score,
            missing_fields,
            blocking_reasons,
            framework_readiness,
            duplicate_candidates,
            required_next_actions: actions,
            evidence_lineage: input.evidence_lineage.clone(),
            rule_version: self.rules.rule_version.clone(),
            evaluated_at,
        }
    }

    /// Fuzzy-match the candidate against existing entities sharing the
    /// strong key. Read-only; results are ordered by descending similarity
    /// with the entity id as tie-break.
    pub fn detect_duplicates(
        &self,
        candidate: &EntitySnapshot,
        existing: &[EntitySnapshot],
    ) -> Vec<DuplicateCandidate> {
        let weights = &self.rules.duplicate_weights;
        let mut candidates: Vec<DuplicateCandidate> = existing
            .iter()
            .filter(|other| other.entity_id != candidate.entity_id)
            .filter(|other| {
                similarity::shares_strong_key(&weights.strong_key, candidate, other)
            })
            .filter_map(|other| {
                let score = similarity::weighted_similarity(weights, candidate, other);
                if score >= self.rules.duplicate_flag_threshold {
                    Some(DuplicateCandidate {
                        entity_id: other.entity_id.clone(),
                        similarity: score,
                        near_certain: score >= self.rules.near_certain_threshold,
                    })
                } else {
                    None
                }
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });
        candidates
    }

    fn hard_stop(&self, snapshot: &EntitySnapshot) -> Option<BlockingReason> {
        if let Some(Value::String(name)) = snapshot.attributes.get("legal_name") {
            if self.rules.is_sanctioned(name) {
                return Some(BlockingReason {
                    code: "SANCTIONS_MATCH".to_string(),
                    message: format!("legal name {name:?} matches the sanctions list"),
                });
            }
        }
        if snapshot.currently_blocked {
            return Some(BlockingReason {
                code: "ENTITY_BLOCKED".to_string(),
                message: "entity is already held in a blocked state".to_string(),
            });
        }
        if snapshot.attributes.get("legal_entity_valid") == Some(&Value::Bool(false)) {
            return Some(BlockingReason {
                code: "LEGAL_ENTITY_INVALID".to_string(),
                message: "legal-entity validation failed upstream".to_string(),
            });
        }
        None
    }

    /// Populated check with the rule table's zero handling applied.
    fn populated(&self, snapshot: &EntitySnapshot, field: &str) -> bool {
        if !snapshot.is_populated(field) {
            return false;
        }
        if self.rules.zero_is_meaningful(field) {
            return true;
        }
        match snapshot.attributes.get(field) {
            Some(Value::Number(n)) => n.as_f64() != Some(0.0),
            _ => true,
        }
    }

    fn overall_completeness(&self, snapshot: &EntitySnapshot) -> u8 {
        let total = snapshot.attributes.len();
        if total == 0 {
            return 0;
        }
        let populated = snapshot
            .attributes
            .keys()
            .filter(|field| self.populated(snapshot, field))
            .count();
        percentage(populated, total)
    }
}

fn percentage(part: usize, whole: usize) -> u8 {
    ((part as f64 / whole as f64) * 100.0).round() as u8
}

fn hard_stop_action(reason: &BlockingReason) -> NextAction {
    match reason.code.as_str() {
        "SANCTIONS_MATCH" => NextAction {
            code: "ESCALATE_SANCTIONS_REVIEW".to_string(),
            description: "route to compliance for out-of-band sanctions clearance"
                .to_string(),
        },
        "ENTITY_BLOCKED" => NextAction {
            code: "RESOLVE_ENTITY_BLOCK".to_string(),
            description: "clear the existing block before re-evaluating".to_string(),
        },
        _ => NextAction {
            code: "FIX_LEGAL_ENTITY_DATA".to_string(),
            description: "correct the legal-entity registration data".to_string(),
        },
    }
}
