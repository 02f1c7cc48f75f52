use crate::ids::{EvidenceId, MappingDecisionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Kind of real-world entity the mapping gate admits or holds back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    BusinessPartner,
    Product,
    Site,
}

/// Regulatory framework an entity can be evaluated against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Framework {
    Cbam,
    Csrd,
    Eudr,
    Lksg,
}

impl Framework {
    pub fn label(&self) -> &'static str {
        match self {
            Framework::Cbam => "CBAM",
            Framework::Csrd => "CSRD",
            Framework::Eudr => "EUDR",
            Framework::Lksg => "LKSG",
        }
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Candidate entity as seen at evaluation time. Attributes are a typed map
/// with an explicit schema version so completeness scoring stays
/// well-defined.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub entity_id: String,
    pub entity_type: EntityType,
    pub schema_version: String,
    /// Ordered so serialization, and therefore decision hashing, is stable.
    pub attributes: BTreeMap<String, Value>,
    /// Whether the entity is already held in a blocked state upstream.
    #[serde(default)]
    pub currently_blocked: bool,
}

impl EntitySnapshot {
    /// A populated value excludes null, empty string, and empty collections.
    /// Zero counts as unpopulated only when the field does not treat zero as
    /// meaningful; that judgment belongs to the rule tables, so the raw check
    /// here treats numbers as populated.
    pub fn is_populated(&self, field: &str) -> bool {
        match self.attributes.get(field) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
            Some(_) => true,
        }
    }
}

/// Gate outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MappingStatus {
    Approved,
    Provisional,
    Blocked,
}

impl MappingStatus {
    pub fn allows_downstream_use(&self) -> bool {
        matches!(self, MappingStatus::Approved)
    }
}

/// Severity of a missing field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldSeverity {
    Blocking,
    Required,
    Recommended,
}

/// A field the entity is missing, with where the requirement came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingField {
    pub field: String,
    /// "global" or a framework label.
    pub scope: String,
    pub severity: FieldSeverity,
}

/// Machine-readable reason an entity is blocked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingReason {
    pub code: String,
    pub message: String,
}

/// Per-framework readiness summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameworkReadiness {
    pub framework: Framework,
    pub ready: bool,
    pub completeness_pct: u8,
    pub missing_fields: Vec<String>,
}

/// Possible duplicate of the candidate entity. Non-blocking unless the
/// caller opts into treating near-certain matches as hard stops.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCandidate {
    pub entity_id: String,
    pub similarity: f64,
    pub near_certain: bool,
}

/// Deterministic follow-up derived from the rules that fired.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextAction {
    pub code: String,
    pub description: String,
}

/// Outcome of one mapping-gate evaluation. Immutable; re-evaluation creates
/// a new decision.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MappingDecision {
    pub mapping_decision_id: MappingDecisionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_id: Option<EvidenceId>,
    pub entity_id: String,
    pub entity_type: EntityType,
    pub status: MappingStatus,
    pub completeness_score: u8,
    pub missing_fields: Vec<MissingField>,
    pub blocking_reasons: Vec<BlockingReason>,
    pub framework_readiness: Vec<FrameworkReadiness>,
    pub duplicate_candidates: Vec<DuplicateCandidate>,
    pub required_next_actions: Vec<NextAction>,
    pub evidence_lineage: Vec<EvidenceId>,
    pub rule_version: String,
    pub evaluated_at: DateTime<Utc>,
}
