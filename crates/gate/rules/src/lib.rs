//! Versioned rule tables for the mapping gate.
//!
//! Everything the gate consults at evaluation time lives in one `RuleSet`
//! passed explicitly into the call: mandatory-field tables, per-framework
//! required fields, thresholds, the sanctions list, and the duplicate-match
//! weight table. No process-wide singletons. Changing any table or threshold
//! requires a new `rule_version` string; decisions made under an older
//! version are never recomputed.

#![deny(unsafe_code)]

use ledger_types::{EntityType, Framework};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Rule table problems found at load time.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule_version must be non-empty")]
    MissingVersion,

    #[error("threshold out of range: {0}")]
    ThresholdOutOfRange(String),

    #[error("duplicate weight table does not sum to 1.0 (got {0})")]
    WeightSum(f64),
}

/// Weighting of the three similarity measures and of the attributes they
/// compare, plus the strong key used to partition comparisons.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DuplicateWeights {
    /// Weight of exact attribute equality.
    pub exact: f64,
    /// Weight of edit-distance-normalized similarity.
    pub edit_distance: f64,
    /// Weight of token-overlap similarity.
    pub token_overlap: f64,
    /// Relative importance of each compared attribute.
    pub attributes: BTreeMap<String, f64>,
    /// Attribute that must match exactly before any comparison runs.
    pub strong_key: String,
}

impl DuplicateWeights {
    pub fn method_sum(&self) -> f64 {
        self.exact + self.edit_distance + self.token_overlap
    }
}

/// The full versioned rule configuration consulted by one gate evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub rule_version: String,

    /// Fields every entity must populate regardless of framework.
    pub global_mandatory: Vec<String>,

    /// Required fields per framework and entity type.
    pub framework_required: BTreeMap<Framework, BTreeMap<EntityType, Vec<String>>>,

    /// Overall completeness below this percentage downgrades to PROVISIONAL.
    pub completeness_threshold_pct: u8,

    /// Similarity at or above this attaches a duplicate flag.
    pub duplicate_flag_threshold: f64,

    /// Similarity at or above this marks a candidate near-certain.
    pub near_certain_threshold: f64,

    /// Lowercased legal names subject to a sanctions hard stop.
    pub sanctioned_names: BTreeSet<String>,

    pub duplicate_weights: DuplicateWeights,

    /// Fields where a literal zero means "not provided".
    pub zero_unpopulated_fields: BTreeSet<String>,
}

impl RuleSet {
    /// The canonical v1 tables.
    pub fn v1() -> Self {
        let mut framework_required = BTreeMap::new();

        framework_required.insert(
            Framework::Cbam,
            BTreeMap::from([
                (
                    EntityType::BusinessPartner,
                    strings(&["country", "eori_number", "installation_ids"]),
                ),
                (
                    EntityType::Product,
                    strings(&["cn_code", "production_route", "embedded_emissions"]),
                ),
                (EntityType::Site, strings(&["country", "installation_id"])),
            ]),
        );
        framework_required.insert(
            Framework::Csrd,
            BTreeMap::from([
                (
                    EntityType::BusinessPartner,
                    strings(&["sector_code", "employee_count", "revenue_band"]),
                ),
                (EntityType::Product, strings(&["sector_code"])),
                (EntityType::Site, strings(&["sector_code", "employee_count"])),
            ]),
        );
        framework_required.insert(
            Framework::Eudr,
            BTreeMap::from([
                (
                    EntityType::BusinessPartner,
                    strings(&["country", "commodity_codes"]),
                ),
                (
                    EntityType::Product,
                    strings(&["commodity_codes", "geolocation"]),
                ),
                (EntityType::Site, strings(&["geolocation"])),
            ]),
        );
        framework_required.insert(
            Framework::Lksg,
            BTreeMap::from([
                (
                    EntityType::BusinessPartner,
                    strings(&["country", "supplier_tier", "risk_country_exposure"]),
                ),
                (EntityType::Product, strings(&["supplier_tier"])),
                (EntityType::Site, strings(&["country", "risk_country_exposure"])),
            ]),
        );

        Self {
            rule_version: "gate-rules/v1".to_string(),
            global_mandatory: strings(&["legal_name", "country", "primary_contact"]),
            framework_required,
            completeness_threshold_pct: 85,
            duplicate_flag_threshold: 0.85,
            near_certain_threshold: 0.95,
            sanctioned_names: BTreeSet::new(),
            duplicate_weights: DuplicateWeights {
                exact: 0.5,
                edit_distance: 0.3,
                token_overlap: 0.2,
                attributes: BTreeMap::from([
                    ("legal_name".to_string(), 0.7),
                    ("city".to_string(), 0.15),
                    ("postal_code".to_string(), 0.15),
                ]),
                strong_key: "country".to_string(),
            },
            zero_unpopulated_fields: BTreeSet::from([
                "employee_count".to_string(),
                "annual_volume".to_string(),
            ]),
        }
    }

    /// Required-field set for one framework and entity type. Unknown
    /// combinations have no requirements.
    pub fn required_fields(&self, framework: Framework, entity_type: EntityType) -> &[String] {
        self.framework_required
            .get(&framework)
            .and_then(|by_type| by_type.get(&entity_type))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Sanctions check over the lowercased legal name.
    pub fn is_sanctioned(&self, legal_name: &str) -> bool {
        self.sanctioned_names
            .contains(legal_name.trim().to_lowercase().as_str())
    }

    pub fn with_sanctioned_name(mut self, name: &str) -> Self {
        self.sanctioned_names.insert(name.trim().to_lowercase());
        self
    }

    /// Whether a literal zero counts as populated for this field.
    pub fn zero_is_meaningful(&self, field: &str) -> bool {
        !self.zero_unpopulated_fields.contains(field)
    }

    /// Validate table consistency before use.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.rule_version.trim().is_empty() {
            return Err(RuleError::MissingVersion);
        }
        if self.completeness_threshold_pct > 100 {
            return Err(RuleError::ThresholdOutOfRange(format!(
                "completeness_threshold_pct = {}",
                self.completeness_threshold_pct
            )));
        }
        for (name, value) in [
            ("duplicate_flag_threshold", self.duplicate_flag_threshold),
            ("near_certain_threshold", self.near_certain_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RuleError::ThresholdOutOfRange(format!("{name} = {value}")));
            }
        }
        if self.near_certain_threshold < self.duplicate_flag_threshold {
            return Err(RuleError::ThresholdOutOfRange(
                "near_certain_threshold below duplicate_flag_threshold".to_string(),
            ));
        }
        let sum = self.duplicate_weights.method_sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(RuleError::WeightSum(sum));
        }
        Ok(())
    }
}

fn strings(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}
