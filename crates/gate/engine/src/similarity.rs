//! Fuzzy-match scoring for duplicate detection.
//!
//! Candidates are compared attribute-by-attribute with a weighted blend of
//! exact equality, edit-distance-normalized similarity, and token overlap.
//! All inputs are lowercased and whitespace-normalized first so the score
//! depends only on content.

use gate_rules::DuplicateWeights;
use ledger_types::EntitySnapshot;
use serde_json::Value;

/// Weighted similarity of two snapshots under one weight table, in [0, 1].
pub fn weighted_similarity(
    weights: &DuplicateWeights,
    candidate: &EntitySnapshot,
    existing: &EntitySnapshot,
) -> f64 {
    let mut total_weight = 0.0;
    let mut total = 0.0;

    for (attribute, weight) in &weights.attributes {
        let (Some(a), Some(b)) = (
            text_of(candidate.attributes.get(attribute)),
            text_of(existing.attributes.get(attribute)),
        ) else {
            continue;
        };

        let exact = if a == b { 1.0 } else { 0.0 };
        let edit = edit_similarity(&a, &b);
        let tokens = token_overlap(&a, &b);

        let blended = weights.exact * exact
            + weights.edit_distance * edit
            + weights.token_overlap * tokens;
        total += weight * blended;
        total_weight += weight;
    }

    if total_weight == 0.0 {
        0.0
    } else {
        total / total_weight
    }
}

/// Exact match of the partition key; comparisons never cross partitions.
pub fn shares_strong_key(key: &str, a: &EntitySnapshot, b: &EntitySnapshot) -> bool {
    match (text_of(a.attributes.get(key)), text_of(b.attributes.get(key))) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn text_of(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        None
    } else {
        Some(normalized.to_lowercase())
    }
}

/// 1 - levenshtein(a, b) / max_len, over characters.
fn edit_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / max_len as f64
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Jaccard overlap of whitespace-delimited tokens.
fn token_overlap(a: &str, b: &str) -> f64 {
    let ta: std::collections::BTreeSet<&str> = a.split_whitespace().collect();
    let tb: std::collections::BTreeSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_rules::RuleSet;
    use ledger_types::EntityType;
    use std::collections::BTreeMap;

    fn snapshot(legal_name: &str, city: &str) -> EntitySnapshot {
        EntitySnapshot {
            entity_id: "e-1".to_string(),
            entity_type: EntityType::BusinessPartner,
            schema_version: "v1".to_string(),
            attributes: BTreeMap::from([
                ("legal_name".to_string(), serde_json::json!(legal_name)),
                ("city".to_string(), serde_json::json!(city)),
                ("country".to_string(), serde_json::json!("DE")),
            ]),
            currently_blocked: false,
        }
    }

    #[test]
    fn identical_snapshots_score_one() {
        let weights = RuleSet::v1().duplicate_weights;
        let a = snapshot("Acme Steel GmbH", "Essen");
        let score = weighted_similarity(&weights, &a, &a);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn name_typo_lowers_the_score_without_zeroing_it() {
        let weights = RuleSet::v1().duplicate_weights;
        let a = snapshot("Acme Steel GmbH", "Essen");
        let b = snapshot("Acme Stele GmbH", "Essen");
        let score = weighted_similarity(&weights, &a, &b);
        assert!(score > 0.3 && score < 1.0, "score = {score}");
    }

    #[test]
    fn unrelated_names_score_low() {
        let weights = RuleSet::v1().duplicate_weights;
        let a = snapshot("Acme Steel GmbH", "Essen");
        let b = snapshot("Zeta Logistics AB", "Lund");
        assert!(weighted_similarity(&weights, &a, &b) < 0.5);
    }

    #[test]
    fn comparison_is_case_and_spacing_insensitive() {
        let weights = RuleSet::v1().duplicate_weights;
        let a = snapshot("ACME  Steel GmbH", "essen");
        let b = snapshot("acme steel gmbh", "Essen");
        let score = weighted_similarity(&weights, &a, &b);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn strong_key_mismatch_is_detected() {
        let a = snapshot("Acme Steel GmbH", "Essen");
        let mut b = snapshot("Acme Steel GmbH", "Essen");
        b.attributes
            .insert("country".to_string(), serde_json::json!("FR"));
        assert!(!shares_strong_key("country", &a, &b));
        assert!(shares_strong_key("country", &a, &a));
    }
}
