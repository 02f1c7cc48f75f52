//! Declared-field validation for canonical ingestion requests.
//!
//! Violations are reported for the first failing category only, with one
//! field error per offending field in that category. A failing request never
//! partially creates a record.

use crate::error::LedgerError;
use ledger_types::{DeclaredMetadata, ErrorCode, FieldError, IngestionRequest};

/// Minimum length of the free-text `primary_intent` declaration.
pub const MIN_INTENT_LEN: usize = 10;

/// Validation categories, checked in order.
enum Category {
    Required,
    Conditional,
    Retention,
}

const CATEGORY_ORDER: [Category; 3] = [
    Category::Required,
    Category::Conditional,
    Category::Retention,
];

/// Validate the common declared field set every channel must satisfy.
pub fn validate_request(request: &IngestionRequest) -> Result<(), LedgerError> {
    validate_metadata(&request.metadata)
}

/// Validate a declared-metadata object, for creation and for merged updates.
pub fn validate_metadata(metadata: &DeclaredMetadata) -> Result<(), LedgerError> {
    for category in CATEGORY_ORDER {
        let (code, errors) = match category {
            Category::Required => check_required(metadata),
            Category::Conditional => check_conditional(metadata),
            Category::Retention => check_retention(metadata),
        };
        if !errors.is_empty() {
            return Err(LedgerError::validation(code, errors));
        }
    }
    Ok(())
}

fn check_required(metadata: &DeclaredMetadata) -> (ErrorCode, Vec<FieldError>) {
    let mut errors = vec![];

    if metadata.upstream_system.trim().is_empty() {
        errors.push(FieldError::new(
            "upstream_system",
            "declared origin system is required",
        ));
    }
    if metadata.primary_intent.trim().len() < MIN_INTENT_LEN {
        errors.push(FieldError::new(
            "primary_intent",
            format!("primary intent must be at least {MIN_INTENT_LEN} characters"),
        ));
    }
    if metadata.purpose_tags.is_empty() {
        errors.push(FieldError::new(
            "purpose_tags",
            "at least one declared purpose is required",
        ));
    }

    let code = if metadata.purpose_tags.is_empty() {
        ErrorCode::EmptyPurposeTags
    } else if metadata.primary_intent.trim().len() < MIN_INTENT_LEN {
        ErrorCode::IntentTooShort
    } else {
        ErrorCode::MissingRequiredField
    };
    (code, errors)
}

fn check_conditional(metadata: &DeclaredMetadata) -> (ErrorCode, Vec<FieldError>) {
    let mut errors = vec![];
    let mut code = ErrorCode::MissingRequiredField;

    if metadata.declared_scope.requires_target()
        && metadata
            .scope_target_id
            .as_deref()
            .map_or(true, |t| t.trim().is_empty())
    {
        code = ErrorCode::MissingScopeTarget;
        errors.push(FieldError::new(
            "scope_target_id",
            "a scope narrower than the whole organization must name its target",
        ));
    }

    if metadata.contains_personal_data
        && metadata
            .legal_basis
            .as_deref()
            .map_or(true, |b| b.trim().is_empty())
    {
        code = ErrorCode::MissingLegalBasis;
        errors.push(FieldError::new(
            "legal_basis",
            "personal data requires a declared legal basis",
        ));
    }

    (code, errors)
}

fn check_retention(metadata: &DeclaredMetadata) -> (ErrorCode, Vec<FieldError>) {
    let mut errors = vec![];
    if !metadata.retention_policy.is_valid() {
        errors.push(FieldError::new(
            "retention_policy",
            "custom retention must be between 1 and 3650 days",
        ));
    }
    (ErrorCode::InvalidRetentionPolicy, errors)
}
