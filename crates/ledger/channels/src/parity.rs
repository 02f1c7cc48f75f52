//! Channel parity enforcement.
//!
//! Feeds one canonical sample through every adapter's shaping logic and
//! compares the resulting drafts field-for-field. Only carriage fields that
//! legitimately differ per channel (the channel label, its provenance
//! context, the idempotency key, and the payload carriage itself) are
//! excluded from comparison. Any other divergence, including a silent
//! rewrite of declared metadata relative to what the caller supplied, fails
//! parity.

use crate::adapter::{ChannelAdapter, ChannelInput};
use crate::adapters::all_adapters;
use chrono::{DateTime, Utc};
use ledger_types::{Attachment, CaptureChannel, DeclaredMetadata, EvidencePayload};
use serde_json::Value;
use tracing::error;

/// Fields of the shaped request that channels may legitimately differ on.
const CARRIAGE_FIELDS: &[&str] = &[
    "capture_channel",
    "channel_context",
    "idempotency_key",
    "payload",
    "attachments",
];

/// One canonical sample submission, replayed through all six channels.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ParitySample {
    pub metadata: DeclaredMetadata,
    pub payload_value: Value,
    pub snapshot_date: DateTime<Utc>,
}

/// A single point of divergence found by the enforcer.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ParityViolation {
    pub channel: CaptureChannel,
    pub field: String,
    pub detail: String,
}

/// Outcome of one parity run.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ParityReport {
    pub parity: bool,
    pub violations: Vec<ParityViolation>,
}

/// Replays one sample through every adapter and diffs the drafts.
pub struct ParityEnforcer {
    adapters: Vec<Box<dyn ChannelAdapter>>,
}

impl ParityEnforcer {
    pub fn new() -> Self {
        Self {
            adapters: all_adapters(),
        }
    }

    pub fn with_adapters(adapters: Vec<Box<dyn ChannelAdapter>>) -> Self {
        Self { adapters }
    }

    pub async fn verify(&self, sample: &ParitySample) -> ParityReport {
        let declared = match serde_json::to_value(&sample.metadata) {
            Ok(value) => value,
            Err(err) => {
                return ParityReport {
                    parity: false,
                    violations: vec![ParityViolation {
                        channel: CaptureChannel::Manual,
                        field: "metadata".to_string(),
                        detail: format!("sample metadata not serializable: {err}"),
                    }],
                }
            }
        };

        let mut violations = Vec::new();
        let mut baseline: Option<(CaptureChannel, Value)> = None;

        for adapter in &self.adapters {
            let channel = adapter.channel();
            let input = input_for(channel, sample);
            let shaped = match adapter.shape(&input).await {
                Ok(outcome) => outcome.request().clone(),
                Err(err) => {
                    violations.push(ParityViolation {
                        channel,
                        field: "shape".to_string(),
                        detail: format!("adapter refused the sample: {err}"),
                    });
                    continue;
                }
            };

            let normalized = match serde_json::to_value(&shaped) {
                Ok(Value::Object(mut map)) => {
                    for field in CARRIAGE_FIELDS {
                        map.remove(*field);
                    }
                    Value::Object(map)
                }
                Ok(other) => other,
                Err(err) => {
                    violations.push(ParityViolation {
                        channel,
                        field: "request".to_string(),
                        detail: format!("shaped request not serializable: {err}"),
                    });
                    continue;
                }
            };

            // No adapter may trim, cast, or default-fill declared fields.
            diff_fields(
                channel,
                "metadata",
                normalized.get("metadata").unwrap_or(&Value::Null),
                &declared,
                &mut violations,
            );

            match &baseline {
                None => baseline = Some((channel, normalized)),
                Some((first, expected)) => {
                    if *expected != normalized {
                        diff_fields(channel, "", &normalized, expected, &mut violations);
                        error!(
                            first = first.label(),
                            second = channel.label(),
                            "channel parity divergence"
                        );
                    }
                }
            }
        }

        ParityReport {
            parity: violations.is_empty(),
            violations,
        }
    }
}

impl Default for ParityEnforcer {
    fn default() -> Self {
        Self::new()
    }
}

fn diff_fields(
    channel: CaptureChannel,
    prefix: &str,
    actual: &Value,
    expected: &Value,
    violations: &mut Vec<ParityViolation>,
) {
    match (actual, expected) {
        (Value::Object(got), Value::Object(want)) => {
            let keys: std::collections::BTreeSet<&String> =
                got.keys().chain(want.keys()).collect();
            for key in keys {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                match (got.get(key), want.get(key)) {
                    (Some(a), Some(b)) if a == b => {}
                    (Some(a), Some(b)) => violations.push(ParityViolation {
                        channel,
                        field: path,
                        detail: format!("value diverged: {a} != {b}"),
                    }),
                    (Some(a), None) => violations.push(ParityViolation {
                        channel,
                        field: path,
                        detail: format!("field injected: {a}"),
                    }),
                    (None, Some(b)) => violations.push(ParityViolation {
                        channel,
                        field: path,
                        detail: format!("field dropped, expected {b}"),
                    }),
                    (None, None) => {}
                }
            }
        }
        (a, b) if a == b => {}
        (a, b) => violations.push(ParityViolation {
            channel,
            field: prefix.to_string(),
            detail: format!("value diverged: {a} != {b}"),
        }),
    }
}

/// Derives the behaviorally equivalent per-channel input for one sample:
/// same declared metadata and content, plus only the carriage each channel
/// requires to accept it.
fn input_for(channel: CaptureChannel, sample: &ParitySample) -> ChannelInput {
    let mut input = ChannelInput {
        metadata: sample.metadata.clone(),
        payload: EvidencePayload::Structured {
            value: sample.payload_value.clone(),
        },
        attachments: vec![],
        snapshot_date: None,
        portal_submission_id: None,
        external_reference_id: None,
        entry_notes: None,
        retention_end_override: None,
    };
    match channel {
        CaptureChannel::FileUpload => {
            input.attachments = vec![probe_attachment()];
        }
        CaptureChannel::ErpExport => {
            input.attachments = vec![probe_attachment()];
            input.snapshot_date = Some(sample.snapshot_date);
        }
        CaptureChannel::ErpApi => {
            input.snapshot_date = Some(sample.snapshot_date);
        }
        CaptureChannel::SupplierPortal => {
            input.portal_submission_id = Some("parity-probe".to_string());
        }
        CaptureChannel::ApiPush => {
            input.payload = EvidencePayload::DigestReference {
                external_digest: "parity-probe".to_string(),
                locator: "probe://parity".to_string(),
            };
            input.external_reference_id = Some("parity-probe".to_string());
        }
        CaptureChannel::Manual => {
            input.entry_notes = Some("parity probe attestation notes".to_string());
        }
    }
    input
}

fn probe_attachment() -> Attachment {
    Attachment {
        file_name: "parity-probe.csv".to_string(),
        content_type: "text/csv".to_string(),
        storage_ref: "probe://parity".to_string(),
        size_bytes: 0,
    }
}
