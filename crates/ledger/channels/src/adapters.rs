//! The six channel adapters.

use crate::adapter::{base_request, ChannelAdapter, ChannelError, ChannelInput, ShapedOutcome};
use crate::upstream::{bounded, ConnectorClient, PortalVerifier};
use async_trait::async_trait;
use ledger_types::{CaptureChannel, ErrorCode, EvidencePayload};
use std::sync::Arc;
use tracing::warn;

/// Minimum length of the manual-entry attestation notes.
pub const MIN_ENTRY_NOTES_LEN: usize = 20;

/// Interactive file upload. File-bearing: at least one attachment.
pub struct FileUploadAdapter;

#[async_trait]
impl ChannelAdapter for FileUploadAdapter {
    fn channel(&self) -> CaptureChannel {
        CaptureChannel::FileUpload
    }

    async fn shape(&self, input: &ChannelInput) -> Result<ShapedOutcome, ChannelError> {
        if input.attachments.is_empty() {
            return Err(ChannelError::validation(
                ErrorCode::MissingAttachment,
                "attachments",
                "file upload requires at least one attachment",
            ));
        }
        let request = base_request(self.channel(), input);
        Ok(ShapedOutcome::Ready(request))
    }
}

/// Scheduled batch export from an ERP system. File-bearing, and the export
/// must declare the snapshot moment it was taken at.
pub struct ErpExportAdapter;

#[async_trait]
impl ChannelAdapter for ErpExportAdapter {
    fn channel(&self) -> CaptureChannel {
        CaptureChannel::ErpExport
    }

    async fn shape(&self, input: &ChannelInput) -> Result<ShapedOutcome, ChannelError> {
        let snapshot_date = input.snapshot_date.ok_or_else(|| {
            ChannelError::validation(
                ErrorCode::MissingSnapshotDate,
                "snapshot_date",
                "scheduled exports must declare their snapshot timestamp",
            )
        })?;
        if input.attachments.is_empty() {
            return Err(ChannelError::validation(
                ErrorCode::MissingAttachment,
                "attachments",
                "batch export requires the exported file",
            ));
        }
        let mut request = base_request(self.channel(), input);
        request.channel_context.snapshot_date = Some(snapshot_date);
        Ok(ShapedOutcome::Ready(request))
    }
}

/// Live connector pull from an ERP API. When the caller did not carry a
/// payload, the adapter pulls the snapshot through the connector under a
/// bounded timeout.
pub struct ErpApiAdapter {
    connector: Option<Arc<dyn ConnectorClient>>,
}

impl ErpApiAdapter {
    pub fn new() -> Self {
        Self { connector: None }
    }

    pub fn with_connector(connector: Arc<dyn ConnectorClient>) -> Self {
        Self {
            connector: Some(connector),
        }
    }
}

impl Default for ErpApiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelAdapter for ErpApiAdapter {
    fn channel(&self) -> CaptureChannel {
        CaptureChannel::ErpApi
    }

    async fn shape(&self, input: &ChannelInput) -> Result<ShapedOutcome, ChannelError> {
        let snapshot_date = input.snapshot_date.ok_or_else(|| {
            ChannelError::validation(
                ErrorCode::MissingSnapshotDate,
                "snapshot_date",
                "connector pulls must declare their snapshot timestamp",
            )
        })?;

        let mut request = base_request(self.channel(), input);
        if request.payload.is_empty() {
            let Some(connector) = self.connector.as_ref() else {
                return Err(ChannelError::validation(
                    ErrorCode::MissingRequiredField,
                    "payload",
                    "no payload supplied and no connector configured",
                ));
            };
            let value = bounded(
                "connector pull",
                connector.pull_snapshot(&input.metadata.upstream_system),
            )
            .await?;
            request.payload = EvidencePayload::Structured { value };
        }
        request.channel_context.snapshot_date = Some(snapshot_date);
        Ok(ShapedOutcome::Ready(request))
    }
}

/// Partner-portal submission. The server-issued submission token must be
/// present and verified; without it the record is routed to quarantine, not
/// dropped, and channel identity is never inferred from client fields.
pub struct SupplierPortalAdapter {
    verifier: Option<Arc<dyn PortalVerifier>>,
}

impl SupplierPortalAdapter {
    pub fn new() -> Self {
        Self { verifier: None }
    }

    pub fn with_verifier(verifier: Arc<dyn PortalVerifier>) -> Self {
        Self {
            verifier: Some(verifier),
        }
    }
}

impl Default for SupplierPortalAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelAdapter for SupplierPortalAdapter {
    fn channel(&self) -> CaptureChannel {
        CaptureChannel::SupplierPortal
    }

    async fn shape(&self, input: &ChannelInput) -> Result<ShapedOutcome, ChannelError> {
        let mut request = base_request(self.channel(), input);

        let Some(submission_id) = input.portal_submission_id.as_deref() else {
            warn!("portal submission without server context, routing to quarantine");
            return Ok(ShapedOutcome::Quarantined {
                request,
                reason: ErrorCode::MissingPortalContext,
            });
        };

        if let Some(verifier) = self.verifier.as_ref() {
            let verified = bounded("portal verification", verifier.verify(submission_id)).await?;
            if !verified {
                return Err(ChannelError::validation(
                    ErrorCode::InvalidFieldValue,
                    "portal_submission_id",
                    "portal submission token failed verification",
                ));
            }
        }

        request.channel_context.portal_submission_id = Some(submission_id.to_string());
        Ok(ShapedOutcome::Ready(request))
    }
}

/// System-to-system push. Digest-only: the payload stays upstream, the push
/// carries a pre-computed reference used as the idempotency key. Attachments
/// are forbidden.
pub struct ApiPushAdapter;

#[async_trait]
impl ChannelAdapter for ApiPushAdapter {
    fn channel(&self) -> CaptureChannel {
        CaptureChannel::ApiPush
    }

    async fn shape(&self, input: &ChannelInput) -> Result<ShapedOutcome, ChannelError> {
        let reference = input.external_reference_id.as_deref().ok_or_else(|| {
            ChannelError::validation(
                ErrorCode::MissingExternalReference,
                "external_reference_id",
                "pushes must carry a pre-computed external reference id",
            )
        })?;
        if !input.attachments.is_empty() {
            return Err(ChannelError::validation(
                ErrorCode::AttachmentForbidden,
                "attachments",
                "digest-only pushes must not carry attachments",
            ));
        }
        if !matches!(input.payload, EvidencePayload::DigestReference { .. }) {
            return Err(ChannelError::validation(
                ErrorCode::InvalidFieldValue,
                "payload",
                "pushes carry a digest-only payload reference",
            ));
        }

        let mut request = base_request(self.channel(), input);
        request.channel_context.external_reference_id = Some(reference.to_string());
        request.idempotency_key = Some(reference.to_string());
        Ok(ShapedOutcome::Ready(request))
    }
}

/// Operator-typed manual entry, attested by free-text notes.
pub struct ManualAdapter;

#[async_trait]
impl ChannelAdapter for ManualAdapter {
    fn channel(&self) -> CaptureChannel {
        CaptureChannel::Manual
    }

    async fn shape(&self, input: &ChannelInput) -> Result<ShapedOutcome, ChannelError> {
        let notes = input.entry_notes.as_deref().unwrap_or("");
        if notes.chars().count() < MIN_ENTRY_NOTES_LEN {
            return Err(ChannelError::validation(
                ErrorCode::MissingEntryNotes,
                "entry_notes",
                "manual entries require attestation notes",
            ));
        }
        let mut request = base_request(self.channel(), input);
        request.channel_context.entry_notes = Some(notes.to_string());
        Ok(ShapedOutcome::Ready(request))
    }
}

/// All six adapters with no external collaborators wired, as the parity
/// enforcer exercises them.
pub fn all_adapters() -> Vec<Box<dyn ChannelAdapter>> {
    vec![
        Box::new(FileUploadAdapter),
        Box::new(ErpExportAdapter),
        Box::new(ErpApiAdapter::new()),
        Box::new(SupplierPortalAdapter::new()),
        Box::new(ApiPushAdapter),
        Box::new(ManualAdapter),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{StaticConnector, StaticPortalVerifier};
    use chrono::Utc;
    use ledger_types::{Attachment, DatasetType, DeclaredMetadata, DeclaredScope, RetentionPolicy};
    use std::collections::BTreeSet;

    fn metadata() -> DeclaredMetadata {
        DeclaredMetadata {
            upstream_system: "erp-central".to_string(),
            dataset_type: DatasetType::PartnerMaster,
            declared_scope: DeclaredScope::WholeOrganization,
            scope_target_id: None,
            primary_intent: "quarterly partner master refresh".to_string(),
            purpose_tags: BTreeSet::from(["reporting".to_string()]),
            contains_personal_data: false,
            legal_basis: None,
            retention_policy: RetentionPolicy::Standard,
        }
    }

    fn input() -> ChannelInput {
        ChannelInput {
            metadata: metadata(),
            payload: EvidencePayload::Structured {
                value: serde_json::json!({"partner": "ACME"}),
            },
            attachments: vec![],
            snapshot_date: None,
            portal_submission_id: None,
            external_reference_id: None,
            entry_notes: None,
            retention_end_override: None,
        }
    }

    fn attachment() -> Attachment {
        Attachment {
            file_name: "partners.csv".to_string(),
            content_type: "text/csv".to_string(),
            storage_ref: "blob://x/1".to_string(),
            size_bytes: 1024,
        }
    }

    #[tokio::test]
    async fn file_upload_rejects_zero_attachments() {
        let result = FileUploadAdapter.shape(&input()).await;
        match result {
            Err(ChannelError::Validation { code, .. }) => {
                assert_eq!(code, ErrorCode::MissingAttachment);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn erp_export_requires_snapshot_date() {
        let mut input = input();
        input.attachments = vec![attachment()];
        let result = ErpExportAdapter.shape(&input).await;
        assert!(matches!(
            result,
            Err(ChannelError::Validation {
                code: ErrorCode::MissingSnapshotDate,
                ..
            })
        ));

        input.snapshot_date = Some(Utc::now());
        let outcome = ErpExportAdapter.shape(&input).await.unwrap();
        assert!(outcome.request().channel_context.snapshot_date.is_some());
    }

    #[tokio::test]
    async fn erp_api_pulls_payload_through_connector_when_absent() {
        let connector = StaticConnector::default()
            .with_snapshot("erp-central", serde_json::json!({"partner": "ACME"}));
        let adapter = ErpApiAdapter::with_connector(Arc::new(connector));

        let mut input = input();
        input.snapshot_date = Some(Utc::now());
        input.payload = EvidencePayload::Structured {
            value: serde_json::Value::Null,
        };

        let outcome = adapter.shape(&input).await.unwrap();
        assert!(!outcome.request().payload.is_empty());
    }

    #[tokio::test]
    async fn erp_api_surfaces_upstream_failure_distinctly() {
        let adapter = ErpApiAdapter::with_connector(Arc::new(StaticConnector::default()));
        let mut input = input();
        input.snapshot_date = Some(Utc::now());
        input.payload = EvidencePayload::Structured {
            value: serde_json::Value::Null,
        };

        let result = adapter.shape(&input).await;
        match result {
            Err(ChannelError::Upstream { code, .. }) => {
                assert_eq!(code, ErrorCode::UpstreamUnavailable);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn portal_without_token_is_quarantined_not_dropped() {
        let outcome = SupplierPortalAdapter::new().shape(&input()).await.unwrap();
        match outcome {
            ShapedOutcome::Quarantined { reason, .. } => {
                assert_eq!(reason, ErrorCode::MissingPortalContext);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn portal_token_is_server_verified() {
        let verifier =
            StaticPortalVerifier::with_tokens(["tok-1".to_string()]);
        let adapter = SupplierPortalAdapter::with_verifier(Arc::new(verifier));

        let mut ok_input = input();
        ok_input.portal_submission_id = Some("tok-1".to_string());
        assert!(matches!(
            adapter.shape(&ok_input).await.unwrap(),
            ShapedOutcome::Ready(_)
        ));

        let mut bad_input = input();
        bad_input.portal_submission_id = Some("forged".to_string());
        assert!(matches!(
            adapter.shape(&bad_input).await,
            Err(ChannelError::Validation {
                code: ErrorCode::InvalidFieldValue,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn api_push_requires_reference_and_forbids_attachments() {
        let mut push_input = input();
        push_input.payload = EvidencePayload::DigestReference {
            external_digest: "abc".to_string(),
            locator: "s3://x".to_string(),
        };

        assert!(matches!(
            ApiPushAdapter.shape(&push_input).await,
            Err(ChannelError::Validation {
                code: ErrorCode::MissingExternalReference,
                ..
            })
        ));

        push_input.external_reference_id = Some("push-1".to_string());
        let outcome = ApiPushAdapter.shape(&push_input).await.unwrap();
        assert_eq!(
            outcome.request().idempotency_key.as_deref(),
            Some("push-1")
        );

        push_input.attachments = vec![attachment()];
        assert!(matches!(
            ApiPushAdapter.shape(&push_input).await,
            Err(ChannelError::Validation {
                code: ErrorCode::AttachmentForbidden,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn manual_entry_requires_attestation_notes() {
        assert!(matches!(
            ManualAdapter.shape(&input()).await,
            Err(ChannelError::Validation {
                code: ErrorCode::MissingEntryNotes,
                ..
            })
        ));

        let mut noted = input();
        noted.entry_notes = Some("entered from signed supplier declaration".to_string());
        assert!(matches!(
            ManualAdapter.shape(&noted).await.unwrap(),
            ShapedOutcome::Ready(_)
        ));
    }

    #[tokio::test]
    async fn manual_entry_notes_minimum_counts_characters_not_bytes() {
        // 19 characters but 21 bytes: a byte-length check would let this
        // through even though the attestation is under the minimum.
        let mut noted = input();
        noted.entry_notes = Some("übernommen aus Prüf".to_string());
        assert_eq!(noted.entry_notes.as_deref().map(str::len), Some(21));
        assert!(matches!(
            ManualAdapter.shape(&noted).await,
            Err(ChannelError::Validation {
                code: ErrorCode::MissingEntryNotes,
                ..
            })
        ));

        // 20 characters of multibyte text passes.
        noted.entry_notes = Some("übernommen aus Prüfb".to_string());
        assert!(matches!(
            ManualAdapter.shape(&noted).await.unwrap(),
            ShapedOutcome::Ready(_)
        ));
    }
}
