use crate::ids::{ActorId, EvidenceId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Ingestion channel through which an evidence record entered the system.
///
/// The channel is assigned by the adapter that shaped the request, never
/// taken from client-supplied fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaptureChannel {
    FileUpload,
    ErpExport,
    ErpApi,
    SupplierPortal,
    ApiPush,
    Manual,
}

impl CaptureChannel {
    pub const ALL: [CaptureChannel; 6] = [
        CaptureChannel::FileUpload,
        CaptureChannel::ErpExport,
        CaptureChannel::ErpApi,
        CaptureChannel::SupplierPortal,
        CaptureChannel::ApiPush,
        CaptureChannel::Manual,
    ];

    /// Channels that carry file content and must have at least one attachment.
    pub fn requires_attachments(&self) -> bool {
        matches!(self, CaptureChannel::FileUpload | CaptureChannel::ErpExport)
    }

    /// Channels that declare a snapshot moment for the exported data.
    pub fn requires_snapshot_date(&self) -> bool {
        matches!(self, CaptureChannel::ErpExport | CaptureChannel::ErpApi)
    }

    pub fn label(&self) -> &'static str {
        match self {
            CaptureChannel::FileUpload => "FILE_UPLOAD",
            CaptureChannel::ErpExport => "ERP_EXPORT",
            CaptureChannel::ErpApi => "ERP_API",
            CaptureChannel::SupplierPortal => "SUPPLIER_PORTAL",
            CaptureChannel::ApiPush => "API_PUSH",
            CaptureChannel::Manual => "MANUAL",
        }
    }
}

impl std::fmt::Display for CaptureChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Shape of the declared payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetType {
    PartnerMaster,
    ProductMaster,
    BillOfMaterials,
    Certificate,
    TransactionLog,
}

/// Declared reach of the submitted fact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeclaredScope {
    WholeOrganization,
    LegalEntity,
    Site,
    ProductFamily,
    Unknown,
}

impl DeclaredScope {
    /// Scopes narrower than the whole organization must name their target.
    pub fn requires_target(&self) -> bool {
        matches!(
            self,
            DeclaredScope::LegalEntity | DeclaredScope::Site | DeclaredScope::ProductFamily
        )
    }
}

/// Retention policy. Named policies map to calendar periods; custom policies
/// carry an explicit day count between 1 and 3650.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetentionPolicy {
    /// One calendar month.
    ShortTerm,
    /// One calendar year.
    Standard,
    /// Six calendar years, matching common commercial-record statutes.
    Commercial,
    /// Ten calendar years, matching common tax-record statutes.
    Fiscal,
    /// Explicit day count, 1..=3650.
    Custom { days: u32 },
}

pub const CUSTOM_RETENTION_MIN_DAYS: u32 = 1;
pub const CUSTOM_RETENTION_MAX_DAYS: u32 = 3650;

impl RetentionPolicy {
    pub fn is_valid(&self) -> bool {
        match self {
            RetentionPolicy::Custom { days } => {
                (CUSTOM_RETENTION_MIN_DAYS..=CUSTOM_RETENTION_MAX_DAYS).contains(days)
            }
            _ => true,
        }
    }
}

/// Evidence lifecycle state.
///
/// `Draft -> Ingested -> Sealed` is the happy path. `Rejected` is terminal,
/// `Quarantined` is resumable, `Superseded` is reachable from `Sealed` once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceState {
    Draft,
    Ingested,
    Sealed,
    Rejected,
    Quarantined,
    Superseded,
}

impl EvidenceState {
    /// Sealed, rejected, and superseded records accept no field mutation.
    pub fn is_immutable(&self) -> bool {
        matches!(
            self,
            EvidenceState::Sealed | EvidenceState::Rejected | EvidenceState::Superseded
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EvidenceState::Rejected | EvidenceState::Superseded)
    }
}

/// One entry in a record's append-only state history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: EvidenceState,
    pub to: EvidenceState,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
    pub reason: String,
}

/// An evidence record: an immutable-once-sealed fact with provenance and
/// integrity hashes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Evidence {
    pub evidence_id: EvidenceId,
    pub tenant_id: TenantId,
    pub capture_channel: CaptureChannel,
    pub upstream_system: String,
    pub dataset_type: DatasetType,
    pub declared_scope: DeclaredScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_target_id: Option<String>,
    pub primary_intent: String,
    pub purpose_tags: BTreeSet<String>,
    pub contains_personal_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal_basis: Option<String>,
    pub retention_policy: RetentionPolicy,
    /// Derived at ingest. An explicit override is permitted but audited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_end: Option<DateTime<Utc>>,
    /// Computed server-side at ingest, absent while a draft.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_hash: Option<String>,
    pub state: EvidenceState,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Successor reference, set exactly once on supersession.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<EvidenceId>,
    /// Back-reference from a successor draft to the record it replaces.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<EvidenceId>,
    pub state_history: Vec<StateTransition>,
}

impl Evidence {
    /// State held before the most recent quarantine, for resumption.
    pub fn pre_quarantine_state(&self) -> Option<EvidenceState> {
        self.state_history
            .iter()
            .rev()
            .find(|t| t.to == EvidenceState::Quarantined)
            .map(|t| t.from)
    }
}
