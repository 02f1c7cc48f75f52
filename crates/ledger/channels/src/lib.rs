//! Channel adapters for the evidence ledger.
//!
//! One adapter per ingestion channel. Each shapes channel-native input into
//! the canonical ingestion request, enforcing its channel's additive
//! requirements on top of the common declared field set. Channel identity is
//! assigned by the adapter itself and never inferred from client-supplied
//! fields.
//!
//! The parity enforcer feeds one canonical sample through every adapter and
//! asserts the shaped drafts are field-for-field identical, modulo the
//! provenance fields that legitimately differ per channel. It also carries
//! the standing check against silent rewrites: no trimming, no casting, no
//! default injection.

#![deny(unsafe_code)]

mod adapter;
mod adapters;
mod parity;
mod upstream;

pub use adapter::{ChannelAdapter, ChannelError, ChannelInput, ShapedOutcome};
pub use adapters::{
    all_adapters, ApiPushAdapter, ErpApiAdapter, ErpExportAdapter, FileUploadAdapter,
    ManualAdapter, SupplierPortalAdapter, MIN_ENTRY_NOTES_LEN,
};
pub use parity::{ParityEnforcer, ParityReport, ParitySample, ParityViolation};
pub use upstream::{
    ConnectorClient, PortalVerifier, StaticConnector, StaticPortalVerifier, UpstreamError,
    DEFAULT_UPSTREAM_TIMEOUT,
};
