//! Storage abstractions for the evidence ledger.
//!
//! This crate defines the storage contract the ledger state machine runs on:
//! - evidence records with conditional, single-writer state transitions
//! - an append-only, hash-chained audit trail (no update or delete exists)
//! - immutable mapping decisions
//! - idempotent escalation work items
//!
//! The in-memory adapter is the deterministic reference implementation;
//! production deployments put a transactional backend behind the same traits.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
mod model;
mod traits;

pub use error::{StorageError, StorageResult};
pub use model::{
    AuditAppend, AuditRecord, EscalationRecord, EvidencePatch, IdempotencyOutcome, IngestionUpdate,
};
pub use traits::{
    AuditStore, DecisionStore, EscalationStore, EvidenceStore, LedgerStorage, QueryWindow,
};
