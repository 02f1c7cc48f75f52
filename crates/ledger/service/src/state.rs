//! Shared application state.

use gate_engine::MappingGate;
use gate_escalation::EscalationRouter;
use gate_rules::{RuleError, RuleSet};
use ledger_channels::{all_adapters, ChannelAdapter, ParityEnforcer};
use ledger_core::EvidenceLedger;
use ledger_types::CaptureChannel;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<EvidenceLedger>,
    pub gate: Arc<MappingGate>,
    pub escalations: Arc<EscalationRouter>,
    pub parity: Arc<ParityEnforcer>,
    adapters: Arc<Vec<Box<dyn ChannelAdapter>>>,
}

impl AppState {
    /// In-memory state under the given rule tables.
    pub fn new(rules: RuleSet) -> Result<Self, RuleError> {
        Ok(Self {
            ledger: Arc::new(EvidenceLedger::new()),
            gate: Arc::new(MappingGate::new(rules)?),
            escalations: Arc::new(EscalationRouter::new()),
            parity: Arc::new(ParityEnforcer::new()),
            adapters: Arc::new(all_adapters()),
        })
    }

    pub fn adapter_for(&self, channel: CaptureChannel) -> Option<&dyn ChannelAdapter> {
        self.adapters
            .iter()
            .find(|adapter| adapter.channel() == channel)
            .map(|adapter| adapter.as_ref())
    }
}
