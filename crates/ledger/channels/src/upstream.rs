//! Seams to external collaborators (portal verification, connector pulls).
//!
//! Every call goes through a bounded timeout and surfaces a distinct
//! `UPSTREAM_TIMEOUT` failure rather than blocking the ingestion pipeline.

use crate::adapter::ChannelError;
use async_trait::async_trait;
use ledger_types::ErrorCode;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Default bound for upstream calls.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure from an external collaborator.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    #[error("upstream rejected the call: {0}")]
    Rejected(String),
}

/// Verifies server-issued portal submission tokens.
#[async_trait]
pub trait PortalVerifier: Send + Sync {
    async fn verify(&self, submission_id: &str) -> Result<bool, UpstreamError>;
}

/// Pulls a snapshot payload from a live connector.
#[async_trait]
pub trait ConnectorClient: Send + Sync {
    async fn pull_snapshot(&self, upstream_system: &str) -> Result<Value, UpstreamError>;
}

/// Run an upstream future under the bounded timeout.
pub(crate) async fn bounded<T, F>(label: &str, future: F) -> Result<T, ChannelError>
where
    F: Future<Output = Result<T, UpstreamError>>,
{
    match tokio::time::timeout(DEFAULT_UPSTREAM_TIMEOUT, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(ChannelError::Upstream {
            code: ErrorCode::UpstreamUnavailable,
            message: format!("{label}: {err}"),
        }),
        Err(_) => Err(ChannelError::Upstream {
            code: ErrorCode::UpstreamTimeout,
            message: format!("{label}: timed out"),
        }),
    }
}

/// Fixed-answer portal verifier for tests and local runs.
#[derive(Default)]
pub struct StaticPortalVerifier {
    known: HashSet<String>,
}

impl StaticPortalVerifier {
    pub fn with_tokens(tokens: impl IntoIterator<Item = String>) -> Self {
        Self {
            known: tokens.into_iter().collect(),
        }
    }
}

#[async_trait]
impl PortalVerifier for StaticPortalVerifier {
    async fn verify(&self, submission_id: &str) -> Result<bool, UpstreamError> {
        Ok(self.known.contains(submission_id))
    }
}

/// Fixed-payload connector for tests and local runs.
#[derive(Default)]
pub struct StaticConnector {
    snapshots: HashMap<String, Value>,
}

impl StaticConnector {
    pub fn with_snapshot(mut self, system: impl Into<String>, value: Value) -> Self {
        self.snapshots.insert(system.into(), value);
        self
    }
}

#[async_trait]
impl ConnectorClient for StaticConnector {
    async fn pull_snapshot(&self, upstream_system: &str) -> Result<Value, UpstreamError> {
        self.snapshots
            .get(upstream_system)
            .cloned()
            .ok_or_else(|| UpstreamError::Unavailable(format!("no snapshot for {upstream_system}")))
    }
}
