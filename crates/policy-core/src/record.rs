//! Decision-recording boundary.
//!
//! Every completed evaluation is forwarded to a [`DecisionRecorder`] before
//! the result is returned to the caller.  Recording is decoupled from the
//! decision: a failed write is surfaced separately and never flips or
//! withholds the user-facing outcome.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::EvaluationResult;

/// Write-once record of one evaluation decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub organization_id: String,
    pub user_id: String,
    pub prompt: String,
    pub result: EvaluationResult,
    pub timestamp: DateTime<Utc>,
}

/// Failure to durably record a decision.
#[derive(Debug, thiserror::Error)]
#[error("failed to record decision: {0}")]
pub struct RecordError(pub String);

/// Durable append-only sink for evaluation decisions.
#[async_trait]
pub trait DecisionRecorder: Send + Sync {
    async fn record(&self, record: &DecisionRecord) -> Result<(), RecordError>;
}
