use serde::{Deserialize, Serialize};

use policy_core::{DecisionRecord, EvaluationResult};

/// One audit log line: a single evaluation decision, write-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: uuid::Uuid,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub organization_id: String,
    pub user_id: String,
    pub prompt: String,
    pub decision: EvaluationResult,
}

impl AuditEntry {
    /// Create an entry with a fresh UUID v4 and the current UTC timestamp.
    pub fn new(
        organization_id: impl Into<String>,
        user_id: impl Into<String>,
        prompt: impl Into<String>,
        decision: EvaluationResult,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            organization_id: organization_id.into(),
            user_id: user_id.into(),
            prompt: prompt.into(),
            decision,
        }
    }

    /// Build an entry from the evaluator's [`DecisionRecord`], preserving
    /// the timestamp the decision was made at.
    pub fn from_record(record: &DecisionRecord) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            timestamp: record.timestamp,
            organization_id: record.organization_id.clone(),
            user_id: record.user_id.clone(),
            prompt: record.prompt.clone(),
            decision: record.result.clone(),
        }
    }
}
