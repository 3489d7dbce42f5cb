//! Append-only audit trail of prompt evaluation decisions.
//!
//! Every decision the evaluator produces is serialised as one
//! newline-terminated JSON object and appended to a log file, yielding a
//! [JSON Lines](https://jsonlines.org/) stream keyed by organization, user,
//! prompt, and decision.  Entries are write-once and never mutated.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use audit_trail::{AuditEntry, AuditSink};
//! use policy_core::EvaluationResult;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (sink, _handle) = AuditSink::start("audit.jsonl").await?;
//!
//! sink.append(AuditEntry::new(
//!     "org_123",
//!     "user_456",
//!     "how do I reset my password?",
//!     EvaluationResult::allowed(),
//! ))
//! .await?;
//! # Ok(())
//! # }
//! ```
//!
//! The sink also implements [`policy_core::DecisionRecorder`], so it plugs
//! straight into `Evaluator::with_recorder`.

pub mod entry;
pub mod sink;

pub use entry::AuditEntry;
pub use sink::{AuditSink, AuditWriteError, AuditWriter};
