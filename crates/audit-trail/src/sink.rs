//! Background audit writer and its cloneable submission handle.

use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use policy_core::{DecisionRecord, DecisionRecorder, RecordError};

use crate::entry::AuditEntry;

/// Channel buffer between producers and the background writer task.
const CHANNEL_BUFFER: usize = 1024;

/// Flush the writer after this many seconds of channel inactivity.
const FLUSH_INTERVAL_SECS: u64 = 1;

/// Errors that can occur during audit trail I/O.
#[derive(Debug, thiserror::Error)]
pub enum AuditWriteError {
    #[error("failed to create parent directories: {0}")]
    CreateDir(std::io::Error),

    #[error("failed to open audit trail file: {0}")]
    OpenFile(std::io::Error),

    #[error("failed to serialize audit entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to append to audit trail: {0}")]
    Append(std::io::Error),

    #[error("failed to flush audit trail: {0}")]
    Flush(std::io::Error),

    #[error("audit writer task is no longer running")]
    WriterGone,
}

/// Append-only file writer serialising [`AuditEntry`] values as JSON lines.
pub struct AuditWriter {
    file: tokio::fs::File,
}

impl AuditWriter {
    /// Open (or create) the audit trail at `path` in append mode, creating
    /// parent directories as needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AuditWriteError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(AuditWriteError::CreateDir)?;
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(AuditWriteError::OpenFile)?;

        Ok(Self { file })
    }

    /// Append `entry` as a single newline-terminated JSON object.
    pub async fn append(&mut self, entry: &AuditEntry) -> Result<(), AuditWriteError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        self.file
            .write_all(&line)
            .await
            .map_err(AuditWriteError::Append)?;

        Ok(())
    }

    /// Flush buffered entries to disk.
    pub async fn flush(&mut self) -> Result<(), AuditWriteError> {
        self.file.flush().await.map_err(AuditWriteError::Flush)
    }
}

/// Cheap, cloneable handle that submits entries to the background writer.
///
/// `AuditSink` is `Clone + Send + Sync`; share it freely across evaluations.
/// Durability is decoupled from decision delivery: a submission failure is
/// reported to the caller, but the background task never aborts an
/// evaluation.
#[derive(Clone)]
pub struct AuditSink {
    tx: mpsc::Sender<AuditEntry>,
}

impl AuditSink {
    /// Open the audit trail at `path`, spawn the background writer task, and
    /// return the `(sink, join_handle)` pair.  The task drains the channel,
    /// flushes after idle periods, flushes once more when the last sink
    /// clone is dropped, then exits.
    pub async fn start(
        path: impl AsRef<Path>,
    ) -> Result<(Self, JoinHandle<()>), AuditWriteError> {
        let (tx, rx) = mpsc::channel::<AuditEntry>(CHANNEL_BUFFER);

        let mut writer = AuditWriter::open(path).await?;

        let handle = tokio::spawn(async move {
            run_writer_loop(&mut writer, rx).await;
        });

        Ok((Self { tx }, handle))
    }

    /// Submit an entry to the background writer.
    ///
    /// Waits when the channel is full.  Fails only when the writer task has
    /// exited (e.g. after a fatal I/O error); the entry is then lost and the
    /// caller decides how to surface that.
    pub async fn append(&self, entry: AuditEntry) -> Result<(), AuditWriteError> {
        self.tx
            .send(entry)
            .await
            .map_err(|_| AuditWriteError::WriterGone)
    }
}

#[async_trait]
impl DecisionRecorder for AuditSink {
    async fn record(&self, record: &DecisionRecord) -> Result<(), RecordError> {
        self.append(AuditEntry::from_record(record))
            .await
            .map_err(|e| RecordError(e.to_string()))
    }
}

/// Core loop of the background writer task.
async fn run_writer_loop(writer: &mut AuditWriter, mut rx: mpsc::Receiver<AuditEntry>) {
    let flush_interval = tokio::time::Duration::from_secs(FLUSH_INTERVAL_SECS);
    let mut dirty = false;

    loop {
        match tokio::time::timeout(flush_interval, rx.recv()).await {
            Ok(Some(entry)) => {
                if let Err(err) = writer.append(&entry).await {
                    tracing::error!(%err, "failed to append audit entry");
                } else {
                    dirty = true;
                }
            }
            // Channel closed: final flush, then exit.
            Ok(None) => {
                if dirty {
                    if let Err(err) = writer.flush().await {
                        tracing::error!(%err, "failed to flush audit trail on shutdown");
                    }
                }
                tracing::debug!("audit writer task shutting down");
                return;
            }
            // Idle: flush outstanding writes.
            Err(_) => {
                if dirty {
                    if let Err(err) = writer.flush().await {
                        tracing::error!(%err, "periodic audit trail flush failed");
                    } else {
                        dirty = false;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy_core::EvaluationResult;

    fn blocked_result() -> EvaluationResult {
        EvaluationResult {
            blocked: true,
            block_reason: Some("matched rule".into()),
            matched_rule: Some("rule_1".into()),
            matched_policy: Some("pol_1".into()),
            similarity_score: Some(0.9),
            rule_type: None,
        }
    }

    #[tokio::test]
    async fn entries_land_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let (sink, handle) = AuditSink::start(&path).await.unwrap();
        sink.append(AuditEntry::new("org_1", "user_1", "first", blocked_result()))
            .await
            .unwrap();
        sink.append(AuditEntry::new(
            "org_1",
            "user_2",
            "second",
            EvaluationResult::allowed(),
        ))
        .await
        .unwrap();

        drop(sink);
        handle.await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: AuditEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.prompt, "first");
        assert!(first.decision.blocked);

        let second: AuditEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.user_id, "user_2");
        assert!(!second.decision.blocked);
    }

    #[tokio::test]
    async fn sink_records_evaluator_decisions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let (sink, handle) = AuditSink::start(&path).await.unwrap();
        let record = DecisionRecord {
            organization_id: "org_1".into(),
            user_id: "user_1".into(),
            prompt: "a prompt".into(),
            result: EvaluationResult::allowed(),
            timestamp: chrono::Utc::now(),
        };
        sink.record(&record).await.unwrap();

        drop(sink);
        handle.await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let entry: AuditEntry = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(entry.organization_id, "org_1");
        assert_eq!(entry.timestamp, record.timestamp);
    }

    #[tokio::test]
    async fn append_after_writer_exit_reports_writer_gone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let (sink, handle) = AuditSink::start(&path).await.unwrap();
        // Kill the writer task; its receiver drops and the channel closes.
        handle.abort();
        let _ = handle.await;

        let err = sink
            .append(AuditEntry::new("o", "u", "p", EvaluationResult::allowed()))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditWriteError::WriterGone));
    }

    #[tokio::test]
    async fn writer_appends_across_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        for i in 0..2 {
            let mut writer = AuditWriter::open(&path).await.unwrap();
            writer
                .append(&AuditEntry::new(
                    "org",
                    format!("user_{i}"),
                    "p",
                    EvaluationResult::allowed(),
                ))
                .await
                .unwrap();
            writer.flush().await.unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
