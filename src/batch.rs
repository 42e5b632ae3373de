//! Batch driver: validate many messages concurrently.
//!
//! Each message runs on the blocking pool, bounded by a semaphore. A worker
//! that panics is reported as a failure entry and the rest of the batch goes
//! on. Setting the stop flag skips every message not yet started.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::BatchError;
use crate::validation::{Message, ValidationReport, Validator};

/// A message that produced no report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub id: String,
    pub reason: String,
}

/// Outcome of one batch run. Reports keep the input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reports: Vec<ValidationReport>,
    pub failures: Vec<BatchFailure>,
    /// Ids left unvalidated because the batch was stopped.
    pub skipped: Vec<String>,
}

impl BatchReport {
    /// Reports whose verdict requires notifying the operator.
    pub fn requiring_notification(&self) -> impl Iterator<Item = &ValidationReport> {
        self.reports.iter().filter(|r| r.requires_notification)
    }
}

enum Outcome {
    Done(Box<ValidationReport>),
    Failed(BatchError),
    Skipped,
}

/// Validate `messages` with at most `workers` running at once.
pub async fn validate_batch(
    validator: Arc<Validator>,
    messages: Vec<Message>,
    workers: usize,
    stop: Arc<AtomicBool>,
) -> BatchReport {
    let batch_id = Uuid::new_v4();
    let started_at = Utc::now();
    let count = messages.len();
    info!(batch = %batch_id, count, workers, "Validating message batch");

    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut handles = Vec::with_capacity(count);

    for message in messages {
        let id = message.id.clone();
        let validator = Arc::clone(&validator);
        let semaphore = Arc::clone(&semaphore);
        let stop = Arc::clone(&stop);

        let handle = tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return Outcome::Skipped;
            };
            if stop.load(Ordering::Relaxed) {
                return Outcome::Skipped;
            }

            let id = message.id.clone();
            match tokio::task::spawn_blocking(move || validator.validate(&message)).await {
                Ok(report) => Outcome::Done(Box::new(report)),
                Err(e) => Outcome::Failed(BatchError::WorkerFailed {
                    id,
                    reason: e.to_string(),
                }),
            }
        });
        handles.push((id, handle));
    }

    let mut reports = Vec::with_capacity(count);
    let mut failures = Vec::new();
    let mut skipped = Vec::new();

    for (id, handle) in handles {
        let outcome = handle.await.unwrap_or_else(|e| {
            Outcome::Failed(BatchError::WorkerFailed {
                id: id.clone(),
                reason: e.to_string(),
            })
        });
        match outcome {
            Outcome::Done(report) => reports.push(*report),
            Outcome::Failed(e) => {
                error!(batch = %batch_id, id = %id, error = %e, "Message validation failed");
                failures.push(BatchFailure {
                    id,
                    reason: e.to_string(),
                });
            }
            Outcome::Skipped => skipped.push(id),
        }
    }

    if !skipped.is_empty() {
        warn!(batch = %batch_id, skipped = skipped.len(), "Batch stopped early");
    }
    info!(
        batch = %batch_id,
        validated = reports.len(),
        failed = failures.len(),
        total = count,
        "Batch validation complete"
    );

    BatchReport {
        batch_id,
        started_at,
        finished_at: Utc::now(),
        reports,
        failures,
        skipped,
    }
}

// ── Message sources ─────────────────────────────────────────────────

/// Where batch input comes from.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Source name for logs.
    fn name(&self) -> &str;

    /// Fetch every message to validate.
    async fn fetch(&self) -> Result<Vec<Message>, BatchError>;
}

/// Harvester output on disk: a JSON array of messages, or an object
/// holding one under `mensajes`/`messages`.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
    name: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MessageDocument {
    List(Vec<Message>),
    Wrapped {
        #[serde(alias = "mensajes")]
        messages: Vec<Message>,
    },
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, name }
    }

    fn fail(&self, reason: impl ToString) -> BatchError {
        BatchError::SourceFailed {
            source_name: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl MessageSource for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    /// Duplicate ids (the harvester re-reads overlapping pages) keep the
    /// first occurrence.
    async fn fetch(&self) -> Result<Vec<Message>, BatchError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.fail(e))?;
        let doc: MessageDocument = serde_json::from_str(&raw).map_err(|e| self.fail(e))?;
        let messages = match doc {
            MessageDocument::List(messages) | MessageDocument::Wrapped { messages } => messages,
        };

        let total = messages.len();
        let mut seen = HashSet::new();
        let unique: Vec<Message> = messages
            .into_iter()
            .filter(|m| seen.insert(m.id.clone()))
            .collect();
        if unique.len() < total {
            debug!(
                source = %self.name,
                duplicates = total - unique.len(),
                "Dropped duplicate messages"
            );
        }
        Ok(unique)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::contingency::ContingencyTable;
    use crate::reference::registry::ReferenceRegistry;
    use crate::reference::rules::DirectoryRuleSource;
    use crate::reference::terms::TermCatalog;
    use crate::validation::spelling::{SpellChecker, SpellSession};
    use crate::validation::{OrthographyChecker, Verdict};
    use crate::error::SpellError;

    fn validator(spelling: OrthographyChecker) -> Arc<Validator> {
        let registry = ReferenceRegistry::from_parts(
            ContingencyTable::empty(),
            TermCatalog::default(),
            Box::new(DirectoryRuleSource::new("/nonexistent/railcheck/rules")),
        );
        Arc::new(Validator::new(Arc::new(registry), spelling))
    }

    fn message(id: &str, content: &str) -> Message {
        Message {
            id: id.into(),
            content: content.into(),
            line: "Roca".into(),
            operator: "op".into(),
            sent_at: "01/12/2024 10:00:00".into(),
        }
    }

    struct PanickingChecker;

    impl SpellChecker for PanickingChecker {
        fn name(&self) -> &str {
            "panicking"
        }

        fn open(&self) -> Result<Box<dyn SpellSession + '_>, SpellError> {
            Ok(Box::new(PanickingSession))
        }
    }

    struct PanickingSession;

    impl SpellSession for PanickingSession {
        fn check(&mut self, text: &str) -> Result<Vec<crate::validation::SpellFinding>, SpellError> {
            if text.contains("BOOM") {
                panic!("checker crashed");
            }
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn validates_in_input_order() {
        let messages = (0..20)
            .map(|i| message(&i.to_string(), &format!("EL TREN {i} CIRCULA")))
            .collect();
        let batch = validate_batch(
            validator(OrthographyChecker::fallback_only()),
            messages,
            4,
            Arc::new(AtomicBool::new(false)),
        )
        .await;

        assert_eq!(batch.reports.len(), 20);
        assert!(batch.failures.is_empty());
        let ids: Vec<_> = batch.reports.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids[..3], ["0", "1", "2"]);
        assert!(batch.reports.iter().all(|r| r.verdict == Verdict::Blocking));
        assert_eq!(batch.requiring_notification().count(), 20);
    }

    #[tokio::test]
    async fn panicking_message_becomes_failure_entry() {
        let batch = validate_batch(
            validator(OrthographyChecker::with_external(Box::new(PanickingChecker))),
            vec![
                message("1", "EL TREN 1 CIRCULA"),
                message("2", "BOOM"),
                message("3", "EL TREN 3 CIRCULA"),
            ],
            2,
            Arc::new(AtomicBool::new(false)),
        )
        .await;

        assert_eq!(batch.reports.len(), 2);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].id, "2");
    }

    #[tokio::test]
    async fn stop_flag_skips_everything_not_started() {
        let batch = validate_batch(
            validator(OrthographyChecker::fallback_only()),
            vec![message("1", "x"), message("2", "y")],
            1,
            Arc::new(AtomicBool::new(true)),
        )
        .await;

        assert!(batch.reports.is_empty());
        assert_eq!(batch.skipped, vec!["1".to_string(), "2".to_string()]);
    }

    #[tokio::test]
    async fn json_file_source_reads_harvester_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mensajes.json");
        std::fs::write(
            &path,
            r#"[
                {"numero_mensaje": 101, "contenido": "EL TREN 1 CIRCULA", "linea": "Roca",
                 "operador": "ana", "fecha_hora": "01/12/2024 10:00:00", "criticidad": "ALTA"},
                {"numero_mensaje": 101, "contenido": "duplicate", "linea": "Roca"},
                {"numero_mensaje": "102", "contenido": "EL SERVICIO SE ENCUENTRA INTERRUMPIDO"}
            ]"#,
        )
        .unwrap();

        let source = JsonFileSource::new(&path);
        let messages = source.fetch().await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "101");
        assert_eq!(messages[0].operator, "ana");
        assert_eq!(messages[1].id, "102");
        assert!(messages[1].line.is_empty());
    }

    #[tokio::test]
    async fn json_file_source_accepts_wrapped_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        std::fs::write(&path, r#"{"mensajes": [{"id": "a", "content": "x"}]}"#).unwrap();

        let messages = JsonFileSource::new(&path).fetch().await.unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn json_file_source_reports_missing_file() {
        let err = JsonFileSource::new("/nonexistent/mensajes.json")
            .fetch()
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::SourceFailed { .. }));
    }
}
