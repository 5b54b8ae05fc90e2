//! Multi-document runs with per-document failure isolation.
//!
//! Every [`BatchItem`] is an independent pipeline invocation. Up to
//! `config.concurrency` documents are in flight at once
//! (`futures::stream::buffer_unordered`); a document that fails, whether in
//! the pipeline or while being persisted, is recorded in
//! [`BatchSummary::failed`] and never stops its siblings. Results come back in
//! input order regardless of completion order.

use crate::generate::QuizGenerator;
use crate::output::{source_label, QuizDocument, QuizOutcome};
use crate::progress::BatchProgressCallback;
use crate::redact::redact_url;
use crate::store::{store_with_retry, QuizStore, StoredQuiz};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Base delay for store write retries, doubled per attempt.
pub const STORE_RETRY_BASE_MS: u64 = 100;

/// One document to process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    /// Path or URL of the PDF.
    pub source: String,
    /// Name recorded with the stored quiz.
    pub document_name: String,
}

impl BatchItem {
    /// Item whose document name is derived from the source.
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let document_name = source_label(&source);
        Self {
            source,
            document_name,
        }
    }

    pub fn with_document_name(mut self, name: impl Into<String>) -> Self {
        self.document_name = name.into();
        self
    }
}

/// Where successful quizzes are persisted, and on whose behalf.
#[derive(Clone, Copy)]
pub struct StoreTarget<'a> {
    pub store: &'a dyn QuizStore,
    pub user_id: &'a str,
}

/// A document that produced no quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    /// 1-based position of the document in the batch.
    pub record_index: usize,
    /// Source, with signed URL parameters redacted.
    pub source: String,
    pub document_name: String,
    pub error: String,
}

/// Aggregated outcome of a batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub successful: Vec<QuizDocument>,
    pub failed: Vec<BatchFailure>,
}

impl BatchSummary {
    /// 200 when every document succeeded, 207 (multi-status) otherwise.
    pub fn status_code(&self) -> u16 {
        if self.failed.is_empty() {
            200
        } else {
            207
        }
    }

    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len()
    }
}

/// Run every item through `generator`, optionally persisting successes.
pub async fn generate_batch(
    generator: &QuizGenerator,
    items: Vec<BatchItem>,
    target: Option<StoreTarget<'_>>,
) -> BatchSummary {
    let total = items.len();
    let config = generator.config();
    let callback = config.progress_callback.clone();
    let cb = callback.as_deref();

    info!("Processing {} documents (concurrency {})", total, config.concurrency);
    if let Some(cb) = cb {
        cb.on_batch_start(total);
    }

    let mut results: Vec<(usize, Result<QuizDocument, BatchFailure>)> =
        stream::iter(items.into_iter().enumerate())
            .map(|(idx, item)| async move {
                (idx, process_one(generator, idx, total, item, target, cb).await)
            })
            .buffer_unordered(config.concurrency.max(1))
            .collect()
            .await;
    results.sort_by_key(|(idx, _)| *idx);

    let mut summary = BatchSummary::default();
    for (_, result) in results {
        match result {
            Ok(doc) => summary.successful.push(doc),
            Err(failure) => summary.failed.push(failure),
        }
    }

    info!(
        "Completed processing {} documents successfully",
        summary.successful.len()
    );
    if !summary.failed.is_empty() {
        error!(
            "Failed to process {} documents: {}",
            summary.failed.len(),
            serde_json::to_string(&summary.failed).unwrap_or_default()
        );
    }
    if let Some(cb) = cb {
        cb.on_batch_complete(total, summary.successful.len());
    }
    summary
}

async fn process_one(
    generator: &QuizGenerator,
    idx: usize,
    total: usize,
    item: BatchItem,
    target: Option<StoreTarget<'_>>,
    cb: Option<&dyn BatchProgressCallback>,
) -> Result<QuizDocument, BatchFailure> {
    let shown = redact_url(&item.source);
    info!("Processing record {} of {}: {}", idx + 1, total, shown);
    if let Some(cb) = cb {
        cb.on_document_start(idx, total, &shown);
    }

    let result = match generator.generate(&item.source).await {
        QuizOutcome::Success(doc) => match target {
            Some(t) => {
                let record = StoredQuiz::new(doc, t.user_id, item.document_name.clone());
                let stored = store_with_retry(
                    t.store,
                    &record,
                    generator.config().max_retries,
                    STORE_RETRY_BASE_MS,
                )
                .await;
                stored.map(|()| record.quiz).map_err(|e| e.to_string())
            }
            None => Ok(doc),
        },
        QuizOutcome::Error(envelope) => Err(envelope.error_message),
    };

    match result {
        Ok(doc) => {
            info!("Successfully completed processing record {}", idx + 1);
            if let Some(cb) = cb {
                cb.on_document_complete(idx, total, doc.metadata.number_of_questions);
            }
            Ok(doc)
        }
        Err(message) => {
            error!("Failed to process record {}: {}", idx + 1, message);
            if let Some(cb) = cb {
                cb.on_document_error(idx, total, &message);
            }
            Err(BatchFailure {
                record_index: idx + 1,
                source: shown,
                document_name: item.document_name,
                error: message,
            })
        }
    }
}
