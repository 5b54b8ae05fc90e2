//! Progress-callback trait for per-document batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::QuizConfigBuilder::progress_callback`] to receive events
//! as [`crate::batch::generate_batch`] works through its documents. The CLI
//! uses this to drive an `indicatif` progress bar.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2quiz::{BatchProgressCallback, QuizConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     questions: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, _index: usize, _total: usize, num_questions: usize) {
//!         self.questions.fetch_add(num_questions, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { questions: AtomicUsize::new(0) });
//!
//! let config = QuizConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch runner as each document is processed.
///
/// Documents run concurrently, so `on_document_start`,
/// `on_document_complete` and `on_document_error` may be called from several
/// tasks at once and in any order. All methods default to no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any document is started.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before a document enters the pipeline.
    ///
    /// # Arguments
    /// * `index`  — 0-indexed position of the document in the batch
    /// * `total`  — batch size
    /// * `source` — source label, already redacted
    fn on_document_start(&self, index: usize, total: usize, source: &str) {
        let _ = (index, total, source);
    }

    /// Called when a document produced a quiz (and, with a store, was saved).
    fn on_document_complete(&self, index: usize, total: usize, num_questions: usize) {
        let _ = (index, total, num_questions);
    }

    /// Called when a document failed at any stage, persistence included.
    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every document has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation, the default when no callback is configured.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::QuizConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
