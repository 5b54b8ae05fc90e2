//! Quiz generation entry points.
//!
//! [`QuizGenerator`] runs one document through the whole pipeline:
//!
//! ```text
//! resolve input → extract text → build prompt → model call → parse → assemble
//! ```
//!
//! and then replaces the assembler's second-precision id with a unique one.
//! [`QuizGenerator::generate`] is the error boundary: whatever stage fails,
//! the caller receives exactly one [`ErrorEnvelope`] and never a partial quiz.
//! [`QuizGenerator::try_generate`] is the same pipeline before that boundary,
//! for callers that want the typed [`QuizError`].
//!
//! Nothing is persisted here; see [`crate::batch`] and [`crate::store`].

use crate::config::QuizConfig;
use crate::error::QuizError;
use crate::output::{source_label, ErrorEnvelope, QuizDocument, QuizOutcome};
use crate::pipeline::assemble::{assemble_quiz, make_unique_quiz_id};
use crate::pipeline::extract::{self, PdfiumExtractor, TextExtractor};
use crate::pipeline::input;
use crate::pipeline::llm::{request_quiz, resolve_provider, ProviderModel, QuizModel};
use crate::pipeline::parse::parse_quiz_response;
use crate::prompts::build_quiz_prompt;
use crate::redact::redact_url;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Runs the quiz pipeline with a fixed configuration and collaborators.
pub struct QuizGenerator {
    config: QuizConfig,
    model: Arc<dyn QuizModel>,
    extractor: Arc<dyn TextExtractor>,
}

impl QuizGenerator {
    /// Build a generator backed by the configured LLM provider and pdfium.
    ///
    /// Fails when no provider can be resolved (see
    /// [`crate::pipeline::llm::resolve_provider`]).
    pub fn new(config: QuizConfig) -> Result<Self, QuizError> {
        let provider = resolve_provider(&config)?;
        debug!(
            "LLM provider resolved (model: {})",
            config.model.as_deref().unwrap_or("provider default")
        );
        Ok(Self::with_model(config, Arc::new(ProviderModel::new(provider))))
    }

    /// Build a generator around an explicit model.
    pub fn with_model(config: QuizConfig, model: Arc<dyn QuizModel>) -> Self {
        Self {
            config,
            model,
            extractor: Arc::new(PdfiumExtractor::new()),
        }
    }

    /// Replace the text extractor.
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &QuizConfig {
        &self.config
    }

    /// Generate a quiz for `input`, converting any failure into an envelope.
    pub async fn generate(&self, input: &str) -> QuizOutcome {
        match self.try_generate(input).await {
            Ok(doc) => QuizOutcome::Success(doc),
            Err(e) => {
                error!("Quiz generation failed for {}: {}", redact_url(input), e);
                QuizOutcome::Error(ErrorEnvelope::from_error(&e, source_label(input)))
            }
        }
    }

    /// Generate a quiz for `input`, returning the first stage error.
    pub async fn try_generate(&self, input: &str) -> Result<QuizDocument, QuizError> {
        let start = Instant::now();
        info!("Starting quiz generation: {}", redact_url(input));

        // ── Step 1: Extract text ─────────────────────────────────────────
        let text = self.extract_text(input).await?;
        if text.is_empty() {
            warn!(
                "No extractable text in {}; the model will see empty content",
                redact_url(input)
            );
        }

        // ── Step 2: Build prompt ─────────────────────────────────────────
        let prompt = build_quiz_prompt(
            &text,
            self.config.num_questions,
            &self.config.question_types,
        );
        debug!("Prompt: {} chars", prompt.len());

        // ── Step 3: Model call ───────────────────────────────────────────
        let reply = request_quiz(self.model.as_ref(), &prompt, &self.config).await?;

        // ── Step 4: Parse ────────────────────────────────────────────────
        let parsed = parse_quiz_response(&reply);
        let partial = parsed.iter().filter(|q| !q.is_complete()).count();
        if parsed.is_empty() {
            warn!("Model reply contained no question records");
        } else if partial > 0 {
            debug!("{} of {} parsed questions are partial", partial, parsed.len());
        }

        // ── Step 5: Assemble ─────────────────────────────────────────────
        let mut doc = assemble_quiz(
            parsed,
            &source_label(input),
            &self.config.question_types,
            self.config.validation,
        );
        doc.quiz_id = make_unique_quiz_id(&doc.quiz_id);

        info!(
            "Quiz {} ready: {} questions in {:?}",
            doc.quiz_id,
            doc.metadata.number_of_questions,
            start.elapsed()
        );
        Ok(doc)
    }

    /// Resolve `input` and return its extracted text, without calling the model.
    pub async fn extract_text(&self, input: &str) -> Result<String, QuizError> {
        let source = input::resolve_input(
            input,
            self.config.download_timeout_secs,
            self.config.max_download_bytes,
        )
        .await?;
        extract::extract_text(Arc::clone(&self.extractor), source).await
    }
}

/// Generate a quiz for one document with the configured provider.
///
/// Provider resolution failures are reported through the envelope like any
/// other stage failure.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2quiz::{generate_quiz, QuizConfig};
///
/// # #[tokio::main]
/// # async fn main() {
/// let config = QuizConfig::builder().num_questions(3).build().unwrap();
/// let outcome = generate_quiz("lecture.pdf", &config).await;
/// println!("{}", outcome.to_json_pretty().unwrap());
/// # }
/// ```
pub async fn generate_quiz(input: impl AsRef<str>, config: &QuizConfig) -> QuizOutcome {
    let input = input.as_ref();
    match QuizGenerator::new(config.clone()) {
        Ok(generator) => generator.generate(input).await,
        Err(e) => {
            error!("Quiz generation failed for {}: {}", redact_url(input), e);
            QuizOutcome::Error(ErrorEnvelope::from_error(&e, source_label(input)))
        }
    }
}

/// Synchronous wrapper around [`generate_quiz`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_quiz_sync(input: impl AsRef<str>, config: &QuizConfig) -> QuizOutcome {
    let input = input.as_ref();
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(generate_quiz(input, config)),
        Err(e) => {
            let err = QuizError::Internal(format!("Failed to create tokio runtime: {}", e));
            QuizOutcome::Error(ErrorEnvelope::from_error(&err, source_label(input)))
        }
    }
}

/// Extract the text of a PDF without converting it into a quiz.
///
/// Does not require an LLM provider or API key.
pub async fn extract_text(input: impl AsRef<str>, config: &QuizConfig) -> Result<String, QuizError> {
    let source = input::resolve_input(
        input.as_ref(),
        config.download_timeout_secs,
        config.max_download_bytes,
    )
    .await?;
    extract::extract_text(Arc::new(PdfiumExtractor::new()), source).await
}
