//! # edgequake-pdf2quiz
//!
//! Generate multiple-choice and true/false quizzes from PDF documents with an
//! LLM.
//!
//! The text layer of the PDF is extracted page by page, wrapped in a prompt
//! that prescribes a line-based record format, and sent to the model in one
//! call. The free-text reply is parsed back into question records and
//! normalised into a [`QuizDocument`]. Whatever goes wrong along the way, the
//! caller receives a well-formed [`QuizOutcome`]: either the quiz or a single
//! [`ErrorEnvelope`].
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file or download from URL (presigned URLs too)
//!  ├─ 2. Extract   page text via pdfium (spawn_blocking), textless pages skipped
//!  ├─ 3. Prompt    count + type mix + Q:/Type:/Options:/A:/Explanation: format
//!  ├─ 4. Model     one call to gpt-4.1-nano / gemini / claude / …
//!  ├─ 5. Parse     line-marker scan of the reply
//!  └─ 6. Assemble  ids, option defaults, metadata → QuizDocument
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2quiz::{generate_quiz, QuestionType, QuizConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = QuizConfig::builder()
//!         .num_questions(5)
//!         .question_types(vec![QuestionType::MultipleChoice, QuestionType::TrueFalse])
//!         .build()?;
//!     let outcome = generate_quiz("lecture.pdf", &config).await;
//!     println!("{}", outcome.to_json_pretty()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2quiz` binary (clap + anyhow + indicatif + tracing-subscriber + dotenvy) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2quiz = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod redact;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{generate_batch, BatchFailure, BatchItem, BatchSummary, StoreTarget};
pub use config::{GenerationParams, QuizConfig, QuizConfigBuilder, ValidationMode};
pub use error::{ErrorKind, QuizError, StoreError};
pub use generate::{extract_text, generate_quiz, generate_quiz_sync, QuizGenerator};
pub use output::{
    ErrorEnvelope, QuestionMetadata, QuestionType, QuizDocument, QuizOutcome, QuizQuestion,
    QuizStatus,
};
pub use pipeline::extract::{PdfiumExtractor, TextExtractor};
pub use pipeline::llm::{ProviderModel, QuizModel};
pub use pipeline::parse::{parse_quiz_response, Completeness, ParsedQuestion};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::build_quiz_prompt;
pub use store::{FileQuizStore, MemoryQuizStore, QuizStore, StoredQuiz};
