//! Configuration types for quiz generation.
//!
//! All generation behaviour is controlled through [`QuizConfig`], built via its
//! [`QuizConfigBuilder`]. The model parameters live in an explicit
//! [`GenerationParams`] value carried by the config rather than in any
//! process-wide client state, so two generators in the same process can use
//! different settings and tests can inject a fake model.

use crate::error::QuizError;
use crate::output::QuestionType;
use crate::progress::BatchProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Sampling parameters passed to the model on every call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Sampling temperature. Default: 1.0.
    pub temperature: f32,
    /// Nucleus sampling mass. Default: 0.95.
    pub top_p: f32,
    /// Top-k sampling cutoff. Default: 40.
    pub top_k: u32,
    /// Maximum tokens the model may generate. Default: 8192.
    ///
    /// A five-question quiz needs well under 1 000 tokens, but larger quizzes
    /// with long explanations are silently truncated mid-record when this is
    /// too low; the truncated record still parses, as a partial question.
    pub max_output_tokens: usize,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 8192,
        }
    }
}

/// How strictly parsed questions are admitted into the quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValidationMode {
    /// Assemble every parsed record, defaulting missing fields. (default)
    #[default]
    Lenient,
    /// Drop partial records and records whose answer is not among the options.
    Strict,
}

/// Configuration for quiz generation.
///
/// Built via [`QuizConfig::builder()`] or using [`QuizConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2quiz::{QuestionType, QuizConfig};
///
/// let config = QuizConfig::builder()
///     .num_questions(10)
///     .question_types(vec![QuestionType::MultipleChoice])
///     .temperature(0.7)
///     .build()
///     .unwrap();
/// assert_eq!(config.num_questions, 10);
/// ```
#[derive(Clone)]
pub struct QuizConfig {
    /// Number of questions requested from the model. Default: 5.
    pub num_questions: usize,

    /// Allowed question types. Default: multiple_choice and true_false.
    pub question_types: Vec<QuestionType>,

    /// Model sampling parameters.
    pub generation: GenerationParams,

    /// LLM model identifier, e.g. "gpt-4.1-nano", "gemini-2.0-flash-lite".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "gemini", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Retry attempts on a failed model call. Default: 3.
    ///
    /// Only transport failures are retried. A reply that parses into nothing
    /// is not a failure and is never retried.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Download timeout for URL sources in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Largest PDF accepted from a URL, in bytes. Default: 5 MiB.
    pub max_download_bytes: u64,

    /// Admission policy for parsed questions. Default: [`ValidationMode::Lenient`].
    pub validation: ValidationMode,

    /// Documents processed at once by the batch runner. Default: 4.
    pub concurrency: usize,

    /// Optional batch progress callback.
    pub progress_callback: Option<Arc<dyn BatchProgressCallback>>,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            num_questions: 5,
            question_types: vec![QuestionType::MultipleChoice, QuestionType::TrueFalse],
            generation: GenerationParams::default(),
            model: None,
            provider_name: None,
            provider: None,
            max_retries: 3,
            retry_backoff_ms: 500,
            download_timeout_secs: 120,
            max_download_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
            validation: ValidationMode::default(),
            concurrency: 4,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for QuizConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizConfig")
            .field("num_questions", &self.num_questions)
            .field("question_types", &self.question_types)
            .field("generation", &self.generation)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("max_download_bytes", &self.max_download_bytes)
            .field("validation", &self.validation)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

/// Default cap on downloaded PDFs.
pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Upper bound on a single retry wait.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Wait before retry number `attempt` (0-based): `base_ms * 2^attempt`,
/// saturating, capped at [`MAX_BACKOFF_MS`].
pub fn backoff_delay_ms(base_ms: u64, attempt: u32) -> u64 {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS)
}

impl QuizConfig {
    /// Create a new builder for `QuizConfig`.
    pub fn builder() -> QuizConfigBuilder {
        QuizConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`QuizConfig`].
pub struct QuizConfigBuilder {
    config: QuizConfig,
}

impl QuizConfigBuilder {
    pub fn num_questions(mut self, n: usize) -> Self {
        self.config.num_questions = n;
        self
    }

    pub fn question_types(mut self, types: Vec<QuestionType>) -> Self {
        self.config.question_types = types;
        self
    }

    pub fn generation(mut self, params: GenerationParams) -> Self {
        self.config.generation = params;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.generation.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn top_p(mut self, p: f32) -> Self {
        self.config.generation.top_p = p.clamp(0.0, 1.0);
        self
    }

    pub fn top_k(mut self, k: u32) -> Self {
        self.config.generation.top_k = k;
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.generation.max_output_tokens = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_download_bytes(mut self, bytes: u64) -> Self {
        self.config.max_download_bytes = bytes;
        self
    }

    pub fn validation(mut self, mode: ValidationMode) -> Self {
        self.config.validation = mode;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn BatchProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// Duplicate question types are removed, keeping first-seen order.
    pub fn build(mut self) -> Result<QuizConfig, QuizError> {
        let c = &mut self.config;
        if c.num_questions == 0 {
            return Err(QuizError::InvalidConfig(
                "Number of questions must be ≥ 1".into(),
            ));
        }
        let mut seen = Vec::with_capacity(c.question_types.len());
        for t in c.question_types.drain(..) {
            if !seen.contains(&t) {
                seen.push(t);
            }
        }
        c.question_types = seen;
        if c.question_types.is_empty() {
            return Err(QuizError::InvalidConfig(
                "At least one question type is required".into(),
            ));
        }
        if c.max_download_bytes == 0 {
            return Err(QuizError::InvalidConfig(
                "max_download_bytes must be ≥ 1".into(),
            ));
        }
        if c.generation.max_output_tokens == 0 {
            return Err(QuizError::InvalidConfig(
                "max_output_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_generation_settings() {
        let config = QuizConfig::default();
        assert_eq!(config.num_questions, 5);
        assert_eq!(
            config.question_types,
            vec![QuestionType::MultipleChoice, QuestionType::TrueFalse]
        );
        assert_eq!(config.generation.temperature, 1.0);
        assert_eq!(config.generation.top_p, 0.95);
        assert_eq!(config.generation.top_k, 40);
        assert_eq!(config.generation.max_output_tokens, 8192);
        assert_eq!(config.validation, ValidationMode::Lenient);
    }

    #[test]
    fn builder_rejects_zero_questions() {
        let err = QuizConfig::builder().num_questions(0).build().unwrap_err();
        assert!(err.to_string().contains("Number of questions"));
    }

    #[test]
    fn builder_rejects_empty_types() {
        let err = QuizConfig::builder()
            .question_types(vec![])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("question type"));
    }

    #[test]
    fn builder_dedups_types_in_order() {
        let config = QuizConfig::builder()
            .question_types(vec![
                QuestionType::TrueFalse,
                QuestionType::MultipleChoice,
                QuestionType::TrueFalse,
            ])
            .build()
            .unwrap();
        assert_eq!(
            config.question_types,
            vec![QuestionType::TrueFalse, QuestionType::MultipleChoice]
        );
    }

    #[test]
    fn builder_clamps_sampling() {
        let config = QuizConfig::builder()
            .temperature(5.0)
            .top_p(1.5)
            .concurrency(0)
            .build()
            .unwrap();
        assert_eq!(config.generation.temperature, 2.0);
        assert_eq!(config.generation.top_p, 1.0);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff_delay_ms(100, 0), 100);
        assert_eq!(backoff_delay_ms(100, 3), 800);
        assert_eq!(backoff_delay_ms(100, 30), MAX_BACKOFF_MS);
        assert_eq!(backoff_delay_ms(1, 64), MAX_BACKOFF_MS);
        assert_eq!(backoff_delay_ms(u64::MAX, 69), MAX_BACKOFF_MS);
        assert_eq!(backoff_delay_ms(0, 69), 0);
    }

    #[test]
    fn builder_rejects_zero_download_cap() {
        let err = QuizConfig::builder().max_download_bytes(0).build().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
        assert_eq!(
            QuizConfig::default().max_download_bytes,
            DEFAULT_MAX_DOWNLOAD_BYTES
        );
    }
}
