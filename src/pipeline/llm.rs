//! Model interaction: send the quiz prompt, receive the free-text reply.
//!
//! The pipeline talks to the model only through [`QuizModel`]: one rendered
//! prompt in, one reply string out. [`ProviderModel`] adapts any
//! `edgequake_llm` provider; tests plug in a canned fake.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient. Exponential backoff
//! (`retry_backoff_ms * 2^attempt`) spaces the retries out: with a 500 ms base
//! and 3 retries the wait sequence is 500 ms → 1 s → 2 s. The product
//! saturates and a single wait never exceeds
//! [`MAX_BACKOFF_MS`](crate::config::MAX_BACKOFF_MS). A reply that parses into
//! nothing is *not* an error here and is never retried.

use crate::config::{backoff_delay_ms, GenerationParams, QuizConfig};
use crate::error::QuizError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// The model collaborator.
#[async_trait]
pub trait QuizModel: Send + Sync {
    /// Send one prompt and return the complete reply text.
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, String>;
}

/// [`QuizModel`] backed by an `edgequake_llm` provider.
///
/// `temperature` and `max_output_tokens` are forwarded through
/// `CompletionOptions`; `top_p` and `top_k` are left to the provider default.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl QuizModel for ProviderModel {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, String> {
        let messages = vec![ChatMessage::user(prompt)];
        let options = build_options(params);
        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| format!("{}", e))?;
        debug!(
            "Model reply: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Build `CompletionOptions` from the generation parameters.
fn build_options(params: &GenerationParams) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(params.temperature),
        max_tokens: Some(params.max_output_tokens),
        ..Default::default()
    }
}

/// Call the model with retry/backoff on failures.
pub async fn request_quiz(
    model: &dyn QuizModel,
    prompt: &str,
    config: &QuizConfig,
) -> Result<String, QuizError> {
    let start = Instant::now();
    let mut last_err: Option<String> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_delay_ms(config.retry_backoff_ms, attempt - 1);
            warn!(
                "Model call: retry {}/{} after {}ms",
                attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match model.generate(prompt, &config.generation).await {
            Ok(reply) => {
                debug!(
                    "Model call succeeded after {} attempt(s): {} chars in {:?}",
                    attempt + 1,
                    reply.len(),
                    start.elapsed()
                );
                return Ok(reply);
            }
            Err(e) => {
                warn!("Model call: attempt {} failed: {}", attempt + 1, e);
                last_err = Some(e);
            }
        }
    }

    Err(QuizError::ModelFailed {
        retries: config.max_retries,
        message: last_err.unwrap_or_else(|| "Unknown error".to_string()),
    })
}

/// Default model for a named provider.
fn default_model_for(provider_name: &str) -> &'static str {
    match provider_name {
        "gemini" | "google" => "gemini-2.0-flash-lite",
        "anthropic" => "claude-haiku-4-20250514",
        _ => "gpt-4.1-nano",
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, QuizError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        QuizError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the API key is
///    read from the provider's usual environment variable.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **`OPENAI_API_KEY`** present → OpenAI.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`), which also picks
///    up `GEMINI_API_KEY` and `ANTHROPIC_API_KEY`.
pub fn resolve_provider(config: &QuizConfig) -> Result<Arc<dyn LLMProvider>, QuizError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config
            .model
            .as_deref()
            .unwrap_or_else(|| default_model_for(name));
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| QuizError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, GEMINI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails `failures` times, then replies with `reply`.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
        reply: &'static str,
    }

    #[async_trait]
    impl QuizModel for Flaky {
        async fn generate(&self, _prompt: &str, _p: &GenerationParams) -> Result<String, String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(format!("503 overloaded (call {})", n + 1))
            } else {
                Ok(self.reply.to_string())
            }
        }
    }

    fn fast_config(max_retries: u32) -> QuizConfig {
        QuizConfig::builder()
            .max_retries(max_retries)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    #[test]
    fn build_options_forwards_sampling() {
        let opts = build_options(&GenerationParams::default());
        assert_eq!(opts.temperature, Some(1.0));
        assert_eq!(opts.max_tokens, Some(8192));
    }

    #[test]
    fn default_models() {
        assert_eq!(default_model_for("gemini"), "gemini-2.0-flash-lite");
        assert_eq!(default_model_for("openai"), "gpt-4.1-nano");
    }

    #[tokio::test]
    async fn request_retries_transient_failures() {
        let model = Flaky {
            failures: 2,
            calls: AtomicUsize::new(0),
            reply: "Q: ok",
        };
        let reply = request_quiz(&model, "prompt", &fast_config(3)).await.unwrap();
        assert_eq!(reply, "Q: ok");
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn request_gives_up_after_max_retries() {
        let model = Flaky {
            failures: usize::MAX,
            calls: AtomicUsize::new(0),
            reply: "",
        };
        let err = request_quiz(&model, "prompt", &fast_config(1)).await.unwrap_err();
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
        assert_eq!(err.kind(), crate::error::ErrorKind::Model);
        assert!(err.to_string().contains("503 overloaded (call 2)"), "got: {err}");
    }

    #[tokio::test]
    async fn empty_reply_is_not_retried() {
        let model = Flaky {
            failures: 0,
            calls: AtomicUsize::new(0),
            reply: "",
        };
        let reply = request_quiz(&model, "prompt", &fast_config(3)).await.unwrap();
        assert!(reply.is_empty());
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn large_retry_count_fails_cleanly() {
        let model = Flaky {
            failures: usize::MAX,
            calls: AtomicUsize::new(0),
            reply: "",
        };
        let config = QuizConfig::builder()
            .max_retries(70)
            .retry_backoff_ms(0)
            .build()
            .unwrap();
        let err = request_quiz(&model, "prompt", &config).await.unwrap_err();
        assert!(matches!(err, QuizError::ModelFailed { retries: 70, .. }), "got: {err}");
        assert_eq!(model.calls.load(Ordering::SeqCst), 71);
    }
}
