//! CLI binary for edgequake-pdf2quiz.
//!
//! A thin shim over the library crate that maps CLI flags to `QuizConfig`,
//! runs one document or a batch, and prints JSON results to stdout.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2quiz::batch::STORE_RETRY_BASE_MS;
use edgequake_pdf2quiz::config::DEFAULT_MAX_DOWNLOAD_BYTES;
use edgequake_pdf2quiz::output::source_label;
use edgequake_pdf2quiz::store::store_with_retry;
use edgequake_pdf2quiz::{
    extract_text, generate_batch, BatchItem, BatchProgressCallback, ErrorEnvelope,
    FileQuizStore, ProgressCallback, QuestionType, QuizConfig, QuizError, QuizGenerator, QuizOutcome,
    StoreTarget, StoredQuiz, ValidationMode,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the batch plus a log line per
/// document. Documents may finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Generating");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .map(|mut m| m.remove(&index))
            .ok()
            .flatten()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Generating quizzes for {total} document(s)…"))
        ));
    }

    fn on_document_start(&self, index: usize, _total: usize, source: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(source.to_string());
    }

    fn on_document_complete(&self, index: usize, total: usize, num_questions: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} Document {:>3}/{:<3}  {:<14}  {}",
            green("✓"),
            index + 1,
            total,
            dim(&format!("{num_questions:>3} questions")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(index);
        let first_line = error.lines().next().unwrap_or_default();
        let msg: String = if first_line.chars().count() > 80 {
            first_line.chars().take(79).chain(['…']).collect()
        } else {
            first_line.to_string()
        };
        self.bar.println(format!(
            "  {} Document {:>3}/{:<3}  {}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let failed = total.saturating_sub(success_count);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} quizzes generated",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} quizzes generated  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Five mixed questions from a local file
  pdf2quiz lecture.pdf

  # Ten multiple-choice questions only
  pdf2quiz -n 10 --types multiple_choice lecture.pdf

  # From a (presigned) URL
  pdf2quiz "https://bucket.s3.amazonaws.com/notes.pdf?X-Amz-Signature=..."

  # Batch, persisted to a directory
  pdf2quiz --store-dir ./quizzes --user-id alice a.pdf b.pdf c.pdf

  # Drop questions whose answer is not one of the options
  pdf2quiz --strict lecture.pdf

  # Show the extracted text only (no API key needed)
  pdf2quiz --extract-only lecture.pdf

OUTPUT:
  One input prints a quiz document, or an error envelope
  ({"status": "error", "error_message": ..., "metadata": {...}}).
  Several inputs print {"status_code": 200|207, "successful": [...], "failed": [...]}.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium
  RUST_LOG                Log filter, overrides --verbose / --quiet

  Variables are also read from a .env file in the working directory.
"#;

/// Generate quizzes from PDF files and URLs using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2quiz",
    version,
    about = "Generate quizzes from PDF files and URLs using LLMs",
    long_about = "Extract the text of PDF documents (local files or URLs) and ask an LLM for \
multiple-choice and true/false questions about it. Supports OpenAI, Anthropic, Google Gemini, \
and any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Number of questions to request per document.
    #[arg(short = 'n', long, env = "PDF2QUIZ_NUM_QUESTIONS", default_value_t = 5,
          value_parser = clap::value_parser!(u32).range(1..))]
    num_questions: u32,

    /// Question types, comma-separated: multiple_choice, true_false.
    #[arg(long, env = "PDF2QUIZ_TYPES", value_delimiter = ',',
          default_value = "multiple_choice,true_false")]
    types: Vec<QuestionType>,

    /// LLM model ID (e.g. gpt-4.1-nano, gemini-2.0-flash-lite).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "PDF2QUIZ_TEMPERATURE", default_value_t = 1.0)]
    temperature: f32,

    /// Nucleus sampling mass (0.0–1.0).
    #[arg(long, env = "PDF2QUIZ_TOP_P", default_value_t = 0.95)]
    top_p: f32,

    /// Top-k sampling cutoff.
    #[arg(long, env = "PDF2QUIZ_TOP_K", default_value_t = 40)]
    top_k: u32,

    /// Max LLM output tokens.
    #[arg(long, env = "PDF2QUIZ_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Retries on LLM (and store) failure.
    #[arg(long, env = "PDF2QUIZ_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Drop partial questions and answers that are not among the options.
    #[arg(long, env = "PDF2QUIZ_STRICT")]
    strict: bool,

    /// Persist successful quizzes as JSON files in this directory.
    #[arg(long, env = "PDF2QUIZ_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// Owner recorded with persisted quizzes.
    #[arg(long, env = "PDF2QUIZ_USER_ID", default_value = "default_user")]
    user_id: String,

    /// Documents processed concurrently in a batch.
    #[arg(short, long, env = "PDF2QUIZ_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2QUIZ_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Largest PDF accepted from a URL, in bytes.
    #[arg(long, env = "PDF2QUIZ_MAX_DOWNLOAD_BYTES", default_value_t = DEFAULT_MAX_DOWNLOAD_BYTES)]
    max_download_bytes: u64,

    /// Print the extracted text only, no quiz.
    #[arg(long)]
    extract_only: bool,

    /// Single-line JSON instead of pretty-printed.
    #[arg(long, env = "PDF2QUIZ_COMPACT")]
    compact: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2QUIZ_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2QUIZ_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2QUIZ_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level chatter during batches.
    let is_batch = cli.inputs.len() > 1;
    let show_progress = is_batch && !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let config = build_config(&cli, None)?;
        for input in &cli.inputs {
            let text = extract_text(input, &config)
                .await
                .with_context(|| format!("Failed to extract text from {input}"))?;
            if is_batch {
                println!("{}", bold(&format!("── {input} ──")));
            }
            println!("{text}");
        }
        return Ok(());
    }

    // ── Build config and generator ───────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    let store = match cli.store_dir {
        Some(ref dir) => Some(
            FileQuizStore::open(dir)
                .with_context(|| format!("Failed to open quiz store at {}", dir.display()))?,
        ),
        None => None,
    };

    let generator = match QuizGenerator::new(config) {
        Ok(g) => g,
        Err(e) => {
            // Same shape as any other pipeline failure.
            for input in &cli.inputs {
                let envelope = ErrorEnvelope::from_error(&e, source_label(input));
                print_json(&envelope, cli.compact)?;
            }
            std::process::exit(1);
        }
    };

    // ── Single document ──────────────────────────────────────────────────
    if !is_batch {
        let input = &cli.inputs[0];
        let start = Instant::now();
        let mut outcome = generator.generate(input).await;

        if let (Some(store), QuizOutcome::Success(doc)) = (store.as_ref(), &outcome) {
            let record = StoredQuiz::new(doc.clone(), cli.user_id.as_str(), source_label(input));
            if let Err(e) =
                store_with_retry(store, &record, cli.max_retries, STORE_RETRY_BASE_MS).await
            {
                let err = QuizError::Internal(format!(
                    "Quiz generated but could not be stored: {e}"
                ));
                outcome = QuizOutcome::Error(ErrorEnvelope::from_error(&err, source_label(input)));
            }
        }

        print_json(&outcome, cli.compact)?;

        if !cli.quiet {
            match &outcome {
                QuizOutcome::Success(doc) => eprintln!(
                    "{}  {} questions  {}ms  →  {}",
                    green("✔"),
                    doc.metadata.number_of_questions,
                    start.elapsed().as_millis(),
                    bold(&doc.quiz_id),
                ),
                QuizOutcome::Error(env) => eprintln!("{}  {}", red("✘"), env.error_message),
            }
        }
        if !outcome.is_success() {
            std::process::exit(1);
        }
        return Ok(());
    }

    // ── Batch ────────────────────────────────────────────────────────────
    let items: Vec<BatchItem> = cli.inputs.iter().map(BatchItem::new).collect();
    let target = store.as_ref().map(|s| StoreTarget {
        store: s,
        user_id: cli.user_id.as_str(),
    });
    let summary = generate_batch(&generator, items, target).await;

    let body = serde_json::json!({
        "status_code": summary.status_code(),
        "successful": summary.successful,
        "failed": summary.failed,
    });
    print_json(&body, cli.compact)?;

    if !cli.quiet && !show_progress {
        eprintln!(
            "Generated {}/{} quizzes",
            summary.successful.len(),
            summary.total()
        );
    }
    if summary.status_code() != 200 {
        std::process::exit(1);
    }
    Ok(())
}

/// Map CLI args to `QuizConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<QuizConfig> {
    let mut builder = QuizConfig::builder()
        .num_questions(cli.num_questions as usize)
        .question_types(cli.types.clone())
        .temperature(cli.temperature)
        .top_p(cli.top_p)
        .top_k(cli.top_k)
        .max_output_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .concurrency(cli.concurrency)
        .download_timeout_secs(cli.download_timeout)
        .max_download_bytes(cli.max_download_bytes)
        .validation(if cli.strict {
            ValidationMode::Strict
        } else {
            ValidationMode::Lenient
        });

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_json<T: serde::Serialize>(value: &T, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .context("Failed to serialise output")?;
    println!("{json}");
    Ok(())
}
