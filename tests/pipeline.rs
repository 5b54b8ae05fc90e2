//! Integration tests for the full quiz pipeline with in-process fakes.
//!
//! The model and the PDF engine are replaced by canned implementations of
//! `QuizModel` and `TextExtractor`, so these tests need neither an API key
//! nor a pdfium library. Local inputs are real temp files carrying a `%PDF`
//! header so input resolution runs unchanged.

use async_trait::async_trait;
use edgequake_pdf2quiz::pipeline::input::PdfSource;
use edgequake_pdf2quiz::{
    generate_batch, BatchItem, BatchProgressCallback, ErrorKind, FileQuizStore, GenerationParams,
    MemoryQuizStore, QuestionType, QuizConfig, QuizError, QuizGenerator, QuizModel,
    QuizStatus, QuizStore, StoreTarget, TextExtractor, ValidationMode,
};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const SKY_REPLY: &str = "Q: What color is the sky?\n\
Type: multiple_choice\n\
Options: Blue, Red, Green, Yellow\n\
A: Blue\n\
Explanation: Rayleigh scattering\n\
\n\
Q: The sky is blue.\n\
Type: true_false\n\
A: True\n\
Explanation: Observed fact";

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Replies with a fixed text, or fails every call when `reply` is `Err`.
struct CannedModel {
    reply: Result<String, String>,
    calls: AtomicUsize,
}

impl CannedModel {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl QuizModel for CannedModel {
    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

/// Returns the same page texts for every document.
struct FixedPages(Vec<&'static str>);

impl TextExtractor for FixedPages {
    fn page_texts(&self, _source: &PdfSource) -> Result<Vec<String>, QuizError> {
        Ok(self.0.iter().map(|s| s.to_string()).collect())
    }
}

/// Fails every document as unparseable.
struct CorruptExtractor;

impl TextExtractor for CorruptExtractor {
    fn page_texts(&self, source: &PdfSource) -> Result<Vec<String>, QuizError> {
        Err(QuizError::CorruptPdf {
            source_name: source.display_name(),
            detail: "trailer not found".into(),
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn write_pdf(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"%PDF-1.7\n%stub body\n").unwrap();
    path
}

fn fast_config() -> QuizConfig {
    QuizConfig::builder()
        .num_questions(2)
        .max_retries(1)
        .retry_backoff_ms(1)
        .build()
        .unwrap()
}

fn generator_with(config: QuizConfig, model: Arc<CannedModel>) -> QuizGenerator {
    QuizGenerator::with_model(config, model)
        .with_extractor(Arc::new(FixedPages(vec!["The sky ", "", "is blue."])))
}

/// Route library logs to the test harness; `RUST_LOG=debug` shows them.
fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn quiz_id_pattern() -> Regex {
    Regex::new(r"^quiz_\d{8}_\d{6}_[0-9a-f]{8}$").unwrap()
}

// ── Single document ──────────────────────────────────────────────────────────

#[tokio::test]
async fn reference_reply_produces_documented_quiz() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path(), "sky.pdf");
    let gen = generator_with(fast_config(), CannedModel::replying(SKY_REPLY));

    let outcome = gen.generate(pdf.to_str().unwrap()).await;
    let doc = outcome.document().expect("expected a quiz");

    assert_eq!(doc.status, QuizStatus::Success);
    assert_eq!(doc.source_document, "sky.pdf");
    assert!(quiz_id_pattern().is_match(&doc.quiz_id), "id: {}", doc.quiz_id);
    assert_eq!(doc.metadata.number_of_questions, 2);
    assert_eq!(
        doc.metadata.question_types_requested,
        vec![QuestionType::MultipleChoice, QuestionType::TrueFalse]
    );

    let mc = &doc.questions[0];
    assert_eq!(mc.question_id, "1");
    assert_eq!(mc.question_type, QuestionType::MultipleChoice);
    assert_eq!(mc.options, vec!["Blue", "Red", "Green", "Yellow"]);
    assert_eq!(mc.correct_answer, "Blue");

    let tf = &doc.questions[1];
    assert_eq!(tf.question_id, "2");
    assert_eq!(tf.question_type, QuestionType::TrueFalse);
    assert_eq!(tf.options, vec!["True", "False"]);
    assert_eq!(tf.correct_answer, "True");
    assert_eq!(tf.metadata.difficulty, "medium");
    assert_eq!(tf.metadata.topic, "general");
}

#[tokio::test]
async fn outcome_serialises_to_documented_shape() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path(), "sky.pdf");
    let gen = generator_with(fast_config(), CannedModel::replying(SKY_REPLY));

    let outcome = gen.generate(pdf.to_str().unwrap()).await;
    let json: serde_json::Value = serde_json::from_str(&outcome.to_json_pretty().unwrap()).unwrap();

    assert_eq!(json["status"], "success");
    assert_eq!(json["metadata"]["number_of_questions"], 2);
    assert_eq!(json["questions"][0]["question_type"], "multiple_choice");
    assert_eq!(json["questions"][1]["options"], serde_json::json!(["True", "False"]));
    assert_eq!(json["questions"][1]["metadata"]["difficulty"], "medium");
}

#[tokio::test]
async fn reply_without_markers_is_empty_success() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path(), "notes.pdf");
    let gen = generator_with(
        fast_config(),
        CannedModel::replying("I could not find enough material for a quiz."),
    );

    let outcome = gen.generate(pdf.to_str().unwrap()).await;
    let doc = outcome.document().expect("empty quiz is still a success");
    assert!(doc.questions.is_empty());
    assert_eq!(doc.metadata.number_of_questions, 0);

    let err = doc.clone().into_result().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
}

#[tokio::test]
async fn extraction_failure_is_one_envelope_and_skips_model() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path(), "broken.pdf");
    let model = CannedModel::replying(SKY_REPLY);
    let gen = QuizGenerator::with_model(fast_config(), model.clone())
        .with_extractor(Arc::new(CorruptExtractor));

    let outcome = gen.generate(pdf.to_str().unwrap()).await;
    let env = outcome.error().expect("expected an envelope");
    assert_eq!(env.status, QuizStatus::Error);
    assert!(env.error_message.contains("trailer not found"));
    assert_eq!(env.metadata.source_document, "broken.pdf");
    assert!(!env.metadata.timestamp.is_empty());
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);

    let err = gen.try_generate(pdf.to_str().unwrap()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Extraction);
}

#[tokio::test]
async fn model_failure_is_retried_then_enveloped() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path(), "sky.pdf");
    let model = CannedModel::failing("RESOURCE_EXHAUSTED: quota exceeded");
    let gen = generator_with(fast_config(), model.clone());

    let outcome = gen.generate(pdf.to_str().unwrap()).await;
    let env = outcome.error().expect("expected an envelope");
    assert!(env.error_message.contains("quota exceeded"));
    // one attempt plus one retry
    assert_eq!(model.calls.load(Ordering::SeqCst), 2);

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["status"], "error");
    assert!(json.get("questions").is_none());
}

#[tokio::test]
async fn long_retry_budget_still_yields_envelope() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path(), "sky.pdf");
    let model = CannedModel::failing("503 overloaded");
    let config = QuizConfig::builder()
        .max_retries(70)
        .retry_backoff_ms(0)
        .build()
        .unwrap();
    let gen = generator_with(config, model.clone());

    let outcome = gen.generate(pdf.to_str().unwrap()).await;
    let env = outcome.error().expect("expected an envelope");
    assert!(env.error_message.contains("503 overloaded"), "{}", env.error_message);
    assert_eq!(model.calls.load(Ordering::SeqCst), 71);
}

#[tokio::test]
async fn non_pdf_input_is_enveloped() {
    let dir = tempfile::tempdir().unwrap();
    let html = dir.path().join("page.pdf");
    std::fs::write(&html, b"<!doctype html><p>login</p>").unwrap();
    let gen = generator_with(fast_config(), CannedModel::replying(SKY_REPLY));

    let err = gen.try_generate(html.to_str().unwrap()).await.unwrap_err();
    assert!(matches!(err, QuizError::NotAPdf { .. }));
    assert!(!gen.generate(html.to_str().unwrap()).await.is_success());
}

#[tokio::test]
async fn quizzes_in_the_same_second_get_distinct_ids() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path(), "sky.pdf");
    let input = pdf.to_str().unwrap();
    let gen = generator_with(fast_config(), CannedModel::replying(SKY_REPLY));

    let (a, b) = tokio::join!(gen.try_generate(input), gen.try_generate(input));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.quiz_id, b.quiz_id);
    assert!(quiz_id_pattern().is_match(&a.quiz_id));
    assert!(quiz_id_pattern().is_match(&b.quiz_id));
}

#[tokio::test]
async fn strict_mode_keeps_only_valid_questions() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path(), "sky.pdf");
    let reply = format!(
        "{SKY_REPLY}\n\
         Q: Which gas dominates air?\nType: multiple_choice\nOptions: N2, O2, Ar, CO2\nA: Helium\nExplanation: x\n\
         Q: Truncated question"
    );
    let config = QuizConfig::builder()
        .validation(ValidationMode::Strict)
        .retry_backoff_ms(1)
        .build()
        .unwrap();
    let gen = generator_with(config, CannedModel::replying(&reply));

    let doc = gen.try_generate(pdf.to_str().unwrap()).await.unwrap();
    assert_eq!(doc.metadata.number_of_questions, 2);
    assert!(doc.questions.iter().all(|q| q.answer_in_options()));
}

#[test]
fn extract_text_only_runs_without_model_calls() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path(), "sky.pdf");
    let model = CannedModel::replying(SKY_REPLY);
    let gen = generator_with(fast_config(), model.clone());

    let text = tokio_test::block_on(gen.extract_text(pdf.to_str().unwrap())).unwrap();
    assert_eq!(text, "The sky is blue.");
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

// ── Batch ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    completed: Mutex<Vec<usize>>,
    errored: Mutex<Vec<usize>>,
    finished: Mutex<Option<(usize, usize)>>,
}

impl BatchProgressCallback for Recorder {
    fn on_document_complete(&self, index: usize, _total: usize, _n: usize) {
        self.completed.lock().unwrap().push(index);
    }
    fn on_document_error(&self, index: usize, _total: usize, _error: &str) {
        self.errored.lock().unwrap().push(index);
    }
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        *self.finished.lock().unwrap() = Some((total, success_count));
    }
}

#[tokio::test]
async fn batch_isolates_failures_and_persists_successes() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();
    let a = write_pdf(dir.path(), "a.pdf");
    let c = write_pdf(dir.path(), "c.pdf");
    let missing = dir.path().join("b.pdf");

    let recorder = Arc::new(Recorder::default());
    let config = QuizConfig::builder()
        .concurrency(3)
        .retry_backoff_ms(1)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let gen = generator_with(config, CannedModel::replying(SKY_REPLY));
    let store = MemoryQuizStore::new();

    let items = vec![
        BatchItem::new(a.to_str().unwrap()),
        BatchItem::new(missing.to_str().unwrap()),
        BatchItem::new(c.to_str().unwrap()).with_document_name("chapter-3"),
    ];
    let summary = generate_batch(
        &gen,
        items,
        Some(StoreTarget {
            store: &store,
            user_id: "alice",
        }),
    )
    .await;

    assert_eq!(summary.status_code(), 207);
    assert_eq!(summary.successful.len(), 2);
    assert_eq!(summary.successful[0].source_document, "a.pdf");
    assert_eq!(summary.successful[1].source_document, "c.pdf");

    assert_eq!(summary.failed.len(), 1);
    let failure = &summary.failed[0];
    assert_eq!(failure.record_index, 2);
    assert_eq!(failure.document_name, "b.pdf");
    assert!(failure.error.contains("not found"), "got: {}", failure.error);

    assert_eq!(store.len(), 2);
    assert_eq!(store.quizzes_by_user("alice").await.unwrap().len(), 2);
    let chapter = store.quizzes_by_document("chapter-3").await.unwrap();
    assert_eq!(chapter.len(), 1);
    assert_eq!(chapter[0].quiz, summary.successful[1]);

    let mut completed = recorder.completed.lock().unwrap().clone();
    completed.sort();
    assert_eq!(completed, vec![0, 2]);
    assert_eq!(*recorder.errored.lock().unwrap(), vec![1]);
    assert_eq!(*recorder.finished.lock().unwrap(), Some((3, 2)));
}

#[tokio::test]
async fn batch_of_successes_is_status_200_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let inputs: Vec<PathBuf> = (0..4)
        .map(|i| write_pdf(dir.path(), &format!("doc{i}.pdf")))
        .collect();
    let store_dir = dir.path().join("quizzes");
    let store = FileQuizStore::open(&store_dir).unwrap();
    let gen = generator_with(fast_config(), CannedModel::replying(SKY_REPLY));

    let items = inputs
        .iter()
        .map(|p| BatchItem::new(p.to_str().unwrap()))
        .collect();
    let summary = generate_batch(
        &gen,
        items,
        Some(StoreTarget {
            store: &store,
            user_id: "default_user",
        }),
    )
    .await;

    assert_eq!(summary.status_code(), 200);
    let names: Vec<&str> = summary
        .successful
        .iter()
        .map(|d| d.source_document.as_str())
        .collect();
    assert_eq!(names, vec!["doc0.pdf", "doc1.pdf", "doc2.pdf", "doc3.pdf"]);

    let files = std::fs::read_dir(&store_dir).unwrap().count();
    assert_eq!(files, 4);
    for doc in &summary.successful {
        let stored = store.get_quiz(&doc.quiz_id).await.unwrap().unwrap();
        assert_eq!(&stored.quiz, doc);
    }
}

#[tokio::test]
async fn batch_failure_hides_url_signature() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let url = format!("http://{addr}/notes.pdf?X-Amz-Credential=AKIAXYZ&X-Amz-Signature=s3cr3t");

    let gen = generator_with(fast_config(), CannedModel::replying(SKY_REPLY));
    let summary = generate_batch(&gen, vec![BatchItem::new(url)], None).await;

    assert_eq!(summary.status_code(), 207);
    let failure = &summary.failed[0];
    for field in [&failure.source, &failure.error] {
        assert!(!field.contains("s3cr3t"), "leaked: {field}");
        assert!(!field.contains("AKIAXYZ"), "leaked: {field}");
    }
}

#[tokio::test]
async fn batch_without_store_returns_quizzes() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_pdf(dir.path(), "a.pdf");
    let gen = generator_with(fast_config(), CannedModel::replying(SKY_REPLY));

    let summary = generate_batch(&gen, vec![BatchItem::new(a.to_str().unwrap())], None).await;
    assert_eq!(summary.status_code(), 200);
    assert_eq!(summary.successful[0].questions.len(), 2);
}
