//! Quiz persistence.
//!
//! A [`QuizStore`] keeps [`StoredQuiz`] records keyed by `quiz_id` and can
//! list them by source document or by owning user. Writes of an id that is
//! already present are rejected with [`StoreError::DuplicateQuizId`]; nothing
//! is ever overwritten.
//!
//! Two backends ship with the crate:
//!
//! * [`FileQuizStore`]: one pretty-printed JSON file per quiz,
//!   `<dir>/<quiz_id>.json`. Each write goes to a temp file in the same
//!   directory and is then linked into place with no-clobber semantics, so a
//!   concurrent writer of the same id loses cleanly and readers never see a
//!   half-written file.
//! * [`MemoryQuizStore`]: a mutex-guarded map, for tests and embedding.

use crate::config::backoff_delay_ms;
use crate::error::StoreError;
use crate::output::QuizDocument;
use crate::redact::redact_value;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// A persisted quiz: the document plus ownership and bookkeeping fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredQuiz {
    #[serde(flatten)]
    pub quiz: QuizDocument,
    pub user_id: String,
    pub document_name: String,
    /// RFC 3339 timestamp of the write.
    pub stored_at: String,
}

impl StoredQuiz {
    pub fn new(
        quiz: QuizDocument,
        user_id: impl Into<String>,
        document_name: impl Into<String>,
    ) -> Self {
        Self {
            quiz,
            user_id: user_id.into(),
            document_name: document_name.into(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn quiz_id(&self) -> &str {
        &self.quiz.quiz_id
    }

    /// Bookkeeping fields for log lines, with the owner hidden.
    pub fn log_view(&self) -> serde_json::Value {
        redact_value(&serde_json::json!({
            "quiz_id": self.quiz.quiz_id,
            "user_id": self.user_id,
            "document_name": self.document_name,
            "stored_at": self.stored_at,
        }))
    }
}

/// Persistence boundary for generated quizzes.
#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Insert a new record. Fails with `DuplicateQuizId` if the id exists.
    async fn put_quiz(&self, record: &StoredQuiz) -> Result<(), StoreError>;

    /// Fetch one record by id.
    async fn get_quiz(&self, quiz_id: &str) -> Result<Option<StoredQuiz>, StoreError>;

    /// All records generated from `document_name`, oldest first.
    async fn quizzes_by_document(&self, document_name: &str)
        -> Result<Vec<StoredQuiz>, StoreError>;

    /// All records owned by `user_id`, oldest first.
    async fn quizzes_by_user(&self, user_id: &str) -> Result<Vec<StoredQuiz>, StoreError>;
}

/// Write `record`, retrying transient failures with exponential backoff.
///
/// Waits `base_ms * 2^attempt` between attempts. Permanent failures
/// (duplicate id, serialisation) are returned at once.
pub async fn store_with_retry(
    store: &dyn QuizStore,
    record: &StoredQuiz,
    max_retries: u32,
    base_ms: u64,
) -> Result<(), StoreError> {
    let mut attempt = 0u32;
    loop {
        match store.put_quiz(record).await {
            Ok(()) => {
                debug!("Stored quiz after {} attempt(s): {}", attempt + 1, record.log_view());
                return Ok(());
            }
            Err(e) if e.is_transient() && attempt < max_retries => {
                let backoff = backoff_delay_ms(base_ms, attempt);
                warn!(
                    "Store write for {}: retry {}/{} after {}ms ({})",
                    record.quiz_id(),
                    attempt + 1,
                    max_retries,
                    backoff,
                    e
                );
                sleep(Duration::from_millis(backoff)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn oldest_first(mut records: Vec<StoredQuiz>) -> Vec<StoredQuiz> {
    records.sort_by(|a, b| {
        a.stored_at
            .cmp(&b.stored_at)
            .then_with(|| a.quiz.quiz_id.cmp(&b.quiz.quiz_id))
    });
    records
}

// ── File backend ─────────────────────────────────────────────────────────

/// Directory-backed store, one JSON file per quiz.
#[derive(Debug, Clone)]
pub struct FileQuizStore {
    dir: PathBuf,
}

impl FileQuizStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record file for `quiz_id`, or `None` if the id cannot
    /// safely be used as a file name.
    fn record_path(&self, quiz_id: &str) -> Option<PathBuf> {
        let safe = !quiz_id.is_empty()
            && quiz_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        safe.then(|| self.dir.join(format!("{}.json", quiz_id)))
    }

    fn load_all(dir: &Path) -> Result<Vec<StoredQuiz>, StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut records = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_record(&path) {
                Ok(r) => records.push(r),
                Err(e) => warn!("Skipping unreadable quiz record {}: {}", path.display(), e),
            }
        }
        Ok(records)
    }

    async fn query<F>(&self, keep: F) -> Result<Vec<StoredQuiz>, StoreError>
    where
        F: Fn(&StoredQuiz) -> bool + Send + 'static,
    {
        let dir = self.dir.clone();
        let all = run_blocking(&self.dir, move || Self::load_all(&dir)).await?;
        Ok(oldest_first(all.into_iter().filter(|r| keep(r)).collect()))
    }
}

fn read_record(path: &Path) -> Result<StoredQuiz, StoreError> {
    let raw = std::fs::read(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Run blocking file work off the async executor.
async fn run_blocking<T, F>(dir: &Path, work: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StoreError::Io {
            path: dir.to_path_buf(),
            source: std::io::Error::other(format!("store task panicked: {}", e)),
        })?
}

#[async_trait]
impl QuizStore for FileQuizStore {
    async fn put_quiz(&self, record: &StoredQuiz) -> Result<(), StoreError> {
        let quiz_id = record.quiz_id().to_string();
        let target = self.record_path(&quiz_id).ok_or_else(|| StoreError::Io {
            path: self.dir.join(&quiz_id),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "quiz id is not a valid file name",
            ),
        })?;
        let body = serde_json::to_vec_pretty(record)?;
        let dir = self.dir.clone();

        run_blocking(&self.dir, move || {
            let io_err = |path: &Path| {
                let path = path.to_path_buf();
                move |source: std::io::Error| StoreError::Io { path, source }
            };
            let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err(&dir))?;
            tmp.write_all(&body).map_err(io_err(tmp.path()))?;
            tmp.as_file().sync_all().map_err(io_err(tmp.path()))?;
            tmp.persist_noclobber(&target).map_err(|e| {
                if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                    StoreError::DuplicateQuizId { quiz_id }
                } else {
                    StoreError::Io {
                        path: target.clone(),
                        source: e.error,
                    }
                }
            })?;
            debug!("Wrote quiz record {}", target.display());
            Ok(())
        })
        .await
    }

    async fn get_quiz(&self, quiz_id: &str) -> Result<Option<StoredQuiz>, StoreError> {
        let Some(path) = self.record_path(quiz_id) else {
            return Ok(None);
        };
        run_blocking(&self.dir, move || {
            if !path.exists() {
                return Ok(None);
            }
            read_record(&path).map(Some)
        })
        .await
    }

    async fn quizzes_by_document(
        &self,
        document_name: &str,
    ) -> Result<Vec<StoredQuiz>, StoreError> {
        let wanted = document_name.to_string();
        self.query(move |r| r.document_name == wanted).await
    }

    async fn quizzes_by_user(&self, user_id: &str) -> Result<Vec<StoredQuiz>, StoreError> {
        let wanted = user_id.to_string();
        self.query(move |r| r.user_id == wanted).await
    }
}

// ── Memory backend ───────────────────────────────────────────────────────

/// In-process store backed by a map.
#[derive(Debug, Default)]
pub struct MemoryQuizStore {
    records: Mutex<BTreeMap<String, StoredQuiz>>,
}

impl MemoryQuizStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StoredQuiz>> {
        // A panic while holding the lock cannot leave a half-inserted record.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn filtered(&self, keep: impl Fn(&StoredQuiz) -> bool) -> Vec<StoredQuiz> {
        oldest_first(self.lock().values().filter(|r| keep(r)).cloned().collect())
    }
}

#[async_trait]
impl QuizStore for MemoryQuizStore {
    async fn put_quiz(&self, record: &StoredQuiz) -> Result<(), StoreError> {
        let mut records = self.lock();
        if records.contains_key(record.quiz_id()) {
            return Err(StoreError::DuplicateQuizId {
                quiz_id: record.quiz_id().to_string(),
            });
        }
        records.insert(record.quiz_id().to_string(), record.clone());
        Ok(())
    }

    async fn get_quiz(&self, quiz_id: &str) -> Result<Option<StoredQuiz>, StoreError> {
        Ok(self.lock().get(quiz_id).cloned())
    }

    async fn quizzes_by_document(
        &self,
        document_name: &str,
    ) -> Result<Vec<StoredQuiz>, StoreError> {
        Ok(self.filtered(|r| r.document_name == document_name))
    }

    async fn quizzes_by_user(&self, user_id: &str) -> Result<Vec<StoredQuiz>, StoreError> {
        Ok(self.filtered(|r| r.user_id == user_id))
    }
}
