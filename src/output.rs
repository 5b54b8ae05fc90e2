//! Output types: the quiz document, its questions, and the error envelope.
//!
//! Every pipeline run ends in exactly one [`QuizOutcome`]: either a fully
//! assembled [`QuizDocument`] or an [`ErrorEnvelope`]. The two are never mixed,
//! and both serialise to a single top-level JSON object.

use crate::error::QuizError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Question flavours the model may be asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Four options, one correct.
    MultipleChoice,
    /// The canonical `True` / `False` pair.
    TrueFalse,
}

impl QuestionType {
    /// Wire tag used in prompts and JSON (`multiple_choice`, `true_false`).
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = QuizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "multiple_choice" | "mc" => Ok(QuestionType::MultipleChoice),
            "true_false" | "tf" => Ok(QuestionType::TrueFalse),
            other => Err(QuizError::InvalidConfig(format!(
                "Unknown question type '{other}' (expected multiple_choice or true_false)"
            ))),
        }
    }
}

/// Canonical options of every true/false question.
pub const TRUE_FALSE_OPTIONS: [&str; 2] = ["True", "False"];

/// `status` field shared by documents and envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizStatus {
    Success,
    Error,
}

/// A normalised, persistence-ready quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizDocument {
    pub quiz_id: String,
    pub status: QuizStatus,
    /// The URL as given, or only the file name for local sources.
    pub source_document: String,
    pub metadata: QuizMetadata,
    pub questions: Vec<QuizQuestion>,
}

/// Document-level generation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizMetadata {
    /// RFC 3339 timestamp of assembly.
    pub generated_at: String,
    /// Count of assembled questions (not the requested count).
    pub number_of_questions: usize,
    pub question_types_requested: Vec<QuestionType>,
}

/// One assembled question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    /// 1-based position within the document, as a string.
    pub question_id: String,
    pub question_text: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
    pub metadata: QuestionMetadata,
}

impl QuizQuestion {
    /// Whether `correct_answer` is literally one of `options`.
    pub fn answer_in_options(&self) -> bool {
        self.options.iter().any(|o| o == &self.correct_answer)
    }
}

/// Per-question metadata. Values are placeholders; no inference is performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionMetadata {
    pub difficulty: String,
    pub topic: String,
}

impl Default for QuestionMetadata {
    fn default() -> Self {
        Self {
            difficulty: "medium".to_string(),
            topic: "general".to_string(),
        }
    }
}

impl QuizDocument {
    /// Treat an empty question list as [`QuizError::MalformedResponse`].
    ///
    /// The pipeline itself accepts an empty quiz; this is for callers that
    /// want the stricter reading.
    pub fn into_result(self) -> Result<QuizDocument, QuizError> {
        if self.questions.is_empty() {
            Err(QuizError::MalformedResponse {
                source_name: self.source_document,
            })
        } else {
            Ok(self)
        }
    }
}

/// Uniform failure object returned in place of a [`QuizDocument`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub status: QuizStatus,
    pub error_message: String,
    pub metadata: ErrorMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetadata {
    pub source_document: String,
    /// RFC 3339 timestamp of the failure.
    pub timestamp: String,
}

impl ErrorEnvelope {
    /// Build an envelope from any pipeline error.
    pub fn from_error(error: &QuizError, source_document: impl Into<String>) -> Self {
        let mut message = error.to_string();
        if message.trim().is_empty() {
            message = format!("{:?}", error.kind());
        }
        Self {
            status: QuizStatus::Error,
            error_message: message,
            metadata: ErrorMetadata {
                source_document: source_document.into(),
                timestamp: chrono::Utc::now().to_rfc3339(),
            },
        }
    }
}

/// Result of one pipeline run: success or error, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuizOutcome {
    Success(QuizDocument),
    Error(ErrorEnvelope),
}

impl QuizOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, QuizOutcome::Success(_))
    }

    /// The assembled quiz, if the run succeeded.
    pub fn document(&self) -> Option<&QuizDocument> {
        match self {
            QuizOutcome::Success(doc) => Some(doc),
            QuizOutcome::Error(_) => None,
        }
    }

    /// The failure, if the run failed.
    pub fn error(&self) -> Option<&ErrorEnvelope> {
        match self {
            QuizOutcome::Success(_) => None,
            QuizOutcome::Error(env) => Some(env),
        }
    }

    /// Pretty-printed JSON of whichever variant this is.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Label recorded as `source_document`: URLs verbatim, paths reduced to the file name.
pub fn source_label(input: &str) -> String {
    if crate::pipeline::input::is_url(input) {
        return input.to_string();
    }
    std::path::Path::new(input)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.to_string())
}
