//! Response parsing: the model's free-text reply → ordered question records.
//!
//! The reply is scanned line by line. Each trimmed line is attributed to a
//! question field by its marker prefix:
//!
//! | Marker         | Effect                                                   |
//! |----------------|----------------------------------------------------------|
//! | `Q:`           | flush the open record, open a new one with the text      |
//! | `Type:`        | set the lower-cased type                                 |
//! | `Options:`     | comma-split options, only once the type is multiple_choice |
//! | `A:`           | set the correct answer                                   |
//! | `Explanation:` | set the explanation                                      |
//!
//! Blank lines and unrecognised lines are ignored, as are field lines seen
//! before the first `Q:`. Missing markers leave fields absent; the parser never
//! fails. Whether a record carried every field is reported through
//! [`ParsedQuestion::completeness`].

use serde::{Deserialize, Serialize};

const MARK_QUESTION: &str = "Q:";
const MARK_TYPE: &str = "Type:";
const MARK_OPTIONS: &str = "Options:";
const MARK_ANSWER: &str = "A:";
const MARK_EXPLANATION: &str = "Explanation:";

/// One question record as read from the reply, before normalisation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedQuestion {
    pub question_text: String,
    pub question_type: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<String>,
    pub explanation: Option<String>,
}

/// Whether a parsed record carried every expected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completeness {
    /// Type, answer and explanation present, plus options for multiple choice.
    Complete,
    /// At least one expected field was never supplied.
    Partial { missing: Vec<&'static str> },
}

impl ParsedQuestion {
    fn new(question_text: &str) -> Self {
        Self {
            question_text: question_text.to_string(),
            ..Default::default()
        }
    }

    /// Whether the type line names multiple choice.
    pub fn is_multiple_choice(&self) -> bool {
        self.question_type
            .as_deref()
            .is_some_and(|t| t.contains("multiple_choice"))
    }

    /// Classify the record as complete or partial.
    pub fn completeness(&self) -> Completeness {
        let mut missing = Vec::new();
        if self.question_type.is_none() {
            missing.push("question_type");
        }
        if self.is_multiple_choice() && self.options.is_none() {
            missing.push("options");
        }
        if self.correct_answer.is_none() {
            missing.push("correct_answer");
        }
        if self.explanation.is_none() {
            missing.push("explanation");
        }
        if missing.is_empty() {
            Completeness::Complete
        } else {
            Completeness::Partial { missing }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completeness() == Completeness::Complete
    }
}

/// Parse a raw model reply into question records, in first-seen order.
pub fn parse_quiz_response(response: &str) -> Vec<ParsedQuestion> {
    let mut questions = Vec::new();
    let mut current: Option<ParsedQuestion> = None;

    for line in response.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix(MARK_QUESTION) {
            if let Some(done) = current.take() {
                questions.push(done);
            }
            current = Some(ParsedQuestion::new(rest.trim()));
            continue;
        }

        // Field lines only attach to an open record.
        let Some(q) = current.as_mut() else {
            continue;
        };

        if let Some(rest) = line.strip_prefix(MARK_TYPE) {
            q.question_type = Some(rest.trim().to_lowercase());
        } else if let Some(rest) = line.strip_prefix(MARK_OPTIONS) {
            if q.is_multiple_choice() {
                q.options = Some(split_options(rest));
            }
        } else if let Some(rest) = line.strip_prefix(MARK_ANSWER) {
            q.correct_answer = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix(MARK_EXPLANATION) {
            q.explanation = Some(rest.trim().to_string());
        }
    }

    if let Some(done) = current {
        questions.push(done);
    }

    questions
}

fn split_options(raw: &str) -> Vec<String> {
    raw.split(',').map(|o| o.trim().to_string()).collect()
}
