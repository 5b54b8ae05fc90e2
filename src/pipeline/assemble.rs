//! Quiz assembly: parsed records → normalised [`QuizDocument`].
//!
//! Assembly assigns 1-based question ids, applies type-conditional option
//! defaults (true/false questions always get the canonical pair, whatever the
//! model wrote), fills in placeholder question metadata, and stamps the
//! document with a second-precision `quiz_id`.
//!
//! The `quiz_id` produced here is *not* unique across runs that finish within
//! the same second. [`make_unique_quiz_id`] must be applied before a document
//! leaves the orchestrator.

use crate::config::ValidationMode;
use crate::output::{
    QuestionMetadata, QuestionType, QuizDocument, QuizMetadata, QuizQuestion, QuizStatus,
    TRUE_FALSE_OPTIONS,
};
use crate::pipeline::parse::{Completeness, ParsedQuestion};
use chrono::{DateTime, Utc};
use tracing::warn;

/// Build a quiz document from parsed records.
pub fn assemble_quiz(
    parsed: Vec<ParsedQuestion>,
    source_document: &str,
    requested_types: &[QuestionType],
    validation: ValidationMode,
) -> QuizDocument {
    assemble_quiz_at(parsed, source_document, requested_types, validation, Utc::now())
}

/// [`assemble_quiz`] with an explicit clock.
pub fn assemble_quiz_at(
    parsed: Vec<ParsedQuestion>,
    source_document: &str,
    requested_types: &[QuestionType],
    validation: ValidationMode,
    now: DateTime<Utc>,
) -> QuizDocument {
    let admitted: Vec<ParsedQuestion> = match validation {
        ValidationMode::Lenient => parsed,
        ValidationMode::Strict => parsed
            .into_iter()
            .filter(|q| match q.completeness() {
                Completeness::Complete => true,
                Completeness::Partial { missing } => {
                    warn!(
                        "Dropping partial question {:?}: missing {}",
                        q.question_text,
                        missing.join(", ")
                    );
                    false
                }
            })
            .collect(),
    };

    let mut questions: Vec<QuizQuestion> = admitted.into_iter().map(normalise_question).collect();

    if validation == ValidationMode::Strict {
        questions.retain(|q| {
            let ok = q.answer_in_options();
            if !ok {
                warn!(
                    "Dropping question {:?}: answer {:?} is not one of {:?}",
                    q.question_text, q.correct_answer, q.options
                );
            }
            ok
        });
    }

    // Ids follow final position, so they stay sequential after strict filtering.
    for (i, q) in questions.iter_mut().enumerate() {
        q.question_id = (i + 1).to_string();
    }

    QuizDocument {
        quiz_id: base_quiz_id(now),
        status: QuizStatus::Success,
        source_document: source_document.to_string(),
        metadata: QuizMetadata {
            generated_at: now.to_rfc3339(),
            number_of_questions: questions.len(),
            question_types_requested: requested_types.to_vec(),
        },
        questions,
    }
}

/// Map one parsed record onto the output shape.
fn normalise_question(q: ParsedQuestion) -> QuizQuestion {
    let question_type = match q.question_type.as_deref() {
        Some("true_false") => QuestionType::TrueFalse,
        _ => QuestionType::MultipleChoice,
    };

    let options = match question_type {
        QuestionType::TrueFalse => TRUE_FALSE_OPTIONS.iter().map(|s| s.to_string()).collect(),
        QuestionType::MultipleChoice => q.options.unwrap_or_default(),
    };

    QuizQuestion {
        question_id: String::new(),
        question_text: q.question_text,
        question_type,
        options,
        correct_answer: q.correct_answer.unwrap_or_default(),
        explanation: q.explanation.unwrap_or_default(),
        metadata: QuestionMetadata::default(),
    }
}

/// Second-precision quiz id: `quiz_YYYYMMDD_HHMMSS`.
pub fn base_quiz_id(now: DateTime<Utc>) -> String {
    format!("quiz_{}", now.format("%Y%m%d_%H%M%S"))
}

/// Append an 8-hex-char random suffix to a quiz id.
pub fn make_unique_quiz_id(base: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", base, &suffix[..8])
}
