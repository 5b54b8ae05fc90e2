//! Prompt templates for quiz generation.
//!
//! The reply format defined here is the contract the response parser in
//! [`crate::pipeline::parse`] relies on: one block per question with the
//! ordered markers `Q:`, `Type:`, `Options:`, `A:` and `Explanation:`.
//! Changing a marker here without changing the parser breaks every quiz.

use crate::output::QuestionType;

/// Literal record template the model must follow for each question.
pub const RECORD_FORMAT: &str = r#"Q: [Question text]
Type: [question_type]    (either 'multiple_choice' or 'true_false')
Options: [For multiple choice, provide exactly 4 comma-separated options; for true_false use "True, False"]
A: [Correct answer]
Explanation: [Brief explanation of the answer]"#;

/// Closing reminders appended after the content.
pub const REMINDERS: &str = r#"Remember:
- For multiple choice questions, provide exactly 4 options.
- The correct answer must be one of the options.
- For true/false questions, the options should be "True, False".
- Ensure questions are clear and unambiguous.
- Always include a brief explanation."#;

/// Render the quiz-generation prompt.
///
/// Deterministic for identical inputs; `content` is embedded verbatim.
pub fn build_quiz_prompt(content: &str, num_questions: usize, types: &[QuestionType]) -> String {
    let type_list = types
        .iter()
        .map(QuestionType::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Based on the following content, create {num_questions} quiz questions.\n\
         Include a mix of {type_list} questions.\n\n\
         Each question must be formatted using the following structure:\n\
         {RECORD_FORMAT}\n\n\
         Content:\n\
         {content}\n\n\
         {REMINDERS}\n"
    )
}
