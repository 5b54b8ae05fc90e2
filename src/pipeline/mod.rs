//! Pipeline stages for PDF-to-quiz generation.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the PDF engine or the model backend can be swapped
//! without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ (prompt) ──▶ llm ──▶ parse ──▶ assemble
//! (URL/path)  (pdfium)               (model)  (markers)  (QuizDocument)
//! ```
//!
//! 1. [`input`]    — resolve the user-supplied path or URL to a PDF source
//! 2. [`extract`]  — page-ordered text; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`llm`]      — one prompt in, one reply out, with retry/backoff on
//!    transport failures; the only stage besides `input` with network I/O
//! 4. [`parse`]    — line-marker parsing of the free-text reply
//! 5. [`assemble`] — identifiers, metadata and type-conditional defaults

pub mod assemble;
pub mod extract;
pub mod input;
pub mod llm;
pub mod parse;
