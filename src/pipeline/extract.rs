//! Text extraction: PDF source → page-ordered plain text.
//!
//! Extraction is split in two:
//!
//! * a [`TextExtractor`] backend that returns the raw text of every page, in
//!   page order (the production backend is [`PdfiumExtractor`]);
//! * [`join_page_texts`], which drops pages without text and concatenates the
//!   rest with no separator.
//!
//! Scanned pages have no text layer. They contribute nothing and never abort
//! extraction; a document made only of scanned pages yields an empty string.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which uses thread-local state
//! and is not safe to call from async contexts. [`extract_text`] moves the work
//! onto tokio's blocking pool.

use crate::error::QuizError;
use crate::pipeline::input::PdfSource;
use pdfium_render::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Backend that reads the text layer of each page of a PDF.
pub trait TextExtractor: Send + Sync {
    /// Text of every page, in page order. Pages without text yield `""`.
    fn page_texts(&self, source: &PdfSource) -> Result<Vec<String>, QuizError>;
}

/// Concatenate page texts in order, skipping pages with no text.
pub fn join_page_texts<I, S>(pages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut text = String::new();
    for page in pages {
        let page = page.as_ref();
        if !page.is_empty() {
            text.push_str(page);
        }
    }
    text
}

/// Extract the full text of `source` on the blocking pool.
pub async fn extract_text(
    extractor: Arc<dyn TextExtractor>,
    source: PdfSource,
) -> Result<String, QuizError> {
    let name = source.display_name();
    let pages = tokio::task::spawn_blocking(move || extractor.page_texts(&source))
        .await
        .map_err(|e| QuizError::Internal(format!("Extraction task panicked: {}", e)))??;

    let with_text = pages.iter().filter(|p| !p.is_empty()).count();
    let text = join_page_texts(&pages);
    info!(
        "Extracted {} chars from {} ({}/{} pages with text)",
        text.len(),
        name,
        with_text,
        pages.len()
    );
    Ok(text)
}

/// [`TextExtractor`] backed by pdfium.
///
/// The library is bound on every call, from (first match wins):
/// `PDFIUM_LIB_PATH`, the current directory, or the system library path.
#[derive(Debug, Default, Clone)]
pub struct PdfiumExtractor {
    /// PDF user password for encrypted documents.
    password: Option<String>,
}

impl PdfiumExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

impl TextExtractor for PdfiumExtractor {
    fn page_texts(&self, source: &PdfSource) -> Result<Vec<String>, QuizError> {
        let pdfium = bind_pdfium()?;
        let password = self.password.as_deref();
        let name = source.display_name();

        let document = match source {
            PdfSource::Local(path) => pdfium.load_pdf_from_file(path, password),
            PdfSource::Remote { bytes, .. } => pdfium.load_pdf_from_byte_slice(bytes, password),
        }
        .map_err(|e| QuizError::CorruptPdf {
            source_name: name.clone(),
            detail: format!("{:?}", e),
        })?;

        let pages = document.pages();
        debug!("PDF loaded: {} pages", pages.len());

        let mut texts = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let text = match page.text() {
                Ok(t) => t.all(),
                Err(e) => {
                    warn!("Page {} of {}: no readable text layer ({:?})", idx + 1, name, e);
                    String::new()
                }
            };
            texts.push(text);
        }

        Ok(texts)
    }
}

/// Bind to a pdfium shared library.
fn bind_pdfium() -> Result<Pdfium, QuizError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| QuizError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}
