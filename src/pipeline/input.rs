//! Input resolution: normalise a user-supplied path or URL to a PDF source.
//!
//! URL sources (including presigned object-store URLs) are fetched with one
//! GET and kept in memory, up to a size cap; pdfium can parse a byte buffer directly, so there
//! is no temp file. Local sources stay on disk and are opened by path. Both
//! are checked for the `%PDF` magic bytes so callers get a meaningful error
//! rather than a pdfium parse failure.

use crate::error::QuizError;
use crate::redact::redact_url;
use std::path::PathBuf;
use tracing::{debug, info};

/// A resolved PDF source, ready for text extraction.
#[derive(Debug, Clone)]
pub enum PdfSource {
    /// A local file.
    Local(PathBuf),
    /// Bytes downloaded from `url`.
    Remote { url: String, bytes: Vec<u8> },
}

impl PdfSource {
    /// Human-readable name for log lines and error messages.
    pub fn display_name(&self) -> String {
        match self {
            PdfSource::Local(p) => p.display().to_string(),
            PdfSource::Remote { url, .. } => redact_url(url),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a PDF source.
///
/// If the input is a URL, download it into memory, refusing bodies larger
/// than `max_bytes`. If the input is a local file, validate it exists and is
/// readable.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
    max_bytes: u64,
) -> Result<PdfSource, QuizError> {
    if is_url(input) {
        download_url(input, timeout_secs, max_bytes).await
    } else {
        resolve_local(input)
    }
}

/// Resolve a local file path, validating existence and PDF magic bytes.
fn resolve_local(path_str: &str) -> Result<PdfSource, QuizError> {
    if path_str.trim().is_empty() {
        return Err(QuizError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(QuizError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            match f.read_exact(&mut magic) {
                Ok(()) => check_magic(&magic, &path.display().to_string())?,
                // Shorter than the header: certainly not a PDF.
                Err(_) => {
                    return Err(QuizError::NotAPdf {
                        source_name: path.display().to_string(),
                        magic: Vec::new(),
                    })
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(QuizError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(QuizError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(PdfSource::Local(path))
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64, max_bytes: u64) -> Result<PdfSource, QuizError> {
    let shown = redact_url(url);
    info!("Downloading PDF from: {}", shown);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| QuizError::DownloadFailed {
            url: shown.clone(),
            reason: e.to_string(),
        })?;

    let mut response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            QuizError::DownloadTimeout {
                url: shown.clone(),
                secs: timeout_secs,
            }
        } else {
            QuizError::DownloadFailed {
                url: shown.clone(),
                reason: e.without_url().to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(QuizError::DownloadFailed {
            url: shown,
            reason: format!("HTTP {}", response.status()),
        });
    }

    let too_large = || QuizError::DownloadTooLarge {
        url: shown.clone(),
        limit: max_bytes,
    };
    if response.content_length().is_some_and(|len| len > max_bytes) {
        return Err(too_large());
    }

    // Content-Length may be absent or wrong; enforce the cap on what arrives.
    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| QuizError::DownloadFailed {
        url: shown.clone(),
        reason: e.without_url().to_string(),
    })? {
        if bytes.len() as u64 + chunk.len() as u64 > max_bytes {
            return Err(too_large());
        }
        bytes.extend_from_slice(&chunk);
    }

    check_magic(&bytes, &shown)?;

    info!("Downloaded {} bytes from {}", bytes.len(), shown);

    Ok(PdfSource::Remote {
        url: url.to_string(),
        bytes,
    })
}

/// Reject buffers that do not start with `%PDF`.
fn check_magic(bytes: &[u8], source_name: &str) -> Result<(), QuizError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        return Err(QuizError::NotAPdf {
            source_name: source_name.to_string(),
            magic: bytes.iter().take(4).copied().collect(),
        });
    }
    Ok(())
}
