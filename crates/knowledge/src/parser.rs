//! Source file loading and text cleaning.

use regex::Regex;
use sage_core::{AppError, AppResult};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Page footers left behind by document converters.
static PAGE_FOOTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Page \d+ of \d+").unwrap());

static CONTROL_WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\r\n\t]").unwrap());

static DISALLOWED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s.,;:!?()\-]").unwrap());

const PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '(', ')', '-'];

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    PlainText,
    Pdf,
    Unsupported,
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("md") | Some("markdown") => Self::Markdown,
            Some("txt") => Self::PlainText,
            Some("pdf") => Self::Pdf,
            _ => Self::Unsupported,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::PlainText => "text",
            Self::Pdf => "pdf",
            Self::Unsupported => "unsupported",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

/// Read a source file and return its cleaned text.
pub fn parse_file(path: &Path) -> AppResult<String> {
    let raw = match ContentType::from_path(path) {
        ContentType::Unsupported => {
            return Err(AppError::Knowledge(format!(
                "Unsupported file type: {:?}",
                path
            )));
        }
        ContentType::Pdf => extract_pdf_text(path)?,
        ContentType::Markdown | ContentType::PlainText => {
            let raw = fs::read_to_string(path)
                .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))?;
            if raw.contains('\0') {
                tracing::warn!("Skipping likely binary file: {:?}", path);
                return Err(AppError::Knowledge("Binary file not supported".to_string()));
            }
            raw
        }
    };

    Ok(clean_text(&raw))
}

/// Concatenated text of every page, in page order. Pages whose content
/// cannot be decoded are skipped.
fn extract_pdf_text(path: &Path) -> AppResult<String> {
    let document = lopdf::Document::load(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to load PDF {:?}: {}", path, e)))?;

    let mut text = String::new();
    for page in document.get_pages().into_keys() {
        match document.extract_text(&[page]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => tracing::warn!("Skipping page {} of {:?}: {}", page, path, e),
        }
    }

    Ok(text)
}

/// Normalize extracted text before chunking.
///
/// Steps, in order: collapse whitespace runs into one space, drop
/// `Page N of M` footers, replace remaining control whitespace, drop every
/// character that is not a word character, whitespace or `.,;:!?()-`,
/// collapse runs of the same punctuation mark, trim.
pub fn clean_text(text: &str) -> String {
    let text = WHITESPACE_RE.replace_all(text, " ");
    let text = PAGE_FOOTER_RE.replace_all(&text, "");
    let text = CONTROL_WS_RE.replace_all(&text, " ");
    let text = DISALLOWED_RE.replace_all(&text, "");
    collapse_repeated_punctuation(&text).trim().to_string()
}

/// `"!!!"` becomes `"!"`; mixed runs such as `".,"` are kept.
fn collapse_repeated_punctuation(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut previous: Option<char> = None;

    for ch in text.chars() {
        if PUNCTUATION.contains(&ch) && previous == Some(ch) {
            continue;
        }
        result.push(ch);
        previous = Some(ch);
    }

    result
}

/// File name used as the source label of a document.
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
