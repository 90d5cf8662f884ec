//! Request-scoped document values.
//!
//! None of these types are shared between requests: an [`UploadedDocument`]
//! borrows the caller's bytes for the length of one extraction call, and the
//! resulting [`ExtractedText`] is handed back by value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Document kind, derived from the filename suffix only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Unsupported,
}

impl DocumentFormat {
    /// File suffix (with the dot) used when staging the document on disk.
    pub fn suffix(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => ".pdf",
            DocumentFormat::Docx => ".docx",
            DocumentFormat::Unsupported => "",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, DocumentFormat::Unsupported)
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Docx => "DOCX",
            DocumentFormat::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

/// An upload as received by a front-end: declared filename plus raw bytes.
///
/// Never mutated; the format tag is derived once at construction.
#[derive(Debug, Clone, Copy)]
pub struct UploadedDocument<'a> {
    pub filename: &'a str,
    pub content: &'a [u8],
    pub format: DocumentFormat,
}

impl<'a> UploadedDocument<'a> {
    pub fn new(filename: &'a str, content: &'a [u8]) -> Self {
        Self {
            filename,
            content,
            format: crate::pipeline::detect::detect_format(filename),
        }
    }
}

/// Which strategy produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Text layer (PDF) or paragraph runs (DOCX).
    Direct,
    /// Rasterised pages run through text recognition.
    Ocr,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMethod::Direct => f.write_str("direct"),
            ExtractionMethod::Ocr => f.write_str("ocr"),
        }
    }
}

/// The text of one document, in reading order.
///
/// Immutable once returned by the pipeline. An empty `text` is a legitimate
/// outcome (an image-only scan with nothing recognisable on it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    text: String,
    format: DocumentFormat,
    method: ExtractionMethod,
}

impl ExtractedText {
    pub(crate) fn new(text: String, format: DocumentFormat, method: ExtractionMethod) -> Self {
        Self {
            text,
            format,
            method,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    pub fn method(&self) -> ExtractionMethod {
        self.method
    }

    /// Length in characters (not bytes).
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// True when the text is empty or whitespace-only.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

impl AsRef<str> for ExtractedText {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for ExtractedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Structural facts about a document, gathered without OCR or a model call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub filename: String,
    pub format: DocumentFormat,
    pub size_bytes: usize,
    /// Page count (PDF only).
    pub pages: Option<usize>,
    /// Body paragraph count (DOCX only).
    pub paragraphs: Option<usize>,
    /// Whether direct extraction finds any non-blank text. `false` for a
    /// PDF means extraction will go through the OCR fallback.
    pub has_text_layer: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uploaded_document_derives_format() {
        let doc = UploadedDocument::new("Lease.PDF", b"%PDF-1.4");
        assert_eq!(doc.format, DocumentFormat::Pdf);
        let doc = UploadedDocument::new("notes.txt", b"hello");
        assert_eq!(doc.format, DocumentFormat::Unsupported);
    }

    #[test]
    fn extracted_text_blankness() {
        let t = ExtractedText::new(" \n\t".into(), DocumentFormat::Pdf, ExtractionMethod::Direct);
        assert!(t.is_blank());
        let t = ExtractedText::new("Clause 1".into(), DocumentFormat::Pdf, ExtractionMethod::Ocr);
        assert!(!t.is_blank());
        assert_eq!(t.char_count(), 8);
        assert_eq!(t.to_string(), "Clause 1");
    }

    #[test]
    fn format_serialises_lowercase() {
        assert_eq!(
            serde_json::to_string(&DocumentFormat::Docx).unwrap(),
            "\"docx\""
        );
        assert_eq!(DocumentFormat::Docx.to_string(), "DOCX");
    }
}
