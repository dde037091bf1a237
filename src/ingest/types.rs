// src/ingest/types.rs
use serde::Serialize;

use crate::ingest::ocr::FallbackReason;

/// How the text being classified was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    Direct,
    PdfParsed,
    DocxParsed,
    Ocr,
    OcrFallback,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Direct => "direct",
            Provenance::PdfParsed => "pdf-parsed",
            Provenance::DocxParsed => "docx-parsed",
            Provenance::Ocr => "ocr",
            Provenance::OcrFallback => "ocr-fallback",
        }
    }
}

/// Normalized UTF-8 text plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub provenance: Provenance,
    /// Why OCR degraded, when `provenance` is `OcrFallback`.
    pub fallback_reason: Option<FallbackReason>,
}

impl ExtractedText {
    pub fn direct(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            provenance: Provenance::Direct,
            fallback_reason: None,
        }
    }
}

/// Input accepted by the classification pipeline.
#[derive(Debug, Clone)]
pub enum RawInput {
    /// A plain text message, classified as-is.
    Message(String),
    /// Uploaded document bytes with a declared format tag (`pdf`, `.PNG`, `docx`, ...).
    Document { bytes: Vec<u8>, format: String },
}

/// Collapse runs of spaces inside each line, trim, and drop empty lines.
/// Paragraph boundaries survive as `\n`.
pub fn tidy_text(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
