// src/ingest/document.rs
//! Format dispatch: turns uploaded bytes into [`ExtractedText`].

use std::sync::Arc;

use crate::error::DetectError;
use crate::ingest::ocr::{FallbackReason, OcrClient, OcrOutcome};
use crate::ingest::types::{tidy_text, ExtractedText, Provenance};
use crate::ingest::{docx, pdf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Bmp,
    Tiff,
    Gif,
}

impl ImageKind {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Bmp => "image/bmp",
            ImageKind::Tiff => "image/tiff",
            ImageKind::Gif => "image/gif",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Text,
    Image(ImageKind),
}

impl DocumentFormat {
    /// Parse a format tag: case-insensitive, leading dot allowed (`".PDF"`).
    pub fn from_tag(tag: &str) -> Result<Self, DetectError> {
        let t = tag.trim().trim_start_matches('.').to_ascii_lowercase();
        Ok(match t.as_str() {
            "pdf" => DocumentFormat::Pdf,
            "docx" => DocumentFormat::Docx,
            "txt" | "text" => DocumentFormat::Text,
            "jpg" | "jpeg" => DocumentFormat::Image(ImageKind::Jpeg),
            "png" => DocumentFormat::Image(ImageKind::Png),
            "bmp" => DocumentFormat::Image(ImageKind::Bmp),
            "tif" | "tiff" => DocumentFormat::Image(ImageKind::Tiff),
            "gif" => DocumentFormat::Image(ImageKind::Gif),
            _ => return Err(DetectError::UnsupportedFormat(tag.trim().to_string())),
        })
    }

    /// Format tag taken from a file name's extension.
    pub fn from_filename(name: &str) -> Result<Self, DetectError> {
        match name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => Self::from_tag(ext),
            _ => Err(DetectError::UnsupportedFormat(name.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Text => "txt",
            DocumentFormat::Image(_) => "image",
        }
    }
}

/// Dispatches on format; images and scanned PDF pages go through the OCR client.
pub struct DocumentExtractor {
    ocr: Arc<OcrClient>,
}

impl DocumentExtractor {
    pub fn new(ocr: Arc<OcrClient>) -> Self {
        Self { ocr }
    }

    pub fn ocr(&self) -> &Arc<OcrClient> {
        &self.ocr
    }

    /// Extract text. Only an unknown format or an unreadable container is an
    /// error; OCR trouble degrades to `ocr-fallback`.
    pub async fn extract(&self, bytes: &[u8], format_tag: &str) -> Result<ExtractedText, DetectError> {
        let format = DocumentFormat::from_tag(format_tag)?;
        let extracted = match format {
            DocumentFormat::Text => ExtractedText {
                text: tidy_text(&String::from_utf8_lossy(bytes)),
                provenance: Provenance::Direct,
                fallback_reason: None,
            },
            DocumentFormat::Docx => {
                let raw = docx::extract_text(bytes)?;
                ExtractedText {
                    text: tidy_text(&raw),
                    provenance: Provenance::DocxParsed,
                    fallback_reason: None,
                }
            }
            DocumentFormat::Image(kind) => {
                let outcome = self.ocr.extract(bytes, kind.mime_type()).await;
                from_outcome(outcome)
            }
            DocumentFormat::Pdf => self.extract_pdf(bytes).await?,
        };

        tracing::info!(
            format = format.as_str(),
            provenance = extracted.provenance.as_str(),
            size = bytes.len(),
            chars = extracted.text.len(),
            "document extracted"
        );
        Ok(extracted)
    }

    async fn extract_pdf(&self, bytes: &[u8]) -> Result<ExtractedText, DetectError> {
        let owned = bytes.to_vec();
        let pages = tokio::task::spawn_blocking(move || pdf::read_pages(&owned))
            .await
            .map_err(|e| DetectError::extraction("pdf", e))??;

        let mut parts = Vec::with_capacity(pages.len());
        let mut used_ocr = false;
        let mut fallback: Option<FallbackReason> = None;

        for page in pages {
            if !page.text.is_empty() {
                parts.push(tidy_text(&page.text));
                continue;
            }
            for image in &page.images {
                let outcome = self.ocr.extract(&image.bytes, image.mime_type).await;
                used_ocr = true;
                if let Some(reason) = outcome.fallback_reason() {
                    fallback.get_or_insert(reason);
                }
                let text = tidy_text(outcome.text());
                if !text.is_empty() {
                    parts.push(text);
                }
            }
        }

        let provenance = if fallback.is_some() {
            Provenance::OcrFallback
        } else if used_ocr {
            Provenance::Ocr
        } else {
            Provenance::PdfParsed
        };
        Ok(ExtractedText {
            text: parts.join(" "),
            provenance,
            fallback_reason: fallback,
        })
    }
}

fn from_outcome(outcome: OcrOutcome) -> ExtractedText {
    let provenance = outcome.provenance();
    let fallback_reason = outcome.fallback_reason();
    ExtractedText {
        text: tidy_text(outcome.text()),
        provenance,
        fallback_reason,
    }
}
