// src/ingest/mod.rs
//! Document-to-text pipeline: format dispatch, PDF/DOCX parsing, and the OCR client.

pub mod document;
pub mod docx;
pub mod image_prep;
pub mod ocr;
pub mod pdf;
pub mod types;

pub use document::{DocumentExtractor, DocumentFormat};
pub use ocr::{OcrClient, OcrOutcome, OcrService};
pub use types::{ExtractedText, Provenance, RawInput};
