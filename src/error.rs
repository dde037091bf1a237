// src/error.rs
//! Typed errors surfaced by the library. Binaries and config loaders wrap these in `anyhow`.

use thiserror::Error;

/// Errors a caller of the classification pipeline can observe.
///
/// OCR failures never show up here: they degrade to an `ocr-fallback` result instead.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to extract text from {format} document: {reason}")]
    Extraction { format: &'static str, reason: String },

    #[error(transparent)]
    ArtifactLoad(#[from] ArtifactLoadError),
}

impl DetectError {
    pub(crate) fn extraction(format: &'static str, reason: impl ToString) -> Self {
        DetectError::Extraction {
            format,
            reason: reason.to_string(),
        }
    }
}

/// Raised while loading a classifier artifact. Fatal at startup.
#[derive(Debug, Error)]
pub enum ArtifactLoadError {
    #[error("cannot read model artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("model artifact is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("model artifact is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("model artifact shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("model artifact contains a non-finite value in `{0}`")]
    NonFinite(&'static str),

    #[error("model artifact threshold {0} is not the supported 0.5 decision rule")]
    InvalidThreshold(f64),

    #[error("model was trained with normalizer `{found}`, runtime uses `{expected}`")]
    NormalizerMismatch { expected: String, found: String },
}

/// Raised by the offline trainer.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("training corpus is empty")]
    EmptyCorpus,

    #[error("training corpus contains only `{0}` examples; both labels are required")]
    SingleClass(&'static str),

    #[error("no vocabulary terms survived normalization")]
    EmptyVocabulary,
}
