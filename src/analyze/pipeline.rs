// src/analyze/pipeline.rs
//! Classification pipeline: extraction -> normalization -> TF-IDF -> logistic
//! score -> explanation + risk signals.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::Serialize;

use crate::analyze::classifier::{ClassifierArtifact, Label};
use crate::analyze::explain::{ExplainContext, ExplanationEngine, ImportantFeature};
use crate::analyze::normalizer::normalize;
use crate::analyze::patterns::{RiskPatternMatcher, RiskSignal};
use crate::error::DetectError;
use crate::ingest::ocr::FallbackReason;
use crate::ingest::{DocumentExtractor, ExtractedText, Provenance, RawInput};
use crate::metrics::{ensure_metrics_described, CLASSIFY_DURATION_MS, CLASSIFY_TOTAL};

/// Outcome returned to callers. Carries no timestamps, so identical input and
/// artifact give a byte-identical serialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    #[serde(rename = "classification")]
    pub label: Label,
    pub confidence: f64,
    pub confidence_percentage: String,
    pub important_features: Vec<ImportantFeature>,
    pub explanations: Vec<String>,
    /// Only populated for `scam` results.
    #[serde(rename = "high_risk_signals", skip_serializing_if = "Vec::is_empty")]
    pub risk_signals: Vec<RiskSignal>,
    pub provenance: Provenance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
}

/// Shared, read-only pipeline. Clone the `Arc`, not the pipeline.
pub struct ClassificationPipeline {
    model: Arc<ClassifierArtifact>,
    patterns: Arc<RiskPatternMatcher>,
    extractor: Arc<DocumentExtractor>,
    explainer: ExplanationEngine,
}

impl ClassificationPipeline {
    pub fn new(
        model: Arc<ClassifierArtifact>,
        patterns: Arc<RiskPatternMatcher>,
        extractor: Arc<DocumentExtractor>,
    ) -> Self {
        ensure_metrics_described();
        Self {
            model,
            patterns,
            extractor,
            explainer: ExplanationEngine::default(),
        }
    }

    pub fn with_explainer(mut self, explainer: ExplanationEngine) -> Self {
        self.explainer = explainer;
        self
    }

    pub fn model(&self) -> &ClassifierArtifact {
        &self.model
    }

    pub fn extractor(&self) -> &DocumentExtractor {
        &self.extractor
    }

    /// Classify a message or an uploaded document.
    pub async fn classify(&self, input: &RawInput) -> Result<ClassificationResult, DetectError> {
        self.classify_with_text(input).await.map(|(_, result)| result)
    }

    /// Like [`classify`](Self::classify), also returning the text that was scored.
    pub async fn classify_with_text(
        &self,
        input: &RawInput,
    ) -> Result<(ExtractedText, ClassificationResult), DetectError> {
        let extracted = match input {
            RawInput::Message(text) => ExtractedText::direct(text.clone()),
            RawInput::Document { bytes, format } => self.extractor.extract(bytes, format).await?,
        };
        let result = self.classify_extracted(&extracted);
        Ok((extracted, result))
    }

    /// Pure part of the pipeline: everything after text extraction.
    pub fn classify_extracted(&self, extracted: &ExtractedText) -> ClassificationResult {
        let started = Instant::now();

        let tokens = normalize(&extracted.text);
        let vector = self.model.vectorizer.transform(&tokens);
        let p_scam = self.model.classifier.probability(&vector);
        let (label, confidence) = self.model.classifier.decide(p_scam);

        // Signals explain a scam verdict; they never flip the label.
        let risk_signals = match label {
            Label::Scam => self.patterns.scan(&extracted.text),
            Label::Real => Vec::new(),
        };
        let legitimate_cues = match label {
            Label::Real => self.patterns.legitimate_cues(&extracted.text),
            Label::Scam => Vec::new(),
        };

        let explanation = self.explainer.explain(
            &vector,
            &self.model,
            ExplainContext {
                label,
                risk_signals: &risk_signals,
                legitimate_cues: &legitimate_cues,
                degraded_input: extracted.provenance == Provenance::OcrFallback,
            },
        );

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        counter!(CLASSIFY_TOTAL, "label" => label.as_str()).increment(1);
        histogram!(CLASSIFY_DURATION_MS).record(elapsed_ms);
        tracing::info!(
            text_hash = %anon_hash(&extracted.text),
            label = label.as_str(),
            confidence,
            tokens = tokens.len(),
            features = vector.len(),
            signals = risk_signals.len(),
            provenance = extracted.provenance.as_str(),
            "message classified"
        );

        ClassificationResult {
            label,
            confidence,
            confidence_percentage: format!("{:.2}%", confidence * 100.0),
            important_features: explanation.important_features,
            explanations: explanation.explanations,
            risk_signals,
            provenance: extracted.provenance,
            fallback_reason: extracted.fallback_reason,
        }
    }
}

/// Short SHA-256 prefix for logs; message text itself is never logged.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
