// src/analyze/explain.rs
//! Explanation engine: ranks per-term contributions and turns them (plus any
//! risk signals) into human-readable sentences.

use serde::{Serialize, Serializer};

use crate::analyze::classifier::{ClassifierArtifact, Label};
use crate::analyze::patterns::{LegitimateCue, RiskSignal};
use crate::analyze::vectorizer::FeatureVector;

pub const DEFAULT_TOP_K: usize = 5;

/// Which way a term pushed the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorType {
    Scam,
    Legitimate,
}

impl IndicatorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorType::Scam => "Scam indicator",
            IndicatorType::Legitimate => "Legitimate indicator",
        }
    }
}

impl Serialize for IndicatorType {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

/// One ranked term. `weight` is the absolute contribution `|w_i * x_i|`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportantFeature {
    pub term: String,
    pub indicator_type: IndicatorType,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Explanation {
    pub important_features: Vec<ImportantFeature>,
    pub explanations: Vec<String>,
}

/// Everything the engine reads besides the model itself.
#[derive(Debug, Clone, Copy)]
pub struct ExplainContext<'a> {
    pub label: Label,
    pub risk_signals: &'a [RiskSignal],
    pub legitimate_cues: &'a [LegitimateCue],
    /// Set when OCR failed and the text is a best-effort fallback.
    pub degraded_input: bool,
}

#[derive(Debug, Clone)]
pub struct ExplanationEngine {
    top_k: usize,
}

impl Default for ExplanationEngine {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl ExplanationEngine {
    pub fn new(top_k: usize) -> Self {
        Self { top_k: top_k.max(1) }
    }

    /// Rank contributions and build the explanation sentences.
    pub fn explain(
        &self,
        vector: &FeatureVector,
        model: &ClassifierArtifact,
        ctx: ExplainContext<'_>,
    ) -> Explanation {
        let important_features = self.rank(vector, model);
        let mut explanations = Vec::new();

        let scam_terms = terms_of(&important_features, IndicatorType::Scam);
        let legit_terms = terms_of(&important_features, IndicatorType::Legitimate);

        if important_features.is_empty() {
            explanations.push(
                "The message contains no terms the model recognises, so this decision carries little information."
                    .to_string(),
            );
        }

        match ctx.label {
            Label::Scam => {
                if !scam_terms.is_empty() {
                    explanations.push(format!(
                        "This message was classified as a scam primarily because it contains suspicious terms like: {}",
                        scam_terms.join(", ")
                    ));
                } else if !important_features.is_empty() {
                    explanations.push(
                        "The overall wording resembles messages previously identified as scams."
                            .to_string(),
                    );
                }
                for signal in ctx.risk_signals {
                    push_unique(&mut explanations, signal.description.clone());
                }
            }
            Label::Real => {
                if !legit_terms.is_empty() {
                    explanations.push(format!(
                        "This message was classified as legitimate primarily because it contains trusted terms like: {}",
                        legit_terms.join(", ")
                    ));
                    for cue in ctx.legitimate_cues {
                        push_unique(&mut explanations, cue.description.clone());
                    }
                } else if !important_features.is_empty() {
                    explanations.push(
                        "No single term strongly indicates a scam, so the message was treated as legitimate."
                            .to_string(),
                    );
                }
            }
        }

        if ctx.degraded_input {
            explanations.push(
                "Text could not be fully extracted from the uploaded file, so this result is based on limited information."
                    .to_string(),
            );
        }

        Explanation {
            important_features,
            explanations,
        }
    }

    /// Top-K terms by `|w_i * x_i|`, descending; ties go to the lower vocabulary index.
    pub fn rank(&self, vector: &FeatureVector, model: &ClassifierArtifact) -> Vec<ImportantFeature> {
        let weights = model.classifier.weights();
        let mut scored: Vec<(usize, f64)> = vector
            .entries()
            .iter()
            .map(|(i, x)| (*i, weights[*i] * x))
            .filter(|(_, c)| *c != 0.0)
            .collect();

        scored.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()).then(a.0.cmp(&b.0)));

        scored
            .into_iter()
            .take(self.top_k)
            .filter_map(|(i, contribution)| {
                let term = model.vectorizer.term(i)?.to_string();
                let indicator_type = if weights[i] > 0.0 {
                    IndicatorType::Scam
                } else {
                    IndicatorType::Legitimate
                };
                Some(ImportantFeature {
                    term,
                    indicator_type,
                    weight: contribution.abs(),
                })
            })
            .collect()
    }
}

fn terms_of(features: &[ImportantFeature], kind: IndicatorType) -> Vec<&str> {
    features
        .iter()
        .filter(|f| f.indicator_type == kind)
        .map(|f| f.term.as_str())
        .collect()
}

fn push_unique(out: &mut Vec<String>, sentence: String) {
    if !out.contains(&sentence) {
        out.push(sentence);
    }
}
