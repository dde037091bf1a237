// src/analyze/classifier.rs
//! Logistic classifier and the versioned artifact that carries it.
//!
//! The artifact is read once at startup, validated, and then shared read-only.
//! A trained model is published by writing a new artifact file, never by
//! mutating a loaded one.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analyze::normalizer::NORMALIZER_VERSION;
use crate::analyze::vectorizer::{FeatureVector, FeatureVectorizer};
use crate::error::ArtifactLoadError;

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;
pub const DEFAULT_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Scam,
    Real,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Scam => "scam",
            Label::Real => "real",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weights and bias. Positive weights push toward `scam`.
#[derive(Debug, Clone)]
pub struct LinearClassifier {
    weights: Vec<f64>,
    bias: f64,
}

impl LinearClassifier {
    pub(crate) fn new(weights: Vec<f64>, bias: f64) -> Self {
        Self { weights, bias }
    }

    /// `sigmoid(w . x + b)`.
    pub fn probability(&self, x: &FeatureVector) -> f64 {
        let z = x
            .entries()
            .iter()
            .fold(self.bias, |acc, (i, v)| acc + self.weights[*i] * v);
        sigmoid(z)
    }

    /// Label plus confidence in that label (`p` for scam, `1 - p` for real).
    /// Confidence is always in `[0.5, 1.0]`.
    pub fn decide(&self, p_scam: f64) -> (Label, f64) {
        if p_scam >= DEFAULT_THRESHOLD {
            (Label::Scam, p_scam)
        } else {
            (Label::Real, 1.0 - p_scam)
        }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn threshold(&self) -> f64 {
        DEFAULT_THRESHOLD
    }
}

/// Numerically stable logistic function.
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// On-disk form. Every field is optional here so a missing one is reported by name.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ArtifactFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    format_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    normalizer_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    document_count: Option<u64>,
    #[serde(default)]
    vectorizer_vocabulary: Option<BTreeMap<String, usize>>,
    #[serde(default)]
    idf_table: Option<Vec<f64>>,
    #[serde(default)]
    weight_vector: Option<Vec<f64>>,
    #[serde(default)]
    bias: Option<f64>,
}

/// Loaded, validated model: vectorizer + classifier + metadata.
#[derive(Debug, Clone)]
pub struct ClassifierArtifact {
    pub vectorizer: FeatureVectorizer,
    pub classifier: LinearClassifier,
    pub normalizer_version: String,
    pub document_count: Option<u64>,
}

impl ClassifierArtifact {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactLoadError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ArtifactLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, ArtifactLoadError> {
        let file: ArtifactFile = serde_json::from_str(data)?;

        if let Some(v) = file.format_version {
            if v != ARTIFACT_FORMAT_VERSION {
                return Err(ArtifactLoadError::ShapeMismatch(format!(
                    "unsupported format_version {v}"
                )));
            }
        }

        let vocabulary = file
            .vectorizer_vocabulary
            .ok_or(ArtifactLoadError::MissingField("vectorizer_vocabulary"))?;
        let idf = file
            .idf_table
            .ok_or(ArtifactLoadError::MissingField("idf_table"))?;
        let weights = file
            .weight_vector
            .ok_or(ArtifactLoadError::MissingField("weight_vector"))?;
        let bias = file.bias.ok_or(ArtifactLoadError::MissingField("bias"))?;

        let normalizer_version = match file.normalizer_version {
            Some(found) if found != NORMALIZER_VERSION => {
                return Err(ArtifactLoadError::NormalizerMismatch {
                    expected: NORMALIZER_VERSION.to_string(),
                    found,
                })
            }
            Some(found) => found,
            None => {
                tracing::warn!(
                    expected = NORMALIZER_VERSION,
                    "model artifact does not record a normalizer version"
                );
                NORMALIZER_VERSION.to_string()
            }
        };

        // the field versions the decision rule; only 0.5 is supported
        if let Some(threshold) = file.threshold {
            if threshold != DEFAULT_THRESHOLD {
                return Err(ArtifactLoadError::InvalidThreshold(threshold));
            }
        }

        Self::from_parts(vocabulary, idf, weights, bias, file.document_count)
            .map(|mut a| {
                a.normalizer_version = normalizer_version;
                a
            })
    }

    /// Validate shapes and build the runtime structures.
    pub(crate) fn from_parts(
        vocabulary: BTreeMap<String, usize>,
        idf: Vec<f64>,
        weights: Vec<f64>,
        bias: f64,
        document_count: Option<u64>,
    ) -> Result<Self, ArtifactLoadError> {
        let n = vocabulary.len();
        if idf.len() != n || weights.len() != n {
            return Err(ArtifactLoadError::ShapeMismatch(format!(
                "vocabulary has {n} terms, idf_table has {}, weight_vector has {}",
                idf.len(),
                weights.len()
            )));
        }
        if idf.iter().any(|v| !v.is_finite()) {
            return Err(ArtifactLoadError::NonFinite("idf_table"));
        }
        if weights.iter().any(|v| !v.is_finite()) {
            return Err(ArtifactLoadError::NonFinite("weight_vector"));
        }
        if !bias.is_finite() {
            return Err(ArtifactLoadError::NonFinite("bias"));
        }

        let mut terms: Vec<Option<String>> = vec![None; n];
        for (term, idx) in vocabulary {
            let slot = terms.get_mut(idx).ok_or_else(|| {
                ArtifactLoadError::ShapeMismatch(format!(
                    "term `{term}` has index {idx}, vocabulary size is {n}"
                ))
            })?;
            if slot.is_some() {
                return Err(ArtifactLoadError::ShapeMismatch(format!(
                    "vocabulary index {idx} is assigned twice"
                )));
            }
            *slot = Some(term);
        }
        // n distinct indices all < n, so every slot is filled
        let terms: Vec<String> = terms.into_iter().flatten().collect();

        Ok(Self {
            vectorizer: FeatureVectorizer::from_parts(terms, idf),
            classifier: LinearClassifier::new(weights, bias),
            normalizer_version: NORMALIZER_VERSION.to_string(),
            document_count,
        })
    }

    /// Serialize back to the on-disk JSON form (used by the trainer).
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        let vocabulary = self
            .vectorizer
            .terms()
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        let file = ArtifactFile {
            format_version: Some(ARTIFACT_FORMAT_VERSION),
            normalizer_version: Some(self.normalizer_version.clone()),
            threshold: Some(self.classifier.threshold()),
            document_count: self.document_count,
            vectorizer_vocabulary: Some(vocabulary),
            idf_table: Some(self.vectorizer.idf().to_vec()),
            weight_vector: Some(self.classifier.weights().to_vec()),
            bias: Some(self.classifier.bias()),
        };
        serde_json::to_string_pretty(&file)
    }

    pub fn threshold(&self) -> f64 {
        self.classifier.threshold()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn small() -> serde_json::Value {
        json!({
            "normalizer_version": NORMALIZER_VERSION,
            "vectorizer_vocabulary": {"fee": 0, "report": 1},
            "idf_table": [2.0, 2.0],
            "weight_vector": [1.5, -1.5],
            "bias": -0.2
        })
    }

    #[test]
    fn loads_valid_artifact_with_default_threshold() {
        let a = ClassifierArtifact::from_json_str(&small().to_string()).unwrap();
        assert_eq!(a.threshold(), DEFAULT_THRESHOLD);
        assert_eq!(a.vectorizer.term(1), Some("report"));
        assert_eq!(a.vectorizer.index_of("fee"), Some(0));
    }

    #[test]
    fn missing_field_is_named() {
        for field in ["vectorizer_vocabulary", "idf_table", "weight_vector", "bias"] {
            let mut v = small();
            v.as_object_mut().unwrap().remove(field);
            let err = ClassifierArtifact::from_json_str(&v.to_string()).unwrap_err();
            assert!(
                matches!(err, ArtifactLoadError::MissingField(f) if f == field),
                "{field}: {err}"
            );
        }
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let mut v = small();
        v["weight_vector"] = json!([1.0]);
        let err = ClassifierArtifact::from_json_str(&v.to_string()).unwrap_err();
        assert!(matches!(err, ArtifactLoadError::ShapeMismatch(_)));

        let mut v = small();
        v["vectorizer_vocabulary"] = json!({"fee": 0, "report": 5});
        let err = ClassifierArtifact::from_json_str(&v.to_string()).unwrap_err();
        assert!(matches!(err, ArtifactLoadError::ShapeMismatch(_)));
    }

    #[test]
    fn normalizer_mismatch_and_bad_threshold_are_rejected() {
        let mut v = small();
        v["normalizer_version"] = json!("other-norm");
        let err = ClassifierArtifact::from_json_str(&v.to_string()).unwrap_err();
        assert!(matches!(err, ArtifactLoadError::NormalizerMismatch { .. }));

        for bad in [1.5, 0.7, 0.3] {
            let mut v = small();
            v["threshold"] = json!(bad);
            let err = ClassifierArtifact::from_json_str(&v.to_string()).unwrap_err();
            assert!(matches!(err, ArtifactLoadError::InvalidThreshold(t) if t == bad));
        }

        let mut v = small();
        v["threshold"] = json!(0.5);
        assert!(ClassifierArtifact::from_json_str(&v.to_string()).is_ok());
    }

    #[test]
    fn decide_is_consistent_with_threshold() {
        let c = LinearClassifier::new(vec![], 0.0);
        assert_eq!(c.decide(0.5), (Label::Scam, 0.5));
        assert_eq!(c.decide(0.8).0, Label::Scam);
        let (label, conf) = c.decide(0.2);
        assert_eq!(label, Label::Real);
        assert!((conf - 0.8).abs() < 1e-12);
        for p in [0.0, 0.1, 0.49, 0.5, 0.6, 0.99, 1.0] {
            let (_, conf) = c.decide(p);
            assert!((0.5..=1.0).contains(&conf), "p={p} conf={conf}");
        }
    }

    #[test]
    fn sigmoid_is_stable_at_extremes() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(800.0) <= 1.0 && sigmoid(800.0) > 0.999);
        assert!(sigmoid(-800.0) >= 0.0 && sigmoid(-800.0) < 0.001);
    }

    #[test]
    fn json_round_trip_preserves_model() {
        let a = ClassifierArtifact::from_json_str(&small().to_string()).unwrap();
        let b = ClassifierArtifact::from_json_str(&a.to_json_string().unwrap()).unwrap();
        assert_eq!(a.vectorizer.terms(), b.vectorizer.terms());
        assert_eq!(a.classifier.weights(), b.classifier.weights());
        assert_eq!(a.classifier.bias(), b.classifier.bias());
    }
}
