// src/train.rs
//! Offline trainer: builds a vocabulary + IDF table from a labelled corpus and
//! fits L2-regularized logistic regression with full-batch gradient descent.
//!
//! Training is deterministic: same corpus and options, same artifact.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Deserialize;

use crate::analyze::classifier::{sigmoid, ClassifierArtifact, Label};
use crate::analyze::normalizer::{normalize, TokenSequence};
use crate::analyze::vectorizer::{idf, FeatureVector};
use crate::error::TrainError;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub message: String,
    pub label: Label,
}

#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub max_features: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            max_features: 10_000,
            epochs: 300,
            learning_rate: 0.5,
            l2: 1e-3,
        }
    }
}

/// Map the label spellings found in the wild onto [`Label`].
pub fn parse_label(raw: &str) -> Option<Label> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "scam" | "requires caution" | "spam" | "1" => Some(Label::Scam),
        "real" | "likely genuine" | "ham" | "legit" | "0" => Some(Label::Real),
        _ => None,
    }
}

#[derive(Deserialize)]
struct JsonLine {
    #[serde(alias = "text")]
    message: String,
    label: String,
}

/// Parse a corpus: JSON lines (`{"message": .., "label": ..}`) or
/// `label<TAB>message` lines. Blank lines and `#` comments are skipped.
pub fn parse_corpus(input: &str) -> anyhow::Result<Vec<TrainingExample>> {
    let mut out = Vec::new();
    for (n, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (label_raw, message) = if line.starts_with('{') {
            let row: JsonLine = serde_json::from_str(line)
                .map_err(|e| anyhow::anyhow!("line {}: invalid JSON: {}", n + 1, e))?;
            (row.label, row.message)
        } else {
            let (l, m) = line
                .split_once('\t')
                .ok_or_else(|| anyhow::anyhow!("line {}: expected `label<TAB>message`", n + 1))?;
            (l.to_string(), m.to_string())
        };
        let label = parse_label(&label_raw)
            .ok_or_else(|| anyhow::anyhow!("line {}: unknown label `{}`", n + 1, label_raw))?;
        out.push(TrainingExample { message, label });
    }
    Ok(out)
}

/// Fit a model. The result is a fresh artifact; nothing shared is mutated.
pub fn train(
    examples: &[TrainingExample],
    opts: &TrainOptions,
) -> Result<ClassifierArtifact, TrainError> {
    if examples.is_empty() {
        return Err(TrainError::EmptyCorpus);
    }
    let positives = examples.iter().filter(|e| e.label == Label::Scam).count();
    if positives == 0 {
        return Err(TrainError::SingleClass("real"));
    }
    if positives == examples.len() {
        return Err(TrainError::SingleClass("scam"));
    }

    let docs: Vec<TokenSequence> = examples.iter().map(|e| normalize(&e.message)).collect();
    let n_docs = docs.len();

    // document frequency per term
    let mut df: HashMap<&str, usize> = HashMap::new();
    for doc in &docs {
        let unique: HashSet<&str> = doc.iter().map(String::as_str).collect();
        for t in unique {
            *df.entry(t).or_insert(0) += 1;
        }
    }

    // keep the most frequent terms; ties broken alphabetically, then index alphabetically
    let mut ranked: Vec<(&str, usize)> = df.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked.truncate(opts.max_features.max(1));
    ranked.sort_by(|a, b| a.0.cmp(b.0));
    if ranked.is_empty() {
        return Err(TrainError::EmptyVocabulary);
    }

    let vocabulary: BTreeMap<String, usize> = ranked
        .iter()
        .enumerate()
        .map(|(i, (t, _))| (t.to_string(), i))
        .collect();
    let idf_table: Vec<f64> = ranked.iter().map(|(_, d)| idf(n_docs, *d)).collect();
    let dim = idf_table.len();

    // vectorize with a provisional artifact (zero weights) so training and
    // inference share one transform
    let shell = ClassifierArtifact::from_parts(
        vocabulary.clone(),
        idf_table.clone(),
        vec![0.0; dim],
        0.0,
        Some(n_docs as u64),
    )
    .map_err(|_| TrainError::EmptyVocabulary)?;
    let xs: Vec<FeatureVector> = docs.iter().map(|d| shell.vectorizer.transform(d)).collect();
    let ys: Vec<f64> = examples
        .iter()
        .map(|e| if e.label == Label::Scam { 1.0 } else { 0.0 })
        .collect();

    // start from the prior log-odds so an empty vector scores the base rate
    let prior = positives as f64 / n_docs as f64;
    let mut bias = (prior / (1.0 - prior)).ln();
    let mut weights = vec![0.0f64; dim];
    let n = n_docs as f64;

    for epoch in 0..opts.epochs {
        let mut grad_w = vec![0.0f64; dim];
        let mut grad_b = 0.0f64;
        let mut loss = 0.0f64;
        for (x, y) in xs.iter().zip(&ys) {
            let z = x
                .entries()
                .iter()
                .fold(bias, |acc, (i, v)| acc + weights[*i] * v);
            let p = sigmoid(z);
            let err = p - y;
            for (i, v) in x.entries() {
                grad_w[*i] += err * v;
            }
            grad_b += err;
            loss -= y * p.max(1e-12).ln() + (1.0 - y) * (1.0 - p).max(1e-12).ln();
        }
        for (w, g) in weights.iter_mut().zip(&grad_w) {
            *w -= opts.learning_rate * (g / n + opts.l2 * *w);
        }
        bias -= opts.learning_rate * grad_b / n;

        if epoch % 50 == 0 || epoch + 1 == opts.epochs {
            tracing::debug!(epoch, loss = loss / n, "training progress");
        }
    }

    tracing::info!(
        documents = n_docs,
        vocabulary = dim,
        positives,
        bias,
        "model trained"
    );

    ClassifierArtifact::from_parts(
        vocabulary,
        idf_table,
        weights,
        bias,
        Some(n_docs as u64),
    )
    .map_err(|_| TrainError::EmptyVocabulary)
}

/// Share of examples the artifact labels correctly.
pub fn accuracy(model: &ClassifierArtifact, examples: &[TrainingExample]) -> f64 {
    if examples.is_empty() {
        return 0.0;
    }
    let correct = examples
        .iter()
        .filter(|e| {
            let x = model.vectorizer.transform(&normalize(&e.message));
            model.classifier.decide(model.classifier.probability(&x)).0 == e.label
        })
        .count();
    correct as f64 / examples.len() as f64
}
