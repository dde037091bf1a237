// src/analyze/vectorizer.rs
//! TF-IDF feature extraction against a frozen vocabulary.

use std::collections::{BTreeMap, HashMap};

/// Sparse feature vector: `(vocabulary index, tf * idf)` pairs sorted by index.
/// Only non-zero entries are stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    entries: Vec<(usize, f64)>,
}

impl FeatureVector {
    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.entries
            .binary_search_by_key(&index, |(i, _)| *i)
            .ok()
            .map(|pos| self.entries[pos].1)
    }
}

/// Frozen vocabulary plus per-term IDF weights.
#[derive(Debug, Clone)]
pub struct FeatureVectorizer {
    vocabulary: HashMap<String, usize>,
    terms: Vec<String>,
    idf: Vec<f64>,
}

impl FeatureVectorizer {
    /// `terms[i]` is the term at vocabulary index `i`. Callers validate shapes.
    pub(crate) fn from_parts(terms: Vec<String>, idf: Vec<f64>) -> Self {
        let vocabulary = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        Self {
            vocabulary,
            terms,
            idf,
        }
    }

    /// Raw term frequency times IDF. Tokens outside the vocabulary are dropped.
    pub fn transform(&self, tokens: &[String]) -> FeatureVector {
        let mut tf: BTreeMap<usize, u32> = BTreeMap::new();
        for tok in tokens {
            if let Some(&idx) = self.vocabulary.get(tok) {
                *tf.entry(idx).or_insert(0) += 1;
            }
        }
        let entries = tf
            .into_iter()
            .map(|(idx, count)| (idx, f64::from(count) * self.idf[idx]))
            .filter(|(_, w)| *w != 0.0)
            .collect();
        FeatureVector { entries }
    }

    pub fn term(&self, index: usize) -> Option<&str> {
        self.terms.get(index).map(String::as_str)
    }

    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.vocabulary.get(term).copied()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Inverse document frequency used by the trainer: `ln(N / (1 + df))`.
pub fn idf(document_count: usize, document_frequency: usize) -> f64 {
    (document_count as f64 / (1.0 + document_frequency as f64)).ln()
}
