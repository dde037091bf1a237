// src/analyze/mod.rs
//! Scoring side: normalization, TF-IDF, logistic classifier, explanations, risk patterns.

pub mod classifier;
pub mod explain;
pub mod normalizer;
pub mod patterns;
pub mod pipeline;
pub mod vectorizer;

pub use classifier::{ClassifierArtifact, Label};
pub use pipeline::{ClassificationPipeline, ClassificationResult};
