// src/lib.rs
// Public library surface for the server binary, the CLI tools, and integration tests.

pub mod analyze;
pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod train;

use std::sync::Arc;

use axum::Router;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::analyze::patterns::RiskPatternMatcher;
use crate::analyze::{ClassificationPipeline, ClassifierArtifact};
use crate::config::ocr::OcrConfig;
use crate::config::ServerConfig;
use crate::ingest::{DocumentExtractor, OcrClient};

// ---- Re-exports for stable public API ----
pub use crate::analyze::{ClassificationResult, Label};
pub use crate::api::{create_router, AppState};
pub use crate::error::{ArtifactLoadError, DetectError};
pub use crate::ingest::{ExtractedText, Provenance, RawInput};

/// Install the global tracing subscriber. `LOG_FORMAT=json` switches to JSON lines.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("scam_detector=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Load the artifact and catalogue, build the OCR client, and wire the pipeline.
pub fn build_state(server: &ServerConfig, ocr_cfg: &OcrConfig) -> anyhow::Result<AppState> {
    let model = ClassifierArtifact::load_from_file(&server.model_path)?;
    info!(
        path = %server.model_path.display(),
        vocabulary = model.vectorizer.len(),
        threshold = model.threshold(),
        "model artifact loaded"
    );

    let patterns = RiskPatternMatcher::bundled()?;
    let ocr = Arc::new(OcrClient::from_config(ocr_cfg)?);
    let extractor = Arc::new(DocumentExtractor::new(ocr.clone()));
    let pipeline = Arc::new(ClassificationPipeline::new(
        Arc::new(model),
        Arc::new(patterns),
        extractor,
    ));

    Ok(AppState {
        pipeline,
        ocr,
        body_limit_bytes: server.body_limit_bytes,
    })
}

/// Build the full application router, `/metrics` included. OCR settings are
/// read from the environment.
pub async fn app(server: &ServerConfig) -> anyhow::Result<Router> {
    let ocr_cfg = OcrConfig::from_env()?;
    // Recorder first, so descriptions registered while building the state land in it.
    let metrics = crate::metrics::Metrics::global(ocr_cfg.daily_limit);
    let state = build_state(server, &ocr_cfg)?;

    let mut router = api::create_router(state);
    if let Some(m) = metrics {
        router = router.merge(m.router());
    }
    Ok(router)
}
