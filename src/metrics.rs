// src/metrics.rs
//! Prometheus recorder + metric descriptions shared by the OCR client and the pipeline.

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const OCR_API_CALLS: &str = "ocr_api_calls_total";
pub const OCR_CACHE_HITS: &str = "ocr_cache_hits_total";
pub const OCR_RETRIES: &str = "ocr_retries_total";
pub const OCR_FALLBACKS: &str = "ocr_fallback_total";
pub const OCR_DAILY_LIMIT: &str = "ocr_daily_limit";
pub const CLASSIFY_TOTAL: &str = "classify_total";
pub const CLASSIFY_DURATION_MS: &str = "classify_duration_ms";

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(OCR_API_CALLS, "Remote OCR requests sent (retries included).");
        describe_counter!(OCR_CACHE_HITS, "OCR lookups served from the content-hash cache.");
        describe_counter!(OCR_RETRIES, "Remote OCR calls retried after a transient failure.");
        describe_counter!(
            OCR_FALLBACKS,
            "Images that degraded to fallback text, labelled by reason."
        );
        describe_gauge!(OCR_DAILY_LIMIT, "Configured daily budget of remote OCR calls.");
        describe_counter!(CLASSIFY_TOTAL, "Classifications produced, labelled by outcome.");
        describe_histogram!(
            CLASSIFY_DURATION_MS,
            "End-to-end classification time in milliseconds."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder once. Later calls reuse it;
    /// `None` means some other recorder is already installed.
    pub fn global(daily_limit: u32) -> Option<&'static Metrics> {
        static METRICS: OnceCell<Option<Metrics>> = OnceCell::new();
        METRICS
            .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
                Ok(handle) => {
                    ensure_metrics_described();
                    gauge!(OCR_DAILY_LIMIT).set(f64::from(daily_limit));
                    Some(Metrics { handle })
                }
                Err(e) => {
                    tracing::warn!(error = %e, "prometheus recorder not installed");
                    None
                }
            })
            .as_ref()
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
