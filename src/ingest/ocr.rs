// src/ingest/ocr.rs
//! OCR client: service abstraction + content-hash cache + daily budget.
//!
//! `OcrClient::extract` never fails. Timeouts, remote errors, malformed
//! payloads and an exhausted budget all degrade to [`OcrOutcome::Fallback`],
//! which callers classify with whatever text they already have.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::ocr::OcrConfig;
use crate::ingest::image_prep::{self, ImageMeta};
use crate::ingest::types::Provenance;
use crate::metrics::{
    ensure_metrics_described, OCR_API_CALLS, OCR_CACHE_HITS, OCR_FALLBACKS, OCR_RETRIES,
};

// ------------------------------------------------------------
// Errors and outcomes
// ------------------------------------------------------------

/// Why an image fell back instead of returning recognized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    Timeout,
    Network,
    ServerError,
    ClientError,
    MalformedResponse,
    ServiceError,
    QuotaExhausted,
    Disabled,
    NoText,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::Timeout => "timeout",
            FallbackReason::Network => "network",
            FallbackReason::ServerError => "server_error",
            FallbackReason::ClientError => "client_error",
            FallbackReason::MalformedResponse => "malformed_response",
            FallbackReason::ServiceError => "service_error",
            FallbackReason::QuotaExhausted => "quota_exhausted",
            FallbackReason::Disabled => "disabled",
            FallbackReason::NoText => "no_text",
        }
    }
}

/// Failure of a single remote call. Only `Transient` is retried.
#[derive(Debug, Clone, Error)]
pub enum OcrError {
    #[error("transient OCR failure ({}): {detail}", .reason.as_str())]
    Transient {
        reason: FallbackReason,
        detail: String,
    },
    #[error("permanent OCR failure ({}): {detail}", .reason.as_str())]
    Permanent {
        reason: FallbackReason,
        detail: String,
    },
}

impl OcrError {
    pub fn transient(reason: FallbackReason, detail: impl Into<String>) -> Self {
        OcrError::Transient {
            reason,
            detail: detail.into(),
        }
    }

    pub fn permanent(reason: FallbackReason, detail: impl Into<String>) -> Self {
        OcrError::Permanent {
            reason,
            detail: detail.into(),
        }
    }

    pub fn reason(&self) -> FallbackReason {
        match self {
            OcrError::Transient { reason, .. } | OcrError::Permanent { reason, .. } => *reason,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, OcrError::Transient { .. })
    }
}

/// Result of `OcrClient::extract`.
#[derive(Debug, Clone, PartialEq)]
pub enum OcrOutcome {
    Recognized {
        text: String,
        cache_hit: bool,
    },
    Fallback {
        text: String,
        reason: FallbackReason,
        meta: Option<ImageMeta>,
    },
}

impl OcrOutcome {
    pub fn text(&self) -> &str {
        match self {
            OcrOutcome::Recognized { text, .. } | OcrOutcome::Fallback { text, .. } => text,
        }
    }

    pub fn provenance(&self) -> Provenance {
        match self {
            OcrOutcome::Recognized { .. } => Provenance::Ocr,
            OcrOutcome::Fallback { .. } => Provenance::OcrFallback,
        }
    }

    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        match self {
            OcrOutcome::Fallback { reason, .. } => Some(*reason),
            OcrOutcome::Recognized { .. } => None,
        }
    }
}

/// Cached recognition result, keyed by the SHA-256 of the image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrCacheEntry {
    pub content_hash: String,
    pub extracted_text: String,
    pub timestamp: DateTime<Utc>,
}

// ------------------------------------------------------------
// Service abstraction + concrete services
// ------------------------------------------------------------

/// Low-level service: does one *real* remote call. Separated so the same
/// caching client wraps production and test services.
#[async_trait]
pub trait OcrService: Send + Sync {
    async fn recognize(&self, image: &[u8], mime_type: &str) -> Result<String, OcrError>;
    fn name(&self) -> &'static str;

    /// `false` for a stand-in that never reaches a remote service.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// OCR.space-compatible HTTP service (multipart upload, JSON response).
pub struct OcrSpaceService {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    language: String,
}

impl OcrSpaceService {
    pub fn new(cfg: &OcrConfig) -> anyhow::Result<Self> {
        // The per-call deadline is enforced by the client with tokio::time::timeout.
        let http = reqwest::Client::builder()
            .user_agent(concat!("scam-detector/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            http,
            endpoint: cfg.endpoint.clone(),
            api_key: cfg.api_key.clone(),
            language: cfg.language.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceResponse {
    #[serde(default)]
    parsed_results: Option<Vec<OcrSpaceParsed>>,
    #[serde(default)]
    is_errored_on_processing: bool,
    #[serde(default)]
    error_message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceParsed {
    #[serde(default)]
    parsed_text: String,
}

#[async_trait]
impl OcrService for OcrSpaceService {
    async fn recognize(&self, image: &[u8], mime_type: &str) -> Result<String, OcrError> {
        let ext = mime_type.rsplit('/').next().unwrap_or("png");
        let part = reqwest::multipart::Part::bytes(image.to_vec())
            .file_name(format!("upload.{ext}"))
            .mime_str(mime_type)
            .map_err(|e| OcrError::permanent(FallbackReason::ClientError, e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("apikey", self.api_key.clone())
            .text("language", self.language.clone())
            .text("OCREngine", "2")
            .text("scale", "true")
            .text("detectOrientation", "true");

        let resp = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    FallbackReason::Timeout
                } else {
                    FallbackReason::Network
                };
                OcrError::transient(reason, e.to_string())
            })?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(OcrError::transient(
                FallbackReason::ServerError,
                format!("HTTP {status}"),
            ));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(OcrError::permanent(
                FallbackReason::QuotaExhausted,
                "remote rate limit",
            ));
        }
        if !status.is_success() {
            return Err(OcrError::permanent(
                FallbackReason::ClientError,
                format!("HTTP {status}"),
            ));
        }

        let body: OcrSpaceResponse = resp
            .json()
            .await
            .map_err(|e| OcrError::permanent(FallbackReason::MalformedResponse, e.to_string()))?;

        if body.is_errored_on_processing {
            let detail = match body.error_message {
                Some(serde_json::Value::String(s)) => s,
                Some(serde_json::Value::Array(items)) => items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
                _ => "unknown processing error".to_string(),
            };
            return Err(OcrError::permanent(FallbackReason::ServiceError, detail));
        }

        body.parsed_results
            .and_then(|r| r.into_iter().next())
            .map(|p| p.parsed_text)
            .ok_or_else(|| {
                OcrError::permanent(FallbackReason::MalformedResponse, "missing ParsedResults")
            })
    }

    fn name(&self) -> &'static str {
        "ocr.space"
    }
}

/// Always fails permanently; used when OCR is switched off or has no key.
pub struct DisabledOcrService;

#[async_trait]
impl OcrService for DisabledOcrService {
    async fn recognize(&self, _image: &[u8], _mime_type: &str) -> Result<String, OcrError> {
        Err(OcrError::permanent(
            FallbackReason::Disabled,
            "OCR service disabled",
        ))
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
    fn is_enabled(&self) -> bool {
        false
    }
}

// ------------------------------------------------------------
// Caching client (cache + daily limit + retry + fallback)
// ------------------------------------------------------------

/// Snapshot for `/ocr-status`.
#[derive(Debug, Clone, Serialize)]
pub struct OcrStatus {
    pub service: &'static str,
    pub endpoint: String,
    pub language: String,
    pub api_key_configured: bool,
    pub api_calls: u64,
    pub cache_hits: u64,
    pub successful_extractions: u64,
    pub fallback_used: u64,
    pub errors: u64,
    pub retries: u64,
    pub cached_entries: u64,
    pub daily_limit: u32,
    pub calls_today: u32,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct Stats {
    api_calls: AtomicU64,
    cache_hits: AtomicU64,
    successful: AtomicU64,
    fallbacks: AtomicU64,
    errors: AtomicU64,
    retries: AtomicU64,
}

#[derive(Debug, Clone)]
struct DailyBudget {
    date: NaiveDate,
    used: u32,
}

impl DailyBudget {
    fn today() -> Self {
        Self {
            date: Utc::now().date_naive(),
            used: 0,
        }
    }

    fn roll_over(&mut self) {
        let today = Utc::now().date_naive();
        if self.date != today {
            self.date = today;
            self.used = 0;
        }
    }
}

/// Content-hash cached, rate-limited, retrying OCR client. Share behind an `Arc`.
pub struct OcrClient {
    service: Arc<dyn OcrService>,
    endpoint: String,
    language: String,
    api_key_configured: bool,
    cache: Cache<String, Arc<OcrCacheEntry>>,
    timeout: Duration,
    retry_backoff: Duration,
    max_image_bytes: usize,
    daily_limit: u32,
    budget: Mutex<DailyBudget>,
    stats: Stats,
    last_error: Mutex<Option<String>>,
}

impl OcrClient {
    pub fn new(service: Arc<dyn OcrService>, cfg: &OcrConfig) -> Self {
        ensure_metrics_described();
        let cache = Cache::builder()
            .max_capacity(cfg.cache_capacity)
            .time_to_live(cfg.cache_ttl())
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self {
            service,
            endpoint: cfg.endpoint.clone(),
            language: cfg.language.clone(),
            api_key_configured: !cfg.api_key.is_empty(),
            cache,
            timeout: cfg.timeout(),
            retry_backoff: cfg.retry_backoff(),
            max_image_bytes: cfg.max_image_bytes(),
            daily_limit: cfg.daily_limit,
            budget: Mutex::new(DailyBudget::today()),
            stats: Stats::default(),
            last_error: Mutex::new(None),
        }
    }

    /// Factory: the remote service when enabled with a key, otherwise disabled.
    pub fn from_config(cfg: &OcrConfig) -> anyhow::Result<Self> {
        let service: Arc<dyn OcrService> = if cfg.enabled && !cfg.api_key.is_empty() {
            Arc::new(OcrSpaceService::new(cfg)?)
        } else {
            Arc::new(DisabledOcrService)
        };
        tracing::info!(service = service.name(), daily_limit = cfg.daily_limit, "OCR client ready");
        Ok(Self::new(service, cfg))
    }

    /// Recognize text in an image. Never fails; see [`OcrOutcome`].
    pub async fn extract(&self, image: &[u8], mime_type: &str) -> OcrOutcome {
        let key = content_hash(image);

        // a switched-off service neither spends budget nor counts as a call
        if !self.service.is_enabled() {
            return self.degrade(&key, image, FallbackReason::Disabled);
        }

        if let Some(entry) = self.cache.get(&key).await {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            counter!(OCR_CACHE_HITS).increment(1);
            tracing::debug!(hash = %&key[..12], "OCR cache hit");
            return OcrOutcome::Recognized {
                text: entry.extracted_text.clone(),
                cache_hit: true,
            };
        }

        // Concurrent misses for the same key share one remote call; errors are not cached.
        match self
            .cache
            .try_get_with(key.clone(), self.fetch(&key, image, mime_type))
            .await
        {
            Ok(entry) => OcrOutcome::Recognized {
                text: entry.extracted_text.clone(),
                cache_hit: false,
            },
            Err(err) => self.degrade(&key, image, err.reason()),
        }
    }

    fn degrade(&self, key: &str, image: &[u8], reason: FallbackReason) -> OcrOutcome {
        self.stats.fallbacks.fetch_add(1, Ordering::Relaxed);
        counter!(OCR_FALLBACKS, "reason" => reason.as_str()).increment(1);
        let meta = image_prep::probe(image);
        tracing::warn!(
            hash = %&key[..12],
            reason = reason.as_str(),
            width = meta.as_ref().map(|m| m.width),
            height = meta.as_ref().map(|m| m.height),
            "OCR degraded to fallback"
        );
        OcrOutcome::Fallback {
            text: String::new(),
            reason,
            meta,
        }
    }

    async fn fetch(
        &self,
        key: &str,
        image: &[u8],
        mime_type: &str,
    ) -> Result<Arc<OcrCacheEntry>, OcrError> {
        let prepared = {
            let bytes = image.to_vec();
            let mime = mime_type.to_string();
            let max = self.max_image_bytes;
            tokio::task::spawn_blocking(move || image_prep::prepare_for_upload(&bytes, &mime, max))
                .await
                .map_err(|e| OcrError::permanent(FallbackReason::ClientError, e.to_string()))?
        };

        let mut attempt = 0u32;
        let text = loop {
            attempt += 1;
            match self.call_once(&prepared.bytes, &prepared.mime_type).await {
                Ok(text) => break text,
                Err(e) if e.is_transient() && attempt == 1 => {
                    self.stats.retries.fetch_add(1, Ordering::Relaxed);
                    counter!(OCR_RETRIES).increment(1);
                    tracing::info!(
                        attempt,
                        reason = e.reason().as_str(),
                        backoff_ms = self.retry_backoff.as_millis() as u64,
                        "transient OCR failure; retrying"
                    );
                    tokio::time::sleep(self.retry_backoff).await;
                }
                Err(e) => {
                    self.record_error(&e);
                    return Err(e);
                }
            }
        };

        let text = text.trim().to_string();
        if text.is_empty() {
            let e = OcrError::permanent(FallbackReason::NoText, "service returned no text");
            self.record_error(&e);
            return Err(e);
        }

        self.stats.successful.fetch_add(1, Ordering::Relaxed);
        tracing::info!(hash = %&key[..12], chars = text.len(), "OCR extraction stored");
        Ok(Arc::new(OcrCacheEntry {
            content_hash: key.to_string(),
            extracted_text: text,
            timestamp: Utc::now(),
        }))
    }

    /// One budgeted, deadline-bounded remote call.
    async fn call_once(&self, image: &[u8], mime_type: &str) -> Result<String, OcrError> {
        {
            let mut b = self.budget.lock().unwrap_or_else(|p| p.into_inner());
            b.roll_over();
            if b.used >= self.daily_limit {
                return Err(OcrError::permanent(
                    FallbackReason::QuotaExhausted,
                    format!("daily limit of {} calls reached", self.daily_limit),
                ));
            }
            b.used += 1;
        }
        self.stats.api_calls.fetch_add(1, Ordering::Relaxed);
        counter!(OCR_API_CALLS).increment(1);

        match tokio::time::timeout(self.timeout, self.service.recognize(image, mime_type)).await {
            Ok(result) => result,
            Err(_) => Err(OcrError::transient(
                FallbackReason::Timeout,
                format!("no response within {:?}", self.timeout),
            )),
        }
    }

    fn record_error(&self, e: &OcrError) {
        self.stats.errors.fetch_add(1, Ordering::Relaxed);
        let mut last = self.last_error.lock().unwrap_or_else(|p| p.into_inner());
        *last = Some(e.to_string());
    }

    pub fn status(&self) -> OcrStatus {
        let calls_today = {
            let mut b = self.budget.lock().unwrap_or_else(|p| p.into_inner());
            b.roll_over();
            b.used
        };
        OcrStatus {
            service: self.service.name(),
            endpoint: self.endpoint.clone(),
            language: self.language.clone(),
            api_key_configured: self.api_key_configured,
            api_calls: self.stats.api_calls.load(Ordering::Relaxed),
            cache_hits: self.stats.cache_hits.load(Ordering::Relaxed),
            successful_extractions: self.stats.successful.load(Ordering::Relaxed),
            fallback_used: self.stats.fallbacks.load(Ordering::Relaxed),
            errors: self.stats.errors.load(Ordering::Relaxed),
            retries: self.stats.retries.load(Ordering::Relaxed),
            cached_entries: self.cache.entry_count(),
            daily_limit: self.daily_limit,
            calls_today,
            last_error: self
                .last_error
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .clone(),
        }
    }

    pub fn service_name(&self) -> &'static str {
        self.service.name()
    }
}

/// Hex SHA-256 of the raw image bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
