// src/config/ocr.rs
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, time::Duration};

pub const DEFAULT_OCR_CONFIG_PATH: &str = "config/ocr.json";
pub const ENV_OCR_CONFIG_PATH: &str = "OCR_CONFIG_PATH";
pub const DEFAULT_OCR_ENDPOINT: &str = "https://api.ocr.space/parse/image";

fn default_endpoint() -> String {
    DEFAULT_OCR_ENDPOINT.to_string()
}
fn default_language() -> String {
    "eng".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_image_size_mb() -> f64 {
    1.0
}
fn default_cache_ttl_days() -> u64 {
    30
}
fn default_cache_capacity() -> u64 {
    1024
}
fn default_daily_limit() -> u32 {
    500
}
fn default_retry_backoff_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// `false` short-circuits every image to the fallback path.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// "ENV" means: read from OCR_API_KEY.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Images above this size are downscaled before upload.
    #[serde(default = "default_max_image_size_mb")]
    pub max_image_size_mb: f64,
    #[serde(default = "default_cache_ttl_days")]
    pub cache_ttl_days: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    /// Remote calls allowed per UTC day.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_true() -> bool {
    true
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_endpoint(),
            api_key: String::new(),
            language: default_language(),
            timeout_secs: default_timeout_secs(),
            max_image_size_mb: default_max_image_size_mb(),
            cache_ttl_days: default_cache_ttl_days(),
            cache_capacity: default_cache_capacity(),
            daily_limit: default_daily_limit(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl OcrConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading OCR config {}", path.display()))?;
        let mut cfg: OcrConfig = serde_json::from_str(&data)
            .with_context(|| format!("parsing OCR config {}", path.display()))?;
        cfg.apply_env_overrides();
        cfg.resolve_api_key();
        cfg.sanitize();
        Ok(cfg)
    }

    /// Config file from `OCR_CONFIG_PATH` (or `config/ocr.json`) when present,
    /// otherwise defaults; env overrides apply either way.
    pub fn from_env() -> anyhow::Result<Self> {
        let path = env::var(ENV_OCR_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_OCR_CONFIG_PATH.into());
        if Path::new(&path).exists() {
            return Self::load_from_file(&path);
        }
        let mut cfg = Self {
            api_key: "ENV".into(),
            ..Self::default()
        };
        cfg.apply_env_overrides();
        cfg.resolve_api_key();
        cfg.sanitize();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse::<String>("OCR_API_DISABLED") {
            if matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes") {
                self.enabled = false;
            }
        }
        if let Ok(v) = env::var("OCR_API_ENDPOINT") {
            if !v.trim().is_empty() {
                self.endpoint = v.trim().to_string();
            }
        }
        if let Ok(v) = env::var("OCR_LANGUAGE") {
            if !v.trim().is_empty() {
                self.language = v.trim().to_string();
            }
        }
        if let Some(v) = env_parse("OCR_API_TIMEOUT") {
            self.timeout_secs = v;
        }
        if let Some(v) = env_parse("OCR_MAX_IMAGE_SIZE_MB") {
            self.max_image_size_mb = v;
        }
        if let Some(v) = env_parse("OCR_CACHE_TTL_DAYS") {
            self.cache_ttl_days = v;
        }
        if let Some(v) = env_parse("OCR_CACHE_CAPACITY") {
            self.cache_capacity = v;
        }
        if let Some(v) = env_parse("OCR_DAILY_LIMIT") {
            self.daily_limit = v;
        }
        if let Some(v) = env_parse("OCR_RETRY_BACKOFF_MS") {
            self.retry_backoff_ms = v;
        }
    }

    /// A missing key disables the remote service instead of failing startup.
    fn resolve_api_key(&mut self) {
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            match env::var("OCR_API_KEY") {
                Ok(k) if !k.trim().is_empty() => self.api_key = k.trim().to_string(),
                _ => {
                    if self.enabled {
                        tracing::warn!("OCR_API_KEY not set; remote OCR disabled");
                    }
                    self.api_key.clear();
                    self.enabled = false;
                }
            }
        }
    }

    fn sanitize(&mut self) {
        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }
        if !(self.max_image_size_mb.is_finite() && self.max_image_size_mb > 0.0) {
            self.max_image_size_mb = default_max_image_size_mb();
        }
        if self.cache_ttl_days == 0 {
            self.cache_ttl_days = default_cache_ttl_days();
        }
        if self.cache_capacity == 0 {
            self.cache_capacity = default_cache_capacity();
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_days.saturating_mul(86_400))
    }

    pub fn max_image_bytes(&self) -> usize {
        (self.max_image_size_mb * 1024.0 * 1024.0) as usize
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let c = OcrConfig::default();
        assert_eq!(c.timeout(), Duration::from_secs(30));
        assert_eq!(c.language, "eng");
        assert_eq!(c.max_image_bytes(), 1024 * 1024);
        assert_eq!(c.cache_ttl(), Duration::from_secs(30 * 86_400));
        assert_eq!(c.endpoint, DEFAULT_OCR_ENDPOINT);
    }

    #[test]
    fn file_values_are_sanitized() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"enabled": true, "api_key": "literal-key", "timeout_secs": 0, "max_image_size_mb": -2, "cache_capacity": 0}}"#
        )
        .unwrap();
        let c = OcrConfig::load_from_file(f.path()).unwrap();
        assert_eq!(c.api_key, "literal-key");
        assert_eq!(c.timeout_secs, 30);
        assert_eq!(c.max_image_size_mb, 1.0);
        assert_eq!(c.cache_capacity, 1024);
    }
}
