// src/config/mod.rs
pub mod ocr;

use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const ENV_MODEL_PATH: &str = "MODEL_PATH";
pub const DEFAULT_MODEL_PATH: &str = "models/scam_model.json";
/// Bundled example artifact, used only when `MODEL_PATH` is unset and the
/// default model has not been trained yet.
pub const DEMO_MODEL_PATH: &str = "models/demo_model.json";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub model_path: PathBuf,
    /// Upper bound for request bodies (uploads are base64 or multipart).
    pub body_limit_bytes: usize,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let port = match env::var("PORT") {
            Ok(v) => v
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid PORT `{v}`: {e}"))?,
            Err(_) => 5000,
        };
        let bind_addr = env::var("BIND_ADDR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        let body_limit_bytes = env::var("MAX_UPLOAD_MB")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|mb| *mb > 0)
            .unwrap_or(16)
            * 1024
            * 1024;

        Ok(Self {
            bind_addr,
            port,
            model_path: resolve_model_path(env::var(ENV_MODEL_PATH).ok()),
            body_limit_bytes,
        })
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid bind address {}:{}: {e}", self.bind_addr, self.port))
    }
}

/// An explicit `MODEL_PATH` is used as-is (a missing file is a startup error).
fn resolve_model_path(explicit: Option<String>) -> PathBuf {
    match explicit.filter(|p| !p.trim().is_empty()) {
        Some(p) => PathBuf::from(p.trim()),
        None if Path::new(DEFAULT_MODEL_PATH).exists() => PathBuf::from(DEFAULT_MODEL_PATH),
        None => {
            tracing::warn!(
                default = DEFAULT_MODEL_PATH,
                fallback = DEMO_MODEL_PATH,
                "no trained model found; using the bundled demo artifact"
            );
            PathBuf::from(DEMO_MODEL_PATH)
        }
    }
}
