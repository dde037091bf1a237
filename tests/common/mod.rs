// tests/common/mod.rs
//
// Shared fixtures: the bundled demo artifact, a scriptable OCR service,
// and a pipeline wired around both. Not every test file uses every helper.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use scam_detector::analyze::patterns::RiskPatternMatcher;
use scam_detector::analyze::{ClassificationPipeline, ClassifierArtifact};
use scam_detector::config::ocr::OcrConfig;
use scam_detector::ingest::ocr::{FallbackReason, OcrError};
use scam_detector::ingest::{DocumentExtractor, OcrClient, OcrService};

pub const DEMO_MODEL: &str = include_str!("../../models/demo_model.json");

pub const SCENARIO_SCAM: &str =
    "Job opportunity! Work from home and earn $5000 weekly. Registration fee $50 required.";
pub const SCENARIO_REAL: &str =
    "Please find attached the quarterly report for your review.";

/// One scripted reply of [`ScriptedOcr`].
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Transient,
    Permanent,
    /// Sleep longer than any test timeout.
    Hang,
}

/// Counting OCR double. Plays `script` in order, then repeats `fallback_reply`.
pub struct ScriptedOcr {
    script: Mutex<VecDeque<Reply>>,
    fallback_reply: Reply,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedOcr {
    pub fn always(reply: Reply) -> Arc<Self> {
        Self::scripted(Vec::new(), reply)
    }

    pub fn scripted(script: Vec<Reply>, then: Reply) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback_reply: then,
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        })
    }

    /// Every call waits `delay` before answering.
    pub fn slow(reply: Reply, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback_reply: reply,
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrService for ScriptedOcr {
    async fn recognize(&self, _image: &[u8], _mime_type: &str) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback_reply.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match reply {
            Reply::Text(t) => Ok(t),
            Reply::Transient => Err(OcrError::transient(FallbackReason::ServerError, "503")),
            Reply::Permanent => Err(OcrError::permanent(FallbackReason::ClientError, "400")),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok("too late".into())
            }
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Small, fast settings: 1s deadline, 10ms backoff.
pub fn test_ocr_config() -> OcrConfig {
    OcrConfig {
        enabled: true,
        api_key: "test".into(),
        timeout_secs: 1,
        retry_backoff_ms: 10,
        cache_capacity: 64,
        daily_limit: 100,
        ..OcrConfig::default()
    }
}

pub fn demo_artifact() -> ClassifierArtifact {
    ClassifierArtifact::from_json_str(DEMO_MODEL).expect("demo artifact parses")
}

pub fn ocr_client(service: Arc<dyn OcrService>, cfg: &OcrConfig) -> Arc<OcrClient> {
    Arc::new(OcrClient::new(service, cfg))
}

pub fn pipeline_with(ocr: Arc<OcrClient>) -> Arc<ClassificationPipeline> {
    Arc::new(ClassificationPipeline::new(
        Arc::new(demo_artifact()),
        Arc::new(RiskPatternMatcher::bundled().expect("bundled patterns")),
        Arc::new(DocumentExtractor::new(ocr)),
    ))
}

/// Pipeline whose OCR always answers `text`.
pub fn demo_pipeline(ocr_text: &str) -> (Arc<ClassificationPipeline>, Arc<ScriptedOcr>) {
    let svc = ScriptedOcr::always(Reply::Text(ocr_text.to_string()));
    let client = ocr_client(svc.clone(), &test_ocr_config());
    (pipeline_with(client), svc)
}

/// Minimal DOCX container holding one paragraph per entry.
pub fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );

    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut zw = zip::ZipWriter::new(&mut buf);
        let opts = SimpleFileOptions::default();
        zw.start_file("[Content_Types].xml", opts).unwrap();
        zw.write_all(br#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
            .unwrap();
        zw.start_file("word/document.xml", opts).unwrap();
        zw.write_all(xml.as_bytes()).unwrap();
        zw.finish().unwrap();
    }
    buf.into_inner()
}
