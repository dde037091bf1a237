// tests/ocr_client.rs
//
// Caching, retry, deadline and daily-budget behaviour of OcrClient,
// driven by a scripted in-process service.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{ocr_client, test_ocr_config, Reply, ScriptedOcr};
use scam_detector::ingest::ocr::{content_hash, DisabledOcrService, FallbackReason};
use scam_detector::ingest::{OcrOutcome, Provenance};

const IMG: &[u8] = b"not-really-a-png";

#[tokio::test]
async fn second_extraction_of_same_bytes_hits_cache() {
    let svc = ScriptedOcr::always(Reply::Text("Pay the registration fee".into()));
    let client = ocr_client(svc.clone(), &test_ocr_config());

    let first = client.extract(IMG, "image/png").await;
    let second = client.extract(IMG, "image/png").await;

    assert_eq!(svc.calls(), 1);
    assert_eq!(first.text(), second.text());
    assert!(matches!(first, OcrOutcome::Recognized { cache_hit: false, .. }));
    assert!(matches!(second, OcrOutcome::Recognized { cache_hit: true, .. }));

    let status = client.status();
    assert_eq!(status.api_calls, 1);
    assert_eq!(status.cache_hits, 1);
    assert_eq!(status.successful_extractions, 1);
}

#[tokio::test]
async fn different_bytes_are_different_cache_keys() {
    let svc = ScriptedOcr::always(Reply::Text("hello".into()));
    let client = ocr_client(svc.clone(), &test_ocr_config());

    client.extract(b"image-a", "image/png").await;
    client.extract(b"image-b", "image/png").await;
    assert_eq!(svc.calls(), 2);
    assert_ne!(content_hash(b"image-a"), content_hash(b"image-b"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_share_one_remote_call() {
    let svc = ScriptedOcr::slow(Reply::Text("shared".into()), Duration::from_millis(100));
    let client = ocr_client(svc.clone(), &test_ocr_config());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let c = Arc::clone(&client);
            tokio::spawn(async move { c.extract(IMG, "image/png").await })
        })
        .collect();
    for h in handles {
        let outcome = h.await.expect("task");
        assert_eq!(outcome.text(), "shared");
    }
    assert_eq!(svc.calls(), 1);
}

#[tokio::test]
async fn transient_failure_is_retried_once() {
    let svc = ScriptedOcr::scripted(vec![Reply::Transient], Reply::Text("second try".into()));
    let client = ocr_client(svc.clone(), &test_ocr_config());

    let out = client.extract(IMG, "image/png").await;
    assert_eq!(out.text(), "second try");
    assert_eq!(out.provenance(), Provenance::Ocr);
    assert_eq!(svc.calls(), 2);
    assert_eq!(client.status().retries, 1);
}

#[tokio::test]
async fn two_transient_failures_degrade_to_fallback() {
    let svc = ScriptedOcr::always(Reply::Transient);
    let client = ocr_client(svc.clone(), &test_ocr_config());

    let out = client.extract(IMG, "image/png").await;
    assert_eq!(svc.calls(), 2);
    assert_eq!(out.fallback_reason(), Some(FallbackReason::ServerError));
    assert_eq!(out.text(), "");
    assert_eq!(out.provenance(), Provenance::OcrFallback);
}

#[tokio::test]
async fn permanent_failure_is_not_retried() {
    let svc = ScriptedOcr::always(Reply::Permanent);
    let client = ocr_client(svc.clone(), &test_ocr_config());

    let out = client.extract(IMG, "image/png").await;
    assert_eq!(svc.calls(), 1);
    assert_eq!(out.fallback_reason(), Some(FallbackReason::ClientError));
    assert_eq!(out.text(), "");

    let status = client.status();
    assert_eq!(status.fallback_used, 1);
    assert_eq!(status.errors, 1);
    assert!(status.last_error.is_some());
}

#[tokio::test]
async fn failures_are_not_cached() {
    let svc = ScriptedOcr::scripted(
        vec![Reply::Permanent],
        Reply::Text("recovered".into()),
    );
    let client = ocr_client(svc.clone(), &test_ocr_config());

    let first = client.extract(IMG, "image/png").await;
    assert!(first.fallback_reason().is_some());
    let second = client.extract(IMG, "image/png").await;
    assert_eq!(second.text(), "recovered");
    assert_eq!(svc.calls(), 2);
}

#[tokio::test]
async fn empty_recognition_is_a_no_text_fallback() {
    let svc = ScriptedOcr::always(Reply::Text("   ".into()));
    let client = ocr_client(svc.clone(), &test_ocr_config());

    let out = client.extract(IMG, "image/png").await;
    assert_eq!(out.fallback_reason(), Some(FallbackReason::NoText));
    assert_eq!(client.status().cached_entries, 0);
}

#[tokio::test]
async fn hung_service_times_out_and_falls_back() {
    let svc = ScriptedOcr::always(Reply::Hang);
    let client = ocr_client(svc.clone(), &test_ocr_config());

    let started = std::time::Instant::now();
    let out = client.extract(IMG, "image/png").await;
    assert_eq!(out.fallback_reason(), Some(FallbackReason::Timeout));
    // one retry, each bounded by the 1s deadline
    assert_eq!(svc.calls(), 2);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn daily_limit_exhaustion_falls_back_without_calling() {
    let mut cfg = test_ocr_config();
    cfg.daily_limit = 1;
    let svc = ScriptedOcr::always(Reply::Text("ok".into()));
    let client = ocr_client(svc.clone(), &cfg);

    let first = client.extract(b"one", "image/png").await;
    assert_eq!(first.text(), "ok");

    let second = client.extract(b"two", "image/png").await;
    assert_eq!(second.fallback_reason(), Some(FallbackReason::QuotaExhausted));
    assert_eq!(svc.calls(), 1);

    // cached content is still served once the budget is spent
    let again = client.extract(b"one", "image/png").await;
    assert_eq!(again.text(), "ok");

    let status = client.status();
    assert_eq!(status.calls_today, 1);
    assert_eq!(status.daily_limit, 1);
}

#[tokio::test]
async fn disabled_service_always_falls_back() {
    let client = ocr_client(Arc::new(DisabledOcrService), &test_ocr_config());
    let out = client.extract(IMG, "image/png").await;
    assert_eq!(out.fallback_reason(), Some(FallbackReason::Disabled));
    assert_eq!(client.service_name(), "disabled");
}

#[tokio::test]
async fn disabled_service_spends_no_budget() {
    let mut cfg = test_ocr_config();
    cfg.daily_limit = 1;
    let client = ocr_client(Arc::new(DisabledOcrService), &cfg);

    let first = client.extract(b"one", "image/png").await;
    let second = client.extract(b"two", "image/png").await;
    // the reason stays `disabled` even past the daily limit
    assert_eq!(first.fallback_reason(), Some(FallbackReason::Disabled));
    assert_eq!(second.fallback_reason(), Some(FallbackReason::Disabled));

    let status = client.status();
    assert_eq!(status.api_calls, 0);
    assert_eq!(status.calls_today, 0);
    assert_eq!(status.fallback_used, 2);
}
