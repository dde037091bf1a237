// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /detect  (message, base64 document, error cases)
// - POST /upload  (multipart)
// - GET /ocr-status

mod common;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use base64::Engine as _;
use serde_json::json;
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use common::{docx_bytes, ocr_client, pipeline_with, test_ocr_config, Reply, ScriptedOcr, SCENARIO_SCAM};
use scam_detector::{create_router, AppState};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests
const BOUNDARY: &str = "XyZboundary42";

fn test_router() -> Router {
    let svc = ScriptedOcr::always(Reply::Text(SCENARIO_SCAM.into()));
    let ocr = ocr_client(svc, &test_ocr_config());
    let pipeline = pipeline_with(ocr.clone());
    create_router(AppState::new(pipeline, ocr))
}

fn post_json(uri: &str, payload: &Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST")
}

async fn json_body(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("json body")
}

fn multipart_body(filename: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn post_multipart(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("build POST /upload")
}

#[tokio::test]
async fn health_reports_model_and_ocr_service() {
    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = test_router().oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);

    let v = json_body(resp).await;
    assert_eq!(v["status"], "ok");
    assert_eq!(v["ocr_service"], "scripted");
    assert!(v["vocabulary_size"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn detect_message_returns_result_contract() {
    let resp = test_router()
        .oneshot(post_json("/detect", &json!({ "message": SCENARIO_SCAM })))
        .await
        .expect("oneshot /detect");
    assert_eq!(resp.status(), StatusCode::OK);

    let v = json_body(resp).await;
    assert_eq!(v["classification"], "scam");
    assert_eq!(v["message"], SCENARIO_SCAM);
    assert_eq!(v["provenance"], "direct");
    assert!(v["confidence"].as_f64().unwrap() >= 0.5);
    assert!(v["confidence_percentage"].as_str().unwrap().ends_with('%'));
    assert_eq!(v["important_features"][0]["term"], "fee");
    assert_eq!(v["important_features"][0]["indicator_type"], "Scam indicator");
    assert!(v["explanations"].as_array().is_some_and(|a| !a.is_empty()));
    assert_eq!(v["high_risk_signals"][0]["pattern_id"], "upfront_fee");
    assert!(v.get("fallback_reason").is_none());
}

#[tokio::test]
async fn detect_real_message_omits_risk_signals() {
    let resp = test_router()
        .oneshot(post_json(
            "/detect",
            &json!({ "message": "Please find attached the quarterly report for your review." }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v["classification"], "real");
    assert!(v.get("high_risk_signals").is_none());
}

#[tokio::test]
async fn detect_without_message_or_file_is_400() {
    let resp = test_router()
        .oneshot(post_json("/detect", &json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v = json_body(resp).await;
    assert!(v["error"].as_str().unwrap().starts_with("No message or file provided"));
}

#[tokio::test]
async fn detect_with_malformed_json_is_400() {
    let req = Request::builder()
        .method("POST")
        .uri("/detect")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = test_router().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn detect_with_unsupported_file_type_is_400() {
    let payload = json!({ "file_content": "aGVsbG8=", "file_type": "rtf" });
    let resp = test_router().oneshot(post_json("/detect", &payload)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v = json_body(resp).await;
    assert!(v["error"].as_str().unwrap().contains("rtf"));
}

#[tokio::test]
async fn detect_file_content_requires_file_type() {
    let payload = json!({ "file_content": "aGVsbG8=" });
    let resp = test_router().oneshot(post_json("/detect", &payload)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn detect_base64_docx_is_parsed() {
    let docx = docx_bytes(&["Work from home and earn $5000 weekly.", "Registration fee $50 required."]);
    let encoded = base64::engine::general_purpose::STANDARD.encode(docx);
    let payload = json!({ "file_content": encoded, "file_type": "docx" });

    let resp = test_router().oneshot(post_json("/detect", &payload)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v["provenance"], "docx-parsed");
    assert_eq!(v["classification"], "scam");
    assert!(v["message"].as_str().unwrap().contains("Registration fee"));
}

#[tokio::test]
async fn upload_image_goes_through_ocr() {
    let resp = test_router()
        .oneshot(post_multipart(multipart_body("offer.png", b"png-bytes")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v["filename"], "offer.png");
    assert_eq!(v["provenance"], "ocr");
    assert_eq!(v["classification"], "scam");
}

#[tokio::test]
async fn upload_with_unsupported_extension_is_400() {
    let resp = test_router()
        .oneshot(post_multipart(multipart_body("letter.doc", b"binary")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_without_file_part_is_400() {
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{BOUNDARY}--\r\n"
    );
    let resp = test_router()
        .oneshot(post_multipart(body.into_bytes()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v = json_body(resp).await;
    assert_eq!(v["error"], "No file part in the request");
}

#[tokio::test]
async fn ocr_status_reports_counters() {
    let req = Request::builder()
        .method("GET")
        .uri("/ocr-status")
        .body(Body::empty())
        .unwrap();
    let resp = test_router().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v["service"], "scripted");
    assert_eq!(v["api_calls"], 0);
    assert_eq!(v["daily_limit"], 100);
}
