//! Scenario: POST /extract-delivery-info is a pure pass-through to the
//! extraction gateway and never touches the delivery session.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use porch_daemon::{routes, state};
use porch_extract::{
    DeliveryExtractor, ExtractedDelivery, ExtractionError, GeminiExtractor, UnconfiguredExtractor,
};
use porch_session::{FixedOtp, NotifierSettings, SessionController};
use tower::ServiceExt;

/// Returns a canned extraction and records the last input it saw.
struct CannedExtractor {
    seen: tokio::sync::Mutex<Option<String>>,
}

#[async_trait::async_trait]
impl DeliveryExtractor for CannedExtractor {
    fn name(&self) -> &'static str {
        "canned"
    }

    async fn extract(&self, raw_text: &str) -> Result<ExtractedDelivery, ExtractionError> {
        *self.seen.lock().await = Some(raw_text.to_string());
        Ok(ExtractedDelivery {
            company_name: "Acme Logistics".to_string(),
            delivery_info: "unknown".to_string(),
        })
    }
}

fn make_state(extractor: Arc<dyn DeliveryExtractor>) -> Arc<state::AppState> {
    let sessions = SessionController::new(
        NotifierSettings {
            delay: Duration::from_secs(5),
        },
        Arc::new(FixedOtp("1234".to_string())),
    );
    Arc::new(state::AppState::new(sessions, extractor))
}

async fn call(st: &Arc<state::AppState>, req: Request<axum::body::Body>) -> (StatusCode, serde_json::Value) {
    let resp = routes::build_router(Arc::clone(st))
        .oneshot(req)
        .await
        .expect("oneshot failed");
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).expect("body is not valid JSON");
    (status, json)
}

fn extract_req(body: serde_json::Value) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri("/extract-delivery-info")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

async fn status_of(st: &Arc<state::AppState>) -> serde_json::Value {
    let req = Request::builder()
        .uri("/check-status")
        .body(axum::body::Body::empty())
        .unwrap();
    call(st, req).await.1["status"].clone()
}

#[tokio::test]
async fn missing_or_blank_text_returns_400() {
    let st = make_state(Arc::new(UnconfiguredExtractor));

    for body in [
        serde_json::json!({}),
        serde_json::json!({"text": ""}),
        serde_json::json!({"text": "   "}),
        serde_json::json!({"text": null}),
    ] {
        let (code, json) = call(&st, extract_req(body.clone())).await;
        assert_eq!(code, StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(json["message"], "No text provided.");
    }
}

#[tokio::test]
async fn extracted_fields_are_forwarded_verbatim() {
    let canned = Arc::new(CannedExtractor {
        seen: tokio::sync::Mutex::new(None),
    });
    let st = make_state(canned.clone());

    let (code, json) = call(
        &st,
        extract_req(serde_json::json!({"text": "hi, Acme Logistics here"})),
    )
    .await;

    assert_eq!(code, StatusCode::OK);
    assert_eq!(json["company_name"], "Acme Logistics");
    assert_eq!(json["delivery_info"], "unknown");
    assert_eq!(
        canned.seen.lock().await.as_deref(),
        Some("hi, Acme Logistics here")
    );
    assert_eq!(status_of(&st).await, "idle");
}

#[tokio::test]
async fn unconfigured_gateway_returns_500_and_logs_to_bus() {
    let st = make_state(Arc::new(UnconfiguredExtractor));
    let mut bus = st.bus.subscribe();

    let (code, json) = call(&st, extract_req(serde_json::json!({"text": "FedEx"}))).await;
    assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["status"], "error");
    assert!(json["message"]
        .as_str()
        .unwrap()
        .starts_with("Failed to process text with AI:"));

    match bus.try_recv().expect("no bus message") {
        state::BusMsg::LogLine { level, msg } => {
            assert_eq!(level, "ERROR");
            assert!(msg.contains("not configured"), "msg: {msg}");
        }
        other => panic!("unexpected bus message: {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_upstream_returns_500_without_touching_session() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gemini = GeminiExtractor::new("test-key", Duration::from_secs(2))
        .unwrap()
        .with_base_url(format!("http://{addr}/v1beta"));
    let st = make_state(Arc::new(gemini));

    let (code, _) = call(&st, extract_req(serde_json::json!({"text": "FedEx"}))).await;
    assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(status_of(&st).await, "idle");
}

#[tokio::test]
async fn extraction_failure_leaves_live_session_alone() {
    let st = make_state(Arc::new(UnconfiguredExtractor));

    let start = Request::builder()
        .method("POST")
        .uri("/start-delivery")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(
            serde_json::json!({"company": "Acme", "delivery_info": "a letter"}).to_string(),
        ))
        .unwrap();
    let (code, _) = call(&st, start).await;
    assert_eq!(code, StatusCode::OK);

    let (code, _) = call(&st, extract_req(serde_json::json!({"text": "FedEx"}))).await;
    assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(status_of(&st).await, "waiting_for_otp");
}
