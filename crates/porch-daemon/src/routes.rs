//! Axum router and all HTTP handlers for porch-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Tests in `tests/` compose the bare router directly.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use porch_session::SessionError;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, info};

use crate::{
    api_types::{
        CheckStatusResponse, ExtractRequest, HealthResponse, MessageResponse, SpeakOtpResponse,
        StartDeliveryRequest, StartDeliveryResponse, STATUS_OK,
    },
    state::{AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/start-delivery", post(start_delivery))
        .route("/check-status", get(check_status))
        .route("/speak-otp", get(speak_otp))
        .route("/cancel-delivery", post(cancel_delivery))
        .route("/extract-delivery-info", post(extract_delivery_info))
        .route("/v1/health", get(health))
        .route("/v1/session", get(session_snapshot))
        .route("/v1/stream", get(stream))
        .with_state(state)
}

/// Map a session failure onto its status code and `{status:"error"}` body.
fn session_error_response(err: &SessionError) -> Response {
    let code = match err {
        SessionError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        SessionError::Conflict { .. } => StatusCode::CONFLICT,
        SessionError::NotReady => StatusCode::NOT_FOUND,
        SessionError::NotCancellable { .. } => StatusCode::BAD_REQUEST,
    };
    (code, Json(MessageResponse::error(err.to_string()))).into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /start-delivery
// ---------------------------------------------------------------------------

/// Start the delivery session and spawn the homeowner notifier.
///
/// A body that is missing or not JSON is treated as missing fields (400).
pub(crate) async fn start_delivery(
    State(st): State<Arc<AppState>>,
    payload: Result<Json<StartDeliveryRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            debug!(%rejection, "start-delivery body rejected");
            StartDeliveryRequest::default()
        }
    };

    let company = req.company.unwrap_or_default();
    let delivery_info = req.delivery_info.unwrap_or_default();

    match st.sessions.start_delivery(&company, &delivery_info).await {
        // The notifier handle is dropped: the task runs detached.
        Ok(started) => (
            StatusCode::OK,
            Json(StartDeliveryResponse {
                status: STATUS_OK.to_string(),
                message: "Homeowner notification process started.".to_string(),
                session_id: started.session_id,
            }),
        )
            .into_response(),
        Err(err) => session_error_response(&err),
    }
}

// ---------------------------------------------------------------------------
// GET /check-status
// ---------------------------------------------------------------------------

pub(crate) async fn check_status(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let status = st.sessions.check_status().await;
    (StatusCode::OK, Json(CheckStatusResponse { status }))
}

// ---------------------------------------------------------------------------
// GET /speak-otp
// ---------------------------------------------------------------------------

pub(crate) async fn speak_otp(State(st): State<Arc<AppState>>) -> Response {
    match st.sessions.retrieve_otp().await {
        Ok(spoken_otp) => (
            StatusCode::OK,
            Json(SpeakOtpResponse {
                status: STATUS_OK.to_string(),
                spoken_otp,
            }),
        )
            .into_response(),
        Err(err) => session_error_response(&err),
    }
}

// ---------------------------------------------------------------------------
// POST /cancel-delivery
// ---------------------------------------------------------------------------

pub(crate) async fn cancel_delivery(State(st): State<Arc<AppState>>) -> Response {
    match st.sessions.cancel_delivery().await {
        Ok(_) => (
            StatusCode::OK,
            Json(MessageResponse::ok("Delivery cancelled.")),
        )
            .into_response(),
        Err(err) => session_error_response(&err),
    }
}

// ---------------------------------------------------------------------------
// POST /extract-delivery-info
// ---------------------------------------------------------------------------

/// Forward driver speech to the extraction gateway. Never touches the session.
pub(crate) async fn extract_delivery_info(
    State(st): State<Arc<AppState>>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Response {
    let text = payload
        .ok()
        .and_then(|Json(req)| req.text)
        .filter(|t| !t.trim().is_empty());

    let Some(text) = text else {
        return (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::error("No text provided.")),
        )
            .into_response();
    };

    match st.extractor.extract(&text).await {
        Ok(extracted) => {
            info!(
                upstream = st.extractor.name(),
                company_known = extracted.company_known(),
                "delivery details extracted"
            );
            (StatusCode::OK, Json(extracted)).into_response()
        }
        Err(err) => {
            error!(upstream = st.extractor.name(), error = %err, "extraction failed");
            let _ = st.bus.send(BusMsg::LogLine {
                level: "ERROR".to_string(),
                msg: format!("extraction failed: {err}"),
            });
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MessageResponse::error(format!(
                    "Failed to process text with AI: {err}"
                ))),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// GET /v1/session
// ---------------------------------------------------------------------------

pub(crate) async fn session_snapshot(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(st.sessions.snapshot().await))
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Session(_) => "session",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
