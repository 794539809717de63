//! Shared runtime state for porch-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The delivery session
//! itself lives inside [`SessionController`]; this module only wires it to
//! the extraction gateway and the SSE bus.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use porch_config::{secrets::ResolvedSecrets, DaemonConfig};
use porch_extract::{DeliveryExtractor, GeminiExtractor, UnconfiguredExtractor};
use porch_session::{NotifierSettings, RandomOtp, SessionController, SessionEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Session(SessionEvent),
    LogLine { level: String, msg: String },
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Static build metadata.
    pub build: BuildInfo,
    /// The single delivery session and its notifier.
    pub sessions: SessionController,
    /// Upstream speech-to-fields extraction.
    pub extractor: Arc<dyn DeliveryExtractor>,
}

impl AppState {
    pub fn new(sessions: SessionController, extractor: Arc<dyn DeliveryExtractor>) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        Self {
            bus,
            build: BuildInfo {
                service: "porch-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            sessions,
            extractor,
        }
    }

    /// Build state from boot config. Without an API key the extraction route
    /// stays up and answers 500 (not configured).
    pub fn from_config(cfg: &DaemonConfig, secrets: &ResolvedSecrets) -> anyhow::Result<Self> {
        let sessions = SessionController::new(
            NotifierSettings {
                delay: cfg.notifier.delay(),
            },
            Arc::new(RandomOtp::new(cfg.notifier.otp_min, cfg.notifier.otp_max)),
        );

        let extractor: Arc<dyn DeliveryExtractor> = match &secrets.extraction_api_key {
            Some(key) => {
                let gemini = GeminiExtractor::new(key.clone(), cfg.extraction.timeout())
                    .context("extraction client init failed")?
                    .with_base_url(cfg.extraction.base_url.clone())
                    .with_model(cfg.extraction.model.clone());
                info!(model = %cfg.extraction.model, "extraction gateway configured");
                Arc::new(gemini)
            }
            None => {
                warn!(
                    env = %cfg.extraction.api_key_env,
                    "extraction api key not set; /extract-delivery-info will answer 500"
                );
                Arc::new(UnconfiguredExtractor)
            }
        };

        Ok(Self::new(sessions, extractor))
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Spawn a background task that relays session transitions onto the SSE bus.
///
/// Lagged receivers skip the missed events; the task ends when the
/// controller (and every clone of it) is dropped.
pub fn spawn_session_relay(state: &AppState) {
    let mut rx = state.sessions.subscribe();
    let bus = state.bus.clone();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    let _ = bus.send(BusMsg::Session(ev));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "session relay lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
