//! Request and response types for all porch-daemon HTTP endpoints.
//!
//! No business logic lives here.

use porch_session::{DeliveryStatus, SessionId};
use serde::{Deserialize, Serialize};

pub const STATUS_OK: &str = "ok";
pub const STATUS_ERROR: &str = "error";

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Shared envelopes
// ---------------------------------------------------------------------------

/// `{ "status": "ok" | "error", "message": ... }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub status: String,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_OK.to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERROR.to_string(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// /start-delivery
// ---------------------------------------------------------------------------

/// Missing fields decode as `None` and are refused with 400 by the controller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartDeliveryRequest {
    #[serde(default, alias = "company_name")]
    pub company: Option<String>,
    #[serde(default)]
    pub delivery_info: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartDeliveryResponse {
    pub status: String,
    pub message: String,
    pub session_id: SessionId,
}

// ---------------------------------------------------------------------------
// /check-status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckStatusResponse {
    /// "idle" | "waiting_for_otp" | "otp_ready" | "completed"
    pub status: DeliveryStatus,
}

// ---------------------------------------------------------------------------
// /speak-otp
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakOtpResponse {
    pub status: String,
    /// Digit-by-digit form, e.g. "1... 2... 3... 4...".
    pub spoken_otp: String,
}

// ---------------------------------------------------------------------------
// /extract-delivery-info
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractRequest {
    #[serde(default)]
    pub text: Option<String>,
}
