//! Value types shared by the store, the notifier and the controller.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// DeliveryStatus
// ---------------------------------------------------------------------------

/// Lifecycle stage of the delivery session.
///
/// Serialized verbatim as `idle` | `waiting_for_otp` | `otp_ready` | `completed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Idle,
    WaitingForOtp,
    OtpReady,
    Completed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Idle => "idle",
            DeliveryStatus::WaitingForOtp => "waiting_for_otp",
            DeliveryStatus::OtpReady => "otp_ready",
            DeliveryStatus::Completed => "completed",
        }
    }

    /// `true` while a session occupies the single delivery slot.
    pub fn is_live(&self) -> bool {
        matches!(self, DeliveryStatus::WaitingForOtp | DeliveryStatus::OtpReady)
    }

    /// `true` if a new session may begin from this stage.
    pub fn accepts_start(&self) -> bool {
        !self.is_live()
    }

    /// The complete edge set of the session state machine.
    ///
    /// | from            | to              | trigger  |
    /// |-----------------|-----------------|----------|
    /// | Idle            | WaitingForOtp   | start    |
    /// | Completed       | WaitingForOtp   | start    |
    /// | WaitingForOtp   | OtpReady        | notifier |
    /// | WaitingForOtp   | Idle            | cancel   |
    /// | OtpReady        | Completed       | retrieve |
    pub fn can_transition_to(&self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        matches!(
            (self, next),
            (Idle, WaitingForOtp)
                | (Completed, WaitingForOtp)
                | (WaitingForOtp, OtpReady)
                | (WaitingForOtp, Idle)
                | (OtpReady, Completed)
        )
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SessionId (generation token)
// ---------------------------------------------------------------------------

/// Opaque token identifying one Start-to-Completed lifecycle.
///
/// Every Start mints a fresh id; a notifier carries the id it was spawned
/// for, so a result from an older generation can be told apart and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Otp
// ---------------------------------------------------------------------------

/// A one-time passcode. `Debug` never prints the digits.
#[derive(Clone, PartialEq, Eq)]
pub struct Otp(String);

impl Otp {
    pub fn new(code: impl Into<String>) -> Self {
        Otp(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render the code for text-to-speech: every digit followed by `...`,
    /// separated by single spaces (`"1234"` -> `"1... 2... 3... 4..."`).
    pub fn spoken(&self) -> String {
        spoken_digits(&self.0)
    }
}

impl fmt::Debug for Otp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Otp(<REDACTED>)")
    }
}

pub fn spoken_digits(code: &str) -> String {
    code.chars()
        .map(|c| format!("{c}..."))
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Store operation outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    Accepted(SessionId),
    /// A live session holds the slot; carries its current stage.
    Rejected(DeliveryStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    /// Already resolved, never started, or the id is not the current session.
    Rejected(DeliveryStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    Applied,
    /// Generation changed or cancellation was recorded first; the OTP is discarded.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Otp { session_id: SessionId, otp: Otp },
    NotReady,
}

// ---------------------------------------------------------------------------
// Snapshot / events
// ---------------------------------------------------------------------------

/// Read-only copy of the session record. Never carries the OTP value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: DeliveryStatus,
    pub session_id: Option<SessionId>,
    pub company: Option<String>,
    pub delivery_info: Option<String>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub cancel_requested: bool,
}

/// Emitted after every applied transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub session_id: SessionId,
    /// Stage the session entered.
    pub status: DeliveryStatus,
    pub ts_millis: i64,
}

impl SessionEvent {
    pub fn now(session_id: SessionId, status: DeliveryStatus) -> Self {
        Self {
            session_id,
            status,
            ts_millis: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_are_verbatim() {
        for (st, s) in [
            (DeliveryStatus::Idle, "idle"),
            (DeliveryStatus::WaitingForOtp, "waiting_for_otp"),
            (DeliveryStatus::OtpReady, "otp_ready"),
            (DeliveryStatus::Completed, "completed"),
        ] {
            assert_eq!(st.as_str(), s);
            assert_eq!(serde_json::to_value(st).unwrap(), s);
        }
    }

    #[test]
    fn only_five_edges_exist() {
        use DeliveryStatus::*;
        let all = [Idle, WaitingForOtp, OtpReady, Completed];
        let allowed: usize = all
            .iter()
            .map(|a| all.iter().filter(|b| a.can_transition_to(**b)).count())
            .sum();
        assert_eq!(allowed, 5);
        assert!(!OtpReady.can_transition_to(Idle), "cancel window closed");
        assert!(!Completed.can_transition_to(Idle));
    }

    #[test]
    fn spoken_form_separates_each_digit() {
        assert_eq!(Otp::new("1234").spoken(), "1... 2... 3... 4...");
        assert_eq!(spoken_digits(""), "");
    }

    #[test]
    fn otp_debug_is_redacted() {
        let dbg = format!("{:?}", Otp::new("4821"));
        assert!(!dbg.contains("4821"));
    }
}
