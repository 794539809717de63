//! Session controller: maps external calls onto store operations.
//!
//! Owns no session state of its own. Start spawns the notifier and returns
//! immediately; every other call is a single store operation.

use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::notifier::{Notifier, NotifierOutcome, NotifierSettings, NotifyJob};
use crate::otp::OtpSource;
use crate::store::SessionStore;
use crate::types::{
    BeginOutcome, CancelOutcome, ConsumeOutcome, DeliveryStatus, SessionEvent, SessionId,
    SessionSnapshot,
};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Caller-visible failures of the session workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A required field was missing or blank.
    InvalidRequest(String),
    /// A session already holds the slot.
    Conflict { status: DeliveryStatus },
    /// No OTP is ready, or it was already handed out.
    NotReady,
    /// Nothing is waiting for an OTP, so there is nothing to cancel.
    NotCancellable { status: DeliveryStatus },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            SessionError::Conflict { .. } => f.write_str("A delivery is already in progress."),
            SessionError::NotReady => {
                f.write_str("OTP is not ready or has already been provided.")
            }
            SessionError::NotCancellable { .. } => f.write_str("No active delivery to cancel."),
        }
    }
}

impl std::error::Error for SessionError {}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Result of an accepted Start.
#[derive(Debug)]
pub struct StartedSession {
    pub session_id: SessionId,
    /// The notifier task bound to this session. Drop it to run detached.
    pub notifier: JoinHandle<NotifierOutcome>,
}

#[derive(Clone)]
pub struct SessionController {
    store: Arc<SessionStore>,
    notifier: Notifier,
}

impl SessionController {
    pub fn new(settings: NotifierSettings, otp: Arc<dyn OtpSource>) -> Self {
        Self {
            store: Arc::new(SessionStore::new()),
            notifier: Notifier::new(settings, otp),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Subscribe to applied transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.store.subscribe()
    }

    /// Start a delivery. Both fields are required and must not be blank.
    ///
    /// Returns as soon as the session is recorded; the notifier runs on its own.
    pub async fn start_delivery(
        &self,
        company: &str,
        delivery_info: &str,
    ) -> Result<StartedSession, SessionError> {
        let company = company.trim();
        let delivery_info = delivery_info.trim();
        if company.is_empty() || delivery_info.is_empty() {
            return Err(SessionError::InvalidRequest(
                "company and delivery_info are required".to_string(),
            ));
        }

        let session_id = match self.store.try_begin_session(company, delivery_info).await {
            BeginOutcome::Accepted(id) => id,
            BeginOutcome::Rejected(status) => {
                warn!(%status, "start refused; delivery already in progress");
                return Err(SessionError::Conflict { status });
            }
        };

        info!(%session_id, company, "delivery started; status waiting_for_otp");

        let notifier = self.notifier.spawn(
            Arc::clone(&self.store),
            NotifyJob {
                session_id,
                company: company.to_string(),
                delivery_info: delivery_info.to_string(),
            },
        );

        Ok(StartedSession {
            session_id,
            notifier,
        })
    }

    /// Current status, verbatim. No side effects.
    pub async fn check_status(&self) -> DeliveryStatus {
        let status = self.store.peek_status().await;
        debug!(%status, "status polled");
        status
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.store.snapshot().await
    }

    /// Consume the ready OTP and return it formatted for speech.
    pub async fn retrieve_otp(&self) -> Result<String, SessionError> {
        match self.store.consume_otp().await {
            ConsumeOutcome::Otp { session_id, otp } => {
                info!(%session_id, "otp provided; status completed");
                Ok(otp.spoken())
            }
            ConsumeOutcome::NotReady => {
                debug!("otp requested but not ready");
                Err(SessionError::NotReady)
            }
        }
    }

    /// Cancel whichever session is currently waiting for its OTP.
    pub async fn cancel_delivery(&self) -> Result<SessionId, SessionError> {
        let Some(session_id) = self.store.current_session().await else {
            let status = self.store.peek_status().await;
            warn!(%status, "cancel refused; no active delivery");
            return Err(SessionError::NotCancellable { status });
        };

        match self.store.request_cancel(session_id).await {
            CancelOutcome::Cancelled => {
                info!(%session_id, "delivery cancelled; status idle");
                Ok(session_id)
            }
            CancelOutcome::Rejected(status) => {
                warn!(%session_id, %status, "cancel refused; window closed");
                Err(SessionError::NotCancellable { status })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::FixedOtp;
    use std::time::Duration;

    fn controller() -> SessionController {
        SessionController::new(
            NotifierSettings {
                delay: Duration::from_secs(5),
            },
            Arc::new(FixedOtp("1234".to_string())),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn blank_fields_are_invalid() {
        let c = controller();
        for (company, info) in [("", "2 boxes"), ("Acme", ""), ("  ", "\t")] {
            let err = c.start_delivery(company, info).await.unwrap_err();
            assert!(matches!(err, SessionError::InvalidRequest(_)));
        }
        assert_eq!(c.check_status().await, DeliveryStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn start_trims_context_strings() {
        let c = controller();
        c.start_delivery("  Acme ", " 2 boxes\n").await.unwrap();
        let snap = c.snapshot().await;
        assert_eq!(snap.company.as_deref(), Some("Acme"));
        assert_eq!(snap.delivery_info.as_deref(), Some("2 boxes"));
    }

    #[tokio::test(start_paused = true)]
    async fn retrieve_formats_for_speech() {
        let c = controller();
        let started = c.start_delivery("Acme", "2 boxes").await.unwrap();
        started.notifier.await.unwrap();

        assert_eq!(c.retrieve_otp().await.unwrap(), "1... 2... 3... 4...");
        assert_eq!(c.retrieve_otp().await.unwrap_err(), SessionError::NotReady);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_reports_status_when_refused() {
        let c = controller();
        assert_eq!(
            c.cancel_delivery().await.unwrap_err(),
            SessionError::NotCancellable {
                status: DeliveryStatus::Idle
            }
        );

        let started = c.start_delivery("Acme", "2 boxes").await.unwrap();
        started.notifier.await.unwrap();
        assert_eq!(
            c.cancel_delivery().await.unwrap_err(),
            SessionError::NotCancellable {
                status: DeliveryStatus::OtpReady
            }
        );
    }

    #[test]
    fn error_messages_match_api_wording() {
        assert_eq!(
            SessionError::Conflict {
                status: DeliveryStatus::WaitingForOtp
            }
            .to_string(),
            "A delivery is already in progress."
        );
        assert_eq!(
            SessionError::NotReady.to_string(),
            "OTP is not ready or has already been provided."
        );
    }
}
