//! The single, process-wide delivery-session record and its transition guards.
//!
//! # Invariants
//!
//! - Every operation below is one critical section over the whole record, so
//!   Start, Cancel and the notifier's resolution never observe or produce a
//!   torn state.
//! - At most one session is live (`WaitingForOtp` | `OtpReady`).
//! - `otp` is `Some` iff `status == OtpReady`.
//! - Leaving `WaitingForOtp` happens exactly once per generation: whichever of
//!   [`SessionStore::resolve_with_otp`] and [`SessionStore::request_cancel`]
//!   takes the lock first wins; the loser is dropped.
//! - Every targeted operation compares the caller's [`SessionId`] against the
//!   current generation, so nothing from an older session can leak into a
//!   newer one.
//!
//! - Every applied transition is published as a [`SessionEvent`] before the
//!   guard drops, so subscribers see transitions in commit order.
//!
//! The lock is never held across anything but its own acquisition.

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex};

use crate::types::{
    BeginOutcome, CancelOutcome, ConsumeOutcome, DeliveryStatus, Otp, ResolveOutcome, SessionEvent,
    SessionId, SessionSnapshot,
};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct DeliverySession {
    status: DeliveryStatus,
    session_id: Option<SessionId>,
    otp: Option<Otp>,
    cancel_requested: bool,
    company: Option<String>,
    delivery_info: Option<String>,
    started_at: Option<DateTime<Utc>>,
}

impl DeliverySession {
    fn is_current(&self, id: SessionId) -> bool {
        self.session_id == Some(id)
    }

    /// Apply `next` and publish it. Callers hold the guard.
    fn transition(&mut self, next: DeliveryStatus, events: &broadcast::Sender<SessionEvent>) {
        debug_assert!(
            self.status.can_transition_to(next),
            "illegal transition {} -> {}",
            self.status,
            next
        );
        self.status = next;
        if let Some(id) = self.session_id {
            let _ = events.send(SessionEvent::now(id, next));
        }
    }
}

/// Authoritative holder of the delivery session. Share it behind an `Arc`.
#[derive(Debug)]
pub struct SessionStore {
    inner: Mutex<DeliverySession>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for SessionStore {
    fn default() -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Mutex::new(DeliverySession::default()),
            events,
        }
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to applied transitions, in the order they were committed.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Begin a new session if the slot is free (`Idle` or `Completed`).
    ///
    /// On success the record is reset: fresh generation, no OTP, no
    /// cancellation, new context strings.
    pub async fn try_begin_session(&self, company: &str, delivery_info: &str) -> BeginOutcome {
        let mut s = self.inner.lock().await;
        if !s.status.accepts_start() {
            return BeginOutcome::Rejected(s.status);
        }

        let id = SessionId::new();
        s.session_id = Some(id);
        s.otp = None;
        s.cancel_requested = false;
        s.company = Some(company.to_string());
        s.delivery_info = Some(delivery_info.to_string());
        s.started_at = Some(Utc::now());
        s.transition(DeliveryStatus::WaitingForOtp, &self.events);
        BeginOutcome::Accepted(id)
    }

    /// Cancel session `id` while it is still waiting for its OTP.
    ///
    /// Sets the cancellation flag and returns the slot to `Idle` in one step.
    pub async fn request_cancel(&self, id: SessionId) -> CancelOutcome {
        let mut s = self.inner.lock().await;
        if s.status != DeliveryStatus::WaitingForOtp || !s.is_current(id) {
            return CancelOutcome::Rejected(s.status);
        }

        s.cancel_requested = true;
        s.transition(DeliveryStatus::Idle, &self.events);
        CancelOutcome::Cancelled
    }

    /// Publish the notifier's OTP for session `id`.
    ///
    /// Applies only if `id` is still the current generation, the session is
    /// still waiting, and no cancellation was recorded.
    pub async fn resolve_with_otp(&self, id: SessionId, otp: Otp) -> ResolveOutcome {
        let mut s = self.inner.lock().await;
        if !s.is_current(id) || s.cancel_requested || s.status != DeliveryStatus::WaitingForOtp {
            return ResolveOutcome::Stale;
        }

        s.otp = Some(otp);
        s.transition(DeliveryStatus::OtpReady, &self.events);
        ResolveOutcome::Applied
    }

    pub async fn peek_status(&self) -> DeliveryStatus {
        self.inner.lock().await.status
    }

    /// Hand out the ready OTP at most once and close the session.
    pub async fn consume_otp(&self) -> ConsumeOutcome {
        let mut s = self.inner.lock().await;
        if s.status != DeliveryStatus::OtpReady {
            return ConsumeOutcome::NotReady;
        }
        let (Some(session_id), Some(otp)) = (s.session_id, s.otp.take()) else {
            return ConsumeOutcome::NotReady;
        };

        s.transition(DeliveryStatus::Completed, &self.events);
        ConsumeOutcome::Otp { session_id, otp }
    }

    /// `true` if session `id` was cancelled or has been superseded.
    pub async fn is_cancelled(&self, id: SessionId) -> bool {
        let s = self.inner.lock().await;
        !s.is_current(id) || s.cancel_requested
    }

    /// Id of the live session, if one holds the slot.
    pub async fn current_session(&self) -> Option<SessionId> {
        let s = self.inner.lock().await;
        if s.status.is_live() {
            s.session_id
        } else {
            None
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let s = self.inner.lock().await;
        SessionSnapshot {
            status: s.status,
            session_id: s.session_id,
            company: s.company.clone(),
            delivery_info: s.delivery_info.clone(),
            started_at: s.started_at,
            cancel_requested: s.cancel_requested,
        }
    }
}
