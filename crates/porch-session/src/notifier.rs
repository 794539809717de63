//! Background homeowner-notification task.
//!
//! One task per accepted Start, spawned fire-and-forget. The task sleeps the
//! configured delay with no lock held, then re-validates its own generation
//! against the store before publishing anything. A cancelled or superseded
//! session makes the task exit quietly; that path is expected, not an error.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::otp::OtpSource;
use crate::store::SessionStore;
use crate::types::{ResolveOutcome, SessionId};

/// How a notifier task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierOutcome {
    /// OTP published; session is now `OtpReady`.
    Resolved,
    /// Cancellation (or a newer generation) observed after the delay.
    Cancelled,
    /// Passed the cancellation check but lost the race at resolution time.
    Stale,
}

#[derive(Debug, Clone)]
pub struct NotifierSettings {
    pub delay: Duration,
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
        }
    }
}

/// Context strings captured at Start, used for logging only.
#[derive(Debug, Clone)]
pub struct NotifyJob {
    pub session_id: SessionId,
    pub company: String,
    pub delivery_info: String,
}

/// Spawns notifier tasks. Cheap to clone.
#[derive(Clone)]
pub struct Notifier {
    settings: NotifierSettings,
    otp: Arc<dyn OtpSource>,
}

impl Notifier {
    pub fn new(settings: NotifierSettings, otp: Arc<dyn OtpSource>) -> Self {
        Self { settings, otp }
    }

    /// Spawn the task for `job`. Dropping the handle detaches it.
    pub fn spawn(&self, store: Arc<SessionStore>, job: NotifyJob) -> JoinHandle<NotifierOutcome> {
        let this = self.clone();
        tokio::spawn(async move { this.run(store, job).await })
    }

    async fn run(self, store: Arc<SessionStore>, job: NotifyJob) -> NotifierOutcome {
        info!(
            session_id = %job.session_id,
            company = %job.company,
            delivery_info = %job.delivery_info,
            "notification sent to homeowner; waiting for reply"
        );

        tokio::time::sleep(self.settings.delay).await;

        if store.is_cancelled(job.session_id).await {
            info!(session_id = %job.session_id, "delivery cancelled; no otp generated");
            return NotifierOutcome::Cancelled;
        }

        let otp = self.otp.next_code();
        match store.resolve_with_otp(job.session_id, otp).await {
            ResolveOutcome::Applied => {
                info!(session_id = %job.session_id, "homeowner replied; otp ready");
                NotifierOutcome::Resolved
            }
            ResolveOutcome::Stale => {
                debug!(session_id = %job.session_id, "stale resolution dropped");
                NotifierOutcome::Stale
            }
        }
    }
}
