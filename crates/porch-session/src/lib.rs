//! porch-session
//!
//! The delivery-confirmation session: one exclusive session at a time, a
//! background notifier that produces an OTP after a simulated homeowner
//! delay, and the race between that notifier and cancellation.
//!
//! Layout (leaves first):
//! - [`types`]: status enum, generation token, OTP, store outcomes, events.
//! - [`store`]: the single session record behind one mutex.
//! - [`otp`]: pluggable OTP sources.
//! - [`notifier`]: the fire-and-forget notifier task.
//! - [`controller`]: Start / Status / Retrieve / Cancel.

pub mod controller;
pub mod notifier;
pub mod otp;
pub mod store;
pub mod types;

pub use controller::{SessionController, SessionError, StartedSession};
pub use notifier::{Notifier, NotifierOutcome, NotifierSettings, NotifyJob};
pub use otp::{FixedOtp, OtpSource, RandomOtp};
pub use store::SessionStore;
pub use types::{
    spoken_digits, BeginOutcome, CancelOutcome, ConsumeOutcome, DeliveryStatus, Otp,
    ResolveOutcome, SessionEvent, SessionId, SessionSnapshot,
};
