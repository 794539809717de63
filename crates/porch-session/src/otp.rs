//! OTP sources.
//!
//! The notifier draws its code through [`OtpSource`] so callers can swap the
//! random generator for a fixed one.

use std::ops::RangeInclusive;

use rand::Rng;

use crate::types::Otp;

pub trait OtpSource: Send + Sync {
    fn next_code(&self) -> Otp;
}

/// Uniform pseudo-random code over an inclusive range (default 1000..=9999).
#[derive(Debug, Clone)]
pub struct RandomOtp {
    range: RangeInclusive<u32>,
}

impl RandomOtp {
    /// Bounds are inclusive and may be given in either order.
    pub fn new(min: u32, max: u32) -> Self {
        Self {
            range: min.min(max)..=min.max(max),
        }
    }
}

impl Default for RandomOtp {
    fn default() -> Self {
        Self::new(1_000, 9_999)
    }
}

impl OtpSource for RandomOtp {
    fn next_code(&self) -> Otp {
        let code = rand::rng().random_range(self.range.clone());
        Otp::new(code.to_string())
    }
}

/// Always yields the same code.
#[derive(Debug, Clone)]
pub struct FixedOtp(pub String);

impl OtpSource for FixedOtp {
    fn next_code(&self) -> Otp {
        Otp::new(self.0.clone())
    }
}
