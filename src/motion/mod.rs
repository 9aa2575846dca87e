//! Closed-loop motion primitives.
//!
//! This module provides the feedback controller and the movements built on
//! it. It includes:
//!
//! - **PID Control**: [`pid::Pid`], one independent feedback loop.
//! - **Drive**: synchronized drive-to-position over several motors.
//! - **Turn**: in-place turns held on the inertial sensor's rotation.
//! - **Vision**: in-place turns that center a vision signature.
//! - **Balance**: a tilt-triggered sequence for climbing a balance platform.
//!
//! # Architecture
//!
//! Each primitive is an `async fn` that runs its own poll, compute,
//! command, sleep loop on the caller's task, borrowing its devices for the
//! duration. A run always ends with every output it touched set to zero
//! and reports why it ended as an [`Outcome`].
//!
//! # Example
//!
//! ```ignore
//! use skar_motion::motion::{drive::{self, DriveTuning}, CancelToken, Outcome};
//!
//! let cancel = CancelToken::new();
//! let tuning = DriveTuning::default();
//! let outcome =
//!     drive::drive_ticks(&mut motors, 900.0, &drive::STRAIGHT_QUAD, &tuning, &clock, &cancel)
//!         .await?;
//! if outcome == Outcome::TimedOut {
//!     warn!("drive did not settle");
//! }
//! ```

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::warn;

use crate::{error::Result, peripherals::Actuator};

/// Tilt-triggered balancing on a tipping platform.
pub mod balance;

/// Multi-motor drive-to-position.
pub mod drive;

/// The PID controller.
pub mod pid;

/// Consecutive-time settle detection.
pub mod settle;

/// Inertial-sensor turns.
pub mod turn;

/// Vision-centering turns.
pub mod vision;

pub use pid::{Pid, PidGains};

/// How a motion loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The goal was reached within tolerance.
    Arrived,
    /// The time budget ran out first.
    TimedOut,
    /// A [`CancelToken`] was triggered.
    Cancelled,
}

impl Outcome {
    pub fn is_arrived(self) -> bool { self == Outcome::Arrived }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Arrived => "arrived",
            Outcome::TimedOut => "timed out",
            Outcome::Cancelled => "cancelled",
        })
    }
}

/// Cooperative stop signal shared between a primitive and whoever may need
/// to abort it. Primitives check it once per tick.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self { Self::default() }

    pub fn cancel(&self) { self.cancelled.store(true, Ordering::Release); }

    pub fn is_cancelled(&self) -> bool { self.cancelled.load(Ordering::Acquire) }
}

/// `x.signum()`, except that zero (and NaN) give zero.
pub(crate) fn signum_or_zero(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Sets every actuator to zero power. All actuators are commanded even if
/// one fails; the first failure is returned.
pub(crate) fn stop_all<A: Actuator>(actuators: &mut [A]) -> Result<()> {
    let mut first_err = None;
    for actuator in actuators.iter_mut() {
        if let Err(e) = actuator.set_power(0.0) {
            warn!("Stop Command Error: {}", e);
            first_err.get_or_insert(e);
        }
    }
    first_err.map_or(Ok(()), Err)
}

/// Limits `|val|` to `cap`, keeping the sign.
pub(crate) fn abscap(val: f64, cap: f64) -> f64 {
    if val > cap {
        cap
    } else if val < -cap {
        -cap
    } else {
        val
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let handle = token.clone();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn signum_of_zero_is_zero() {
        assert_eq!(signum_or_zero(0.0), 0.0);
        assert_eq!(signum_or_zero(-0.0), 0.0);
        assert_eq!(signum_or_zero(f64::NAN), 0.0);
        assert_eq!(signum_or_zero(-3.5), -1.0);
        assert_eq!(signum_or_zero(0.2), 1.0);
    }

    #[test]
    fn abscap_keeps_sign() {
        assert_eq!(abscap(5.0, 2.0), 2.0);
        assert_eq!(abscap(-5.0, 2.0), -2.0);
        assert_eq!(abscap(1.5, 2.0), 1.5);
    }
}
