//! Turning in place to center a vision signature.
//!
//! This is proportional control plus a fixed nudge, not a full PID. Each
//! tick the horizontal offset `x` is normalized to `v = x / fov_width * 2`
//! and the sides are commanded
//!
//! ```text
//! left  = -(kp * v) - ki * tick_ms * sign(v)
//! right =  (kp * v) + ki * tick_ms * sign(v)
//! ```
//!
//! The `ki` term is a constant push toward the target every tick, enough
//! to overcome static friction near center. Nothing is accumulated. Both
//! outputs are clamped to `voltage_limit`.
//!
//! The loop ends once `|x| <= err_thresh` has held for `settle_ms`, or on
//! the global timeout.

use std::time::Duration;

use log::{info, trace, warn};
use serde::{Deserialize, Serialize};

use super::{CancelToken, Outcome, abscap, settle::Settle, signum_or_zero};
use crate::{
    error::{Error, Result},
    peripherals::{Actuator, Clock, Signature, VisionSource, finite},
};

/// Horizontal resolution of the V5 vision sensor, in pixels.
pub const V5_VISION_FOV_WIDTH: f64 = 316.0;

/// Tuning for [`turn_to_signature`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionTuning {
    /// Output per unit of normalized offset.
    pub kp:            f64,
    /// Nudge per millisecond of tick, applied in the direction of the offset.
    pub ki:            f64,
    /// Loop period.
    pub tick_ms:       u64,
    /// Give up after this long.
    pub timeout_ms:    u64,
    /// Offset, in sensor units, that counts as centered.
    pub err_thresh:    f64,
    /// How long the target must stay centered.
    pub settle_ms:     u64,
    /// Largest magnitude sent to either side.
    pub voltage_limit: f64,
}

impl Default for VisionTuning {
    fn default() -> Self {
        Self {
            kp:            9000.0,
            ki:            50.0,
            tick_ms:       10,
            timeout_ms:    2000,
            err_thresh:    20.0,
            settle_ms:     150,
            voltage_limit: 12000.0,
        }
    }
}

impl VisionTuning {
    pub fn validate(&self) -> Result<()> {
        if !(self.kp.is_finite() && self.ki.is_finite()) {
            return Err(Error::invalid("vision gains must be finite"));
        }
        if !(self.err_thresh.is_finite() && self.err_thresh > 0.0) {
            return Err(Error::invalid(format!(
                "err_thresh must be positive, got {}",
                self.err_thresh
            )));
        }
        if !(self.voltage_limit.is_finite() && self.voltage_limit > 0.0) {
            return Err(Error::invalid(format!(
                "voltage_limit must be positive, got {}",
                self.voltage_limit
            )));
        }
        if self.tick_ms == 0 {
            return Err(Error::invalid("vision tick must be positive"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }

    pub fn tick(&self) -> Duration { Duration::from_millis(self.tick_ms) }

    pub fn settle(&self) -> Duration { Duration::from_millis(self.settle_ms) }
}

/// Turns until `signature` sits in the middle of the camera's view.
///
/// Both sides are set to zero power on the way out, including when an
/// error is returned.
pub async fn turn_to_signature<L, R, V, C>(
    left: &mut L,
    right: &mut R,
    camera: &V,
    signature: Signature,
    tuning: &VisionTuning,
    clock: &C,
    cancel: &CancelToken,
) -> Result<Outcome>
where
    L: Actuator,
    R: Actuator,
    V: VisionSource,
    C: Clock,
{
    tuning.validate()?;
    let fov_width = camera.field_of_view_width();
    if !(fov_width.is_finite() && fov_width > 0.0) {
        return Err(Error::invalid(format!(
            "field of view width must be positive, got {fov_width}"
        )));
    }

    info!(
        "Vision turn started: signature {}, timeout {:?}",
        signature.0,
        tuning.timeout()
    );
    let start = clock.now();
    let result =
        vision_loop(left, right, camera, signature, fov_width, tuning, clock, cancel).await;
    let stopped = left.set_power(0.0).and(right.set_power(0.0));
    if let Err(e) = &stopped {
        warn!("Vision Stop Error: {}", e);
    }
    let outcome = result?;
    stopped?;

    let elapsed = clock.now().saturating_sub(start);
    match outcome {
        Outcome::TimedOut => warn!("Vision turn timed out after {:?}", elapsed),
        _ => info!("Vision turn {} after {:?}", outcome, elapsed),
    }
    Ok(outcome)
}

#[allow(clippy::too_many_arguments)]
async fn vision_loop<L: Actuator, R: Actuator, V: VisionSource, C: Clock>(
    left: &mut L,
    right: &mut R,
    camera: &V,
    signature: Signature,
    fov_width: f64,
    tuning: &VisionTuning,
    clock: &C,
    cancel: &CancelToken,
) -> Result<Outcome> {
    let tick = tuning.tick();
    let timeout = tuning.timeout();
    let nudge = tuning.ki * tuning.tick_ms as f64;
    let start = clock.now();
    let mut settle = Settle::new(tuning.settle());

    loop {
        if cancel.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }

        let (x, _y) = camera.offset_by_signature(signature)?;
        let x = finite("vision offset", x)?;
        let v = x / fov_width * 2.0;
        let turn = tuning.kp * v + nudge * signum_or_zero(v);
        left.set_power(abscap(-turn, tuning.voltage_limit))?;
        right.set_power(abscap(turn, tuning.voltage_limit))?;
        trace!("offset {:.1}, turn {:.1}", x, turn);

        if settle.observe(x.abs() <= tuning.err_thresh, tick) {
            return Ok(Outcome::Arrived);
        }
        if clock.now().saturating_sub(start) >= timeout {
            return Ok(Outcome::TimedOut);
        }
        clock.sleep(tick).await;
    }
}
