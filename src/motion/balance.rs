//! Climbing and leveling on a tipping platform.
//!
//! Balancing does not chase an absolute angle. It drives with the chassis'
//! own position controller and watches for changes in tilt, which mark the
//! moments the robot starts to climb and the platform tips level:
//!
//! 1. **Approaching**: drive `approach_distance` at `approach_velocity`
//!    until tilt has moved `mount_threshold` from where it started.
//! 2. **Mounting**: stop, then creep `mount_distance` at `mount_velocity`.
//!    After `mount_delay_ms`, take a new baseline and wait for tilt to move
//!    `level_threshold` from it.
//! 3. **Leveling**: stop and restore the chassis' original max velocity.
//!
//! Every wait is bounded by its phase timeout. A phase that times out is
//! reported as [`Outcome::TimedOut`] and the sequence moves on, so the
//! robot never sits in a phase forever.

use std::{fmt, time::Duration};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::{CancelToken, Outcome};
use crate::{
    error::{Error, Result},
    peripherals::{AsyncChassis, Clock, OrientationSensor, TiltAxis},
};

/// Tuning for [`balance`]. Distances and velocities are in whatever units
/// the chassis controller uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceTuning {
    /// Axis the platform tips about, as mounted on this robot.
    pub axis:                TiltAxis,
    pub approach_velocity:   f64,
    pub approach_distance:   f64,
    /// Tilt change, in degrees, that means the front has started to climb.
    pub mount_threshold:     f64,
    pub mount_velocity:      f64,
    pub mount_distance:      f64,
    /// Pause after starting the mounting move, before the new baseline.
    pub mount_delay_ms:      u64,
    /// Tilt change, in degrees, that means the platform has tipped level.
    pub level_threshold:     f64,
    pub poll_ms:             u64,
    pub approach_timeout_ms: u64,
    /// Covers the mount delay as well as the wait for leveling.
    pub mount_timeout_ms:    u64,
}

impl Default for BalanceTuning {
    fn default() -> Self {
        Self {
            axis:                TiltAxis::Pitch,
            approach_velocity:   70.0,
            approach_distance:   38.4,
            mount_threshold:     21.0,
            mount_velocity:      40.0,
            mount_distance:      31.0,
            mount_delay_ms:      500,
            level_threshold:     4.0,
            poll_ms:             30,
            approach_timeout_ms: 4000,
            mount_timeout_ms:    4000,
        }
    }
}

impl BalanceTuning {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("approach_velocity", self.approach_velocity),
            ("mount_velocity", self.mount_velocity),
            ("mount_threshold", self.mount_threshold),
            ("level_threshold", self.level_threshold),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::invalid(format!("{name} must be positive, got {value}")));
            }
        }
        if !(self.approach_distance.is_finite() && self.mount_distance.is_finite()) {
            return Err(Error::invalid("balance distances must be finite"));
        }
        if self.poll_ms == 0 {
            return Err(Error::invalid("balance poll interval must be positive"));
        }
        Ok(())
    }

    pub fn poll(&self) -> Duration { Duration::from_millis(self.poll_ms) }

    pub fn mount_delay(&self) -> Duration { Duration::from_millis(self.mount_delay_ms) }

    pub fn approach_timeout(&self) -> Duration { Duration::from_millis(self.approach_timeout_ms) }

    pub fn mount_timeout(&self) -> Duration { Duration::from_millis(self.mount_timeout_ms) }
}

/// Where the balance sequence is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalancePhase {
    Approaching,
    Mounting,
    Leveling,
    Done,
}

impl fmt::Display for BalancePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Debug::fmt(self, f) }
}

/// How each phase of a balance went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceReport {
    /// Whether the climb was detected.
    pub approach: Outcome,
    /// Whether leveling was detected. `None` if the sequence was cancelled
    /// before mounting.
    pub mount:    Option<Outcome>,
    pub elapsed:  Duration,
}

impl BalanceReport {
    /// Cancelled if any phase was cancelled or skipped, timed out if any
    /// phase timed out, arrived otherwise.
    pub fn outcome(&self) -> Outcome {
        let phases = [Some(self.approach), self.mount];
        if self.mount.is_none() || phases.contains(&Some(Outcome::Cancelled)) {
            Outcome::Cancelled
        } else if phases.contains(&Some(Outcome::TimedOut)) {
            Outcome::TimedOut
        } else {
            Outcome::Arrived
        }
    }
}

/// Runs the balance sequence.
///
/// On success the chassis is stopped and its max velocity restored. The
/// same cleanup is attempted before an error is returned.
pub async fn balance<Ch: AsyncChassis, S: OrientationSensor, C: Clock>(
    chassis: &mut Ch,
    imu: &S,
    tuning: &BalanceTuning,
    clock: &C,
    cancel: &CancelToken,
) -> Result<BalanceReport> {
    tuning.validate()?;
    let original_velocity = chassis.max_velocity();
    let start = clock.now();
    info!("Balance started on {:?}", tuning.axis);

    match run_phases(chassis, imu, tuning, clock, cancel, original_velocity).await {
        Ok((approach, mount)) => {
            let report = BalanceReport {
                approach,
                mount,
                elapsed: clock.now().saturating_sub(start),
            };
            match report.outcome() {
                Outcome::Arrived => info!("Balance finished after {:?}", report.elapsed),
                outcome => warn!("Balance {} after {:?}: {:?}", outcome, report.elapsed, report),
            }
            Ok(report)
        }
        Err(e) => {
            warn!("Balance aborted: {}", e);
            if let Err(stop_err) = chassis.stop() {
                warn!("Chassis Stop Error: {}", stop_err);
            }
            if let Err(restore_err) = chassis.set_max_velocity(original_velocity) {
                warn!("Chassis Velocity Restore Error: {}", restore_err);
            }
            Err(e)
        }
    }
}

async fn run_phases<Ch: AsyncChassis, S: OrientationSensor, C: Clock>(
    chassis: &mut Ch,
    imu: &S,
    tuning: &BalanceTuning,
    clock: &C,
    cancel: &CancelToken,
    original_velocity: f64,
) -> Result<(Outcome, Option<Outcome>)> {
    let mut phase = BalancePhase::Approaching;
    let mut approach = Outcome::Cancelled;
    let mut mount = None;

    while phase != BalancePhase::Done {
        let next = match phase {
            BalancePhase::Approaching => {
                let phase_start = clock.now();
                chassis.set_max_velocity(tuning.approach_velocity)?;
                let baseline = tuning.axis.read(imu)?;
                chassis.move_distance_async(tuning.approach_distance)?;
                approach = watch_tilt(
                    imu,
                    tuning,
                    baseline,
                    tuning.mount_threshold,
                    phase_start,
                    tuning.approach_timeout(),
                    clock,
                    cancel,
                )
                .await?;
                if approach == Outcome::TimedOut {
                    warn!("Balance: no climb detected, mounting anyway");
                }
                if approach == Outcome::Cancelled {
                    BalancePhase::Leveling
                } else {
                    BalancePhase::Mounting
                }
            }
            BalancePhase::Mounting => {
                let phase_start = clock.now();
                let budget = tuning.mount_timeout();
                chassis.stop()?;
                chassis.set_max_velocity(tuning.mount_velocity)?;
                chassis.move_distance_async(tuning.mount_distance)?;
                clock.sleep(tuning.mount_delay().min(budget)).await;
                let baseline = tuning.axis.read(imu)?;
                let outcome = watch_tilt(
                    imu,
                    tuning,
                    baseline,
                    tuning.level_threshold,
                    phase_start,
                    budget,
                    clock,
                    cancel,
                )
                .await?;
                if outcome == Outcome::TimedOut {
                    warn!("Balance: platform never tipped level");
                }
                mount = Some(outcome);
                BalancePhase::Leveling
            }
            BalancePhase::Leveling => {
                chassis.stop()?;
                chassis.set_max_velocity(original_velocity)?;
                BalancePhase::Done
            }
            BalancePhase::Done => BalancePhase::Done,
        };
        info!("Balance: {} -> {}", phase, next);
        phase = next;
    }
    Ok((approach, mount))
}

/// Polls the tilt axis until it has moved `threshold` from `baseline`, or
/// until `budget` has passed since `phase_start`.
#[allow(clippy::too_many_arguments)]
async fn watch_tilt<S: OrientationSensor, C: Clock>(
    imu: &S,
    tuning: &BalanceTuning,
    baseline: f64,
    threshold: f64,
    phase_start: Duration,
    budget: Duration,
    clock: &C,
    cancel: &CancelToken,
) -> Result<Outcome> {
    let poll = tuning.poll();
    loop {
        if cancel.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }
        let tilt = tuning.axis.read(imu)?;
        if (tilt - baseline).abs() >= threshold {
            return Ok(Outcome::Arrived);
        }
        let elapsed = clock.now().saturating_sub(phase_start);
        if elapsed >= budget {
            return Ok(Outcome::TimedOut);
        }
        clock.sleep(poll.min(budget - elapsed)).await;
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;
    use crate::peripherals::sim::{Orientation, SimChassis, SimClock, SimImu};

    fn scripted_tilt(clock: &SimClock, axis: TiltAxis) -> SimImu {
        let time = clock.clone();
        SimImu::from_fn(move || {
            let t = time.now();
            let tilt = if t < Duration::from_millis(300) {
                0.0
            } else if t < Duration::from_millis(1100) {
                24.0
            } else {
                18.0
            };
            match axis {
                TiltAxis::Pitch => Orientation {
                    pitch: tilt,
                    ..Default::default()
                },
                TiltAxis::Roll => Orientation {
                    roll: tilt,
                    ..Default::default()
                },
            }
        })
    }

    #[test]
    fn climbs_and_levels() {
        let clock = SimClock::new();
        let imu = scripted_tilt(&clock, TiltAxis::Pitch);
        let mut chassis = SimChassis::new(100.0);
        let tuning = BalanceTuning::default();

        let report =
            block_on(balance(&mut chassis, &imu, &tuning, &clock, &CancelToken::new())).unwrap();

        assert_eq!(report.approach, Outcome::Arrived);
        assert_eq!(report.mount, Some(Outcome::Arrived));
        assert_eq!(report.outcome(), Outcome::Arrived);
        // climb seen at 300 ms, level at 1100 ms
        assert_eq!(report.elapsed, Duration::from_millis(1100));
        assert_eq!(chassis.moves, vec![38.4, 31.0]);
        assert_eq!(chassis.velocities, vec![70.0, 40.0, 100.0]);
        assert_eq!(chassis.stops, 2);
        assert_eq!(chassis.max_velocity, 100.0);
    }

    #[test]
    fn roll_axis_is_honored() {
        let clock = SimClock::new();
        let imu = scripted_tilt(&clock, TiltAxis::Roll);
        let mut chassis = SimChassis::new(100.0);
        let tuning = BalanceTuning {
            axis: TiltAxis::Roll,
            ..BalanceTuning::default()
        };
        let report =
            block_on(balance(&mut chassis, &imu, &tuning, &clock, &CancelToken::new())).unwrap();
        assert_eq!(report.outcome(), Outcome::Arrived);

        // the same script on pitch never moves the roll reading
        let clock = SimClock::new();
        let imu = scripted_tilt(&clock, TiltAxis::Pitch);
        let mut chassis = SimChassis::new(100.0);
        let report =
            block_on(balance(&mut chassis, &imu, &tuning, &clock, &CancelToken::new())).unwrap();
        assert_eq!(report.outcome(), Outcome::TimedOut);
    }

    #[test]
    fn flat_reading_times_out_each_phase() {
        let clock = SimClock::new();
        let imu = SimImu::fixed(Orientation::default());
        let mut chassis = SimChassis::new(100.0);
        let tuning = BalanceTuning {
            approach_timeout_ms: 600,
            mount_timeout_ms: 400,
            mount_delay_ms: 100,
            ..BalanceTuning::default()
        };

        let report =
            block_on(balance(&mut chassis, &imu, &tuning, &clock, &CancelToken::new())).unwrap();

        assert_eq!(report.approach, Outcome::TimedOut);
        assert_eq!(report.mount, Some(Outcome::TimedOut));
        assert_eq!(report.outcome(), Outcome::TimedOut);
        assert_eq!(report.elapsed, Duration::from_millis(1000));
        assert_eq!(chassis.max_velocity, 100.0);
    }

    #[test]
    fn phase_timeouts_that_do_not_divide_the_poll_are_exact() {
        let clock = SimClock::new();
        let imu = SimImu::fixed(Orientation::default());
        let mut chassis = SimChassis::new(100.0);
        let tuning = BalanceTuning {
            approach_timeout_ms: 95,
            mount_timeout_ms: 70,
            mount_delay_ms: 500,
            ..BalanceTuning::default()
        };

        let report =
            block_on(balance(&mut chassis, &imu, &tuning, &clock, &CancelToken::new())).unwrap();
        assert_eq!(report.elapsed, Duration::from_millis(165));
    }

    #[test]
    fn cancel_skips_mounting_and_restores_velocity() {
        let clock = SimClock::new();
        let imu = SimImu::fixed(Orientation::default());
        let mut chassis = SimChassis::new(100.0);
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = block_on(balance(
            &mut chassis,
            &imu,
            &BalanceTuning::default(),
            &clock,
            &cancel,
        ))
        .unwrap();

        assert_eq!(report.approach, Outcome::Cancelled);
        assert_eq!(report.mount, None);
        assert_eq!(report.outcome(), Outcome::Cancelled);
        assert_eq!(chassis.moves, vec![38.4]);
        assert_eq!(chassis.stops, 1);
        assert_eq!(chassis.max_velocity, 100.0);
    }

    #[test]
    fn sensor_fault_stops_and_restores() {
        let clock = SimClock::new();
        let imu = SimImu::fixed(Orientation {
            pitch: f64::NAN,
            ..Default::default()
        });
        let mut chassis = SimChassis::new(100.0);

        let result = block_on(balance(
            &mut chassis,
            &imu,
            &BalanceTuning::default(),
            &clock,
            &CancelToken::new(),
        ));

        assert!(matches!(result, Err(Error::SensorFault { .. })));
        assert_eq!(chassis.stops, 1);
        assert_eq!(chassis.max_velocity, 100.0);
    }

    #[test]
    fn invalid_tuning_is_rejected_before_moving() {
        let clock = SimClock::new();
        let imu = SimImu::fixed(Orientation::default());
        let mut chassis = SimChassis::new(100.0);
        let tuning = BalanceTuning {
            level_threshold: 0.0,
            ..BalanceTuning::default()
        };
        let result = block_on(balance(&mut chassis, &imu, &tuning, &clock, &CancelToken::new()));
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
        assert!(chassis.moves.is_empty());
    }
}
