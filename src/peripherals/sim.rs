//! Host-side devices.
//!
//! These stand-ins make the motion primitives runnable off the robot: the
//! clock is virtual and jumps forward on every sleep, motors integrate
//! their commands, and sensors read from closures. Everything is
//! deterministic, which is what the unit tests rely on.

use std::{cell::Cell, future::Future, rc::Rc, time::Duration};

use super::{Actuator, AsyncChassis, Clock, OrientationSensor, Signature, VisionSource};
use crate::error::{Error, Result};

/// Virtual clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: Rc<Cell<Duration>>,
}

impl SimClock {
    pub fn new() -> Self { Self::default() }

    /// Moves time forward without sleeping.
    pub fn advance(&self, by: Duration) { self.now.set(self.now.get() + by); }
}

impl Clock for SimClock {
    fn now(&self) -> Duration { self.now.get() }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        self.advance(duration);
        std::future::ready(())
    }
}

/// A motor whose position moves by `power * response` every command.
#[derive(Debug, Clone, PartialEq)]
pub struct SimMotor {
    position:      f64,
    power:         f64,
    response:      f64,
    commands:      usize,
    fail_commands: bool,
}

impl SimMotor {
    pub fn new(response: f64) -> Self { Self::at(0.0, response) }

    pub fn at(position: f64, response: f64) -> Self {
        Self {
            position,
            power: 0.0,
            response,
            commands: 0,
            fail_commands: false,
        }
    }

    /// A motor that never moves, whatever it is told.
    pub fn stuck() -> Self { Self::new(0.0) }

    /// Last commanded power.
    pub fn power(&self) -> f64 { self.power }

    /// Number of accepted commands.
    pub fn commands(&self) -> usize { self.commands }

    /// Makes every following command fail.
    pub fn fail_commands(&mut self, fail: bool) { self.fail_commands = fail; }
}

impl Actuator for SimMotor {
    fn set_power(&mut self, power: f64) -> Result<()> {
        if self.fail_commands {
            return Err(Error::ActuatorFault {
                reason: "simulated command failure".into(),
            });
        }
        self.power = power;
        self.position += power * self.response;
        self.commands += 1;
        Ok(())
    }

    fn position(&self) -> Result<f64> { Ok(self.position) }

    fn velocity(&self) -> Result<f64> { Ok(self.power * self.response) }
}

/// One orientation sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    pub heading:  f64,
    pub rotation: f64,
    pub pitch:    f64,
    pub roll:     f64,
}

/// An inertial sensor that reads from a closure.
pub struct SimImu {
    source: Box<dyn Fn() -> Orientation>,
}

impl SimImu {
    pub fn fixed(orientation: Orientation) -> Self { Self::from_fn(move || orientation) }

    pub fn from_fn(source: impl Fn() -> Orientation + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    fn sample(&self) -> Orientation { (self.source)() }
}

impl OrientationSensor for SimImu {
    fn heading(&self) -> Result<f64> { Ok(self.sample().heading) }

    fn rotation(&self) -> Result<f64> { Ok(self.sample().rotation) }

    fn pitch(&self) -> Result<f64> { Ok(self.sample().pitch) }

    fn roll(&self) -> Result<f64> { Ok(self.sample().roll) }
}

/// A vision sensor that reads offsets from a closure.
pub struct SimVision {
    fov_width: f64,
    source:    Box<dyn Fn(Signature) -> (f64, f64)>,
}

impl SimVision {
    pub fn fixed(fov_width: f64, offset: (f64, f64)) -> Self {
        Self::from_fn(fov_width, move |_| offset)
    }

    pub fn from_fn(fov_width: f64, source: impl Fn(Signature) -> (f64, f64) + 'static) -> Self {
        Self {
            fov_width,
            source: Box::new(source),
        }
    }
}

impl VisionSource for SimVision {
    fn offset_by_signature(&self, signature: Signature) -> Result<(f64, f64)> {
        Ok((self.source)(signature))
    }

    fn field_of_view_width(&self) -> f64 { self.fov_width }
}

/// A chassis that records what it was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub struct SimChassis {
    pub max_velocity: f64,
    pub moves:        Vec<f64>,
    pub velocities:   Vec<f64>,
    pub stops:        usize,
}

impl SimChassis {
    pub fn new(max_velocity: f64) -> Self {
        Self {
            max_velocity,
            moves: Vec::new(),
            velocities: Vec::new(),
            stops: 0,
        }
    }
}

impl AsyncChassis for SimChassis {
    fn max_velocity(&self) -> f64 { self.max_velocity }

    fn set_max_velocity(&mut self, velocity: f64) -> Result<()> {
        self.max_velocity = velocity;
        self.velocities.push(velocity);
        Ok(())
    }

    fn move_distance_async(&mut self, distance: f64) -> Result<()> {
        self.moves.push(distance);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.stops += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    #[test]
    fn clones_share_time() {
        let clock = SimClock::new();
        let other = clock.clone();
        block_on(clock.sleep(Duration::from_millis(30)));
        assert_eq!(other.now(), Duration::from_millis(30));
    }

    #[test]
    fn motor_integrates_commands() {
        let mut motor = SimMotor::at(5.0, 0.5);
        motor.set_power(4.0).unwrap();
        motor.set_power(-2.0).unwrap();
        assert_eq!(motor.position().unwrap(), 6.0);
        assert_eq!(motor.commands(), 2);
    }
}
