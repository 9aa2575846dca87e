//! Device implementations for the V5 brain.
//!
//! Motors take power in volts. Positions are reported in degrees of
//! motor shaft rotation, so drive targets are in degrees too.

use std::{future::Future, time::Duration};

use vexide::{
    prelude::{InertialSensor, Motor},
    time::{sleep, user_uptime},
};

use super::{Actuator, Clock, OrientationSensor};
use crate::error::{Error, Result};

impl Actuator for Motor {
    fn set_power(&mut self, power: f64) -> Result<()> {
        self.set_voltage(power).map_err(|e| Error::ActuatorFault {
            reason: e.to_string(),
        })
    }

    fn position(&self) -> Result<f64> {
        Motor::position(self)
            .map(|angle| angle.as_degrees())
            .map_err(|e| Error::sensor("motor encoder", e.to_string()))
    }

    fn velocity(&self) -> Result<f64> {
        Motor::velocity(self).map_err(|e| Error::sensor("motor velocity", e.to_string()))
    }
}

impl OrientationSensor for InertialSensor {
    fn heading(&self) -> Result<f64> {
        InertialSensor::heading(self)
            .map(|angle| angle.as_degrees())
            .map_err(|e| Error::sensor("imu heading", e.to_string()))
    }

    fn rotation(&self) -> Result<f64> {
        InertialSensor::rotation(self)
            .map(|angle| angle.as_degrees())
            .map_err(|e| Error::sensor("imu rotation", e.to_string()))
    }

    fn pitch(&self) -> Result<f64> {
        self.euler()
            .map(|euler| euler.a.as_degrees())
            .map_err(|e| Error::sensor("imu pitch", e.to_string()))
    }

    fn roll(&self) -> Result<f64> {
        self.euler()
            .map(|euler| euler.c.as_degrees())
            .map_err(|e| Error::sensor("imu roll", e.to_string()))
    }
}

/// Clock backed by the user program uptime and the vexide executor.
#[derive(Debug, Clone, Copy, Default)]
pub struct VexClock;

impl Clock for VexClock {
    fn now(&self) -> Duration { user_uptime() }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> { sleep(duration) }
}
