use log::warn;

use super::Actuator;
use crate::error::{Error, Result};

/// Several motors driven as one.
///
/// Every motor receives the same power. Position and velocity are the mean
/// over the group, so a group can stand in wherever a single [`Actuator`]
/// is expected (for example the left and right sides of a drivetrain).
///
/// # Example
///
/// ```
/// use skar_motion::peripherals::{Actuator, MotorGroup, sim::SimMotor};
///
/// let mut left = MotorGroup::new(vec![SimMotor::new(1.0), SimMotor::new(1.0)]).unwrap();
/// left.set_power(2.0).unwrap();
/// assert_eq!(left.position().unwrap(), 2.0);
/// ```
#[derive(Debug, Clone)]
pub struct MotorGroup<A> {
    motors: Vec<A>,
}

impl<A: Actuator> MotorGroup<A> {
    /// Wraps `motors`. Fails on an empty group.
    pub fn new(motors: Vec<A>) -> Result<Self> {
        if motors.is_empty() {
            return Err(Error::invalid("motor group has no motors"));
        }
        Ok(Self { motors })
    }

    pub fn motors(&self) -> &[A] { &self.motors }

    pub fn motors_mut(&mut self) -> &mut [A] { &mut self.motors }

    pub fn into_inner(self) -> Vec<A> { self.motors }
}

impl<A: Actuator> Actuator for MotorGroup<A> {
    /// Commands every motor, even if an earlier one fails. The first
    /// failure is returned.
    fn set_power(&mut self, power: f64) -> Result<()> {
        let mut first_err = None;
        for motor in self.motors.iter_mut() {
            if let Err(e) = motor.set_power(power) {
                warn!("Motor Group Command Error: {}", e);
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn position(&self) -> Result<f64> {
        let mut sum = 0.0;
        for motor in &self.motors {
            sum += motor.position()?;
        }
        Ok(sum / self.motors.len() as f64)
    }

    fn velocity(&self) -> Result<f64> {
        let mut sum = 0.0;
        for motor in &self.motors {
            sum += motor.velocity()?;
        }
        Ok(sum / self.motors.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripherals::sim::SimMotor;

    #[test]
    fn empty_group_is_rejected() {
        assert!(MotorGroup::<SimMotor>::new(Vec::new()).is_err());
    }

    #[test]
    fn position_is_mean_of_members() {
        let group = MotorGroup::new(vec![
            SimMotor::at(10.0, 1.0),
            SimMotor::at(20.0, 1.0),
            SimMotor::at(30.0, 1.0),
        ])
        .unwrap();
        assert_eq!(group.position().unwrap(), 20.0);
    }

    #[test]
    fn power_reaches_every_motor() {
        let mut group = MotorGroup::new(vec![SimMotor::new(1.0), SimMotor::new(0.5)]).unwrap();
        group.set_power(4.0).unwrap();
        let powers: Vec<f64> = group.motors().iter().map(|m| m.power()).collect();
        assert_eq!(powers, vec![4.0, 4.0]);
    }

    #[test]
    fn one_failed_motor_does_not_starve_the_rest() {
        let mut faulty = SimMotor::new(1.0);
        faulty.fail_commands(true);
        let mut group = MotorGroup::new(vec![faulty, SimMotor::new(1.0)]).unwrap();
        assert!(group.set_power(3.0).is_err());
        assert_eq!(group.motors()[1].power(), 3.0);
    }
}
