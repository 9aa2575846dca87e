//! Error types for the motion core.
//!
//! Loop endings that are part of normal operation (arrival, timeout,
//! cancellation) are reported through [`Outcome`](crate::motion::Outcome).
//! This module covers everything else: bad tuning handed in by the caller
//! and devices that fail or return garbage mid-motion.

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the control core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A tuning value or argument cannot be used, e.g. a non-positive
    /// `dt`, a zero tolerance or an empty actuator set.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A sensor read failed or produced an out-of-range value.
    #[error("Sensor fault on {device}: {reason}")]
    SensorFault {
        /// The device that was being read.
        device: &'static str,
        /// What went wrong.
        reason: String,
    },

    /// An actuator rejected a command.
    #[error("Actuator fault: {reason}")]
    ActuatorFault {
        /// What went wrong.
        reason: String,
    },

    /// The collaborator does not provide an optional capability.
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),

    /// Tuning could not be read or parsed.
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub(crate) fn sensor(device: &'static str, reason: impl Into<String>) -> Self {
        Self::SensorFault {
            device,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_fault_names_device() {
        let err = Error::sensor("imu", "reading is NaN");
        assert_eq!(err.to_string(), "Sensor fault on imu: reading is NaN");
    }

    #[test]
    fn invalid_configuration_message() {
        let err = Error::invalid("tick must be positive");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: tick must be positive"
        );
    }
}
