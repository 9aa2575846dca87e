//! Per-robot tuning loaded from TOML.
//!
//! Every section is optional; anything left out keeps the defaults the
//! primitives ship with.
//!
//! ```toml
//! [drive]
//! max_power = 100.0
//!
//! [drive.gains]
//! kp = 0.01
//! ki = 0.0
//! kd = -0.05
//! tolerance = 100.0
//!
//! [balance]
//! axis = "roll"
//! mount_threshold = 10.0
//! level_threshold = 10.0
//! ```

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    motion::{
        balance::BalanceTuning,
        drive::{DriveGeometry, DriveTuning},
        turn::TurnTuning,
        vision::VisionTuning,
    },
};

/// Tuning for every primitive on one robot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    pub drive:    DriveTuning,
    pub geometry: DriveGeometry,
    pub turn:     TurnTuning,
    pub vision:   VisionTuning,
    pub balance:  BalanceTuning,
}

impl TuningConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&text)?;
        info!("Loaded tuning from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.drive.validate()?;
        self.geometry.validate()?;
        self.turn.validate()?;
        self.vision.validate()?;
        self.balance.validate()
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{motion::PidGains, peripherals::TiltAxis};

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(TuningConfig::from_toml_str("").unwrap(), TuningConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = TuningConfig::from_toml_str(
            r#"
            [drive]
            max_power = 100.0
            timeout_ms = 3000

            [drive.gains]
            kp = 0.02
            ki = 0.0
            kd = -0.04
            tolerance = 50.0

            [balance]
            axis = "roll"
            mount_threshold = 10.0
            level_threshold = 10.0
            "#,
        )
        .unwrap();

        assert_eq!(config.drive.max_power, 100.0);
        assert_eq!(config.drive.timeout_ms, 3000);
        assert_eq!(config.drive.tick_ms, 2);
        assert_eq!(config.drive.gains.kp, 0.02);
        assert_eq!(config.turn, TurnTuning::default());
        assert_eq!(config.balance.axis, TiltAxis::Roll);
        assert_eq!(config.balance.mount_threshold, 10.0);
        assert_eq!(config.balance.poll_ms, 30);
    }

    #[test]
    fn partial_gains_table_fills_missing_fields() {
        let config = TuningConfig::from_toml_str(
            r#"
            [drive.gains]
            kp = 0.02
            "#,
        )
        .unwrap();
        assert_eq!(config.drive.gains, PidGains {
            kp: 0.02,
            ..PidGains::default()
        });
        assert_eq!(config.drive.max_power, DriveTuning::default().max_power);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let result = TuningConfig::from_toml_str(
            r#"
            [vision]
            err_thresh = 0.0
            "#,
        );
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let result = TuningConfig::from_toml_str("[drive\nmax_power = ");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn written_config_reads_back() {
        let mut config = TuningConfig::default();
        config.vision.settle_ms = 200;
        config.geometry.wheel_diameter = 3.25;
        let text = config.to_toml_string().unwrap();
        assert_eq!(TuningConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let result = TuningConfig::load("/nonexistent/skar-tuning.toml");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
