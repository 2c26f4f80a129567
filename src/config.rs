//! Ring configuration using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (base configuration, `config/trigger-ring.toml` by default)
//! 2. environment variables prefixed with `TRIGGER_RING_`, nested with `__`
//!
//! Every field has a default, so an empty or missing file yields a usable
//! configuration for the reference bench.
//!
//! # Example
//! ```no_run
//! use trigger_ring::config::RingConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // TRIGGER_RING_ACQUISITION__FRAME_TIMEOUT_MS=2500 overrides the file
//! let config = RingConfig::load_from("config/trigger-ring.toml")?;
//! config.validate()?;
//! println!("software device: {}", config.ring.software_device);
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use ring_core::{ConfigurationTemplate, DeviceAddress, OutputMapping, TriggerMode};
use serde::{Deserialize, Serialize};

use crate::error::{RingError, RingResult};
use crate::logging::{parse_log_level, OutputFormat};
use crate::worker::AcquisitionPolicy;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/trigger-ring.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "TRIGGER_RING_";

/// Top-level ring configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// Device topology
    pub ring: RingSection,
    /// Worker loop timing and failure handling
    pub acquisition: AcquisitionSection,
    /// Imager settings shared by every device
    pub imager: ImagerSection,
    /// Logging output
    pub logging: LoggingSection,
}

/// Which devices take part in the ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingSection {
    /// The single software-triggered device that seeds the ring
    pub software_device: DeviceAddress,
    /// Hardware-triggered chain, in trigger order; the last entry retriggers
    pub hardware_devices: Vec<DeviceAddress>,
    /// Trigger mode for every hardware device
    pub hardware_trigger: TriggerMode,
}

/// Worker loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionSection {
    /// Upper bound of one frame wait, in milliseconds
    pub frame_timeout_ms: u64,
    /// Pause before every frame wait, in milliseconds
    pub poll_interval_ms: u64,
    /// Consecutive device errors after which a worker halts
    pub max_consecutive_failures: u32,
    /// Extra pause after a timeout, in milliseconds (0 = none)
    pub timeout_backoff_ms: u64,
    /// How long shutdown waits for workers to exit, in milliseconds
    pub shutdown_timeout_ms: u64,
}

/// Imager settings applied to every device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagerSection {
    /// Exposure time in microseconds
    pub exposure_time_us: u32,
    /// Imager operating type (e.g. "under5m_moderate")
    pub imager_type: String,
    /// Frame rate in Hz (only paces free-running devices)
    pub frame_rate_hz: f64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Logging level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (pretty, compact, json)
    pub format: String,
}

impl Default for RingSection {
    fn default() -> Self {
        Self {
            software_device: DeviceAddress::from("192.168.0.70"),
            hardware_devices: vec![
                DeviceAddress::from("192.168.0.71"),
                DeviceAddress::from("192.168.0.72"),
            ],
            hardware_trigger: TriggerMode::PositiveEdge,
        }
    }
}

impl Default for AcquisitionSection {
    fn default() -> Self {
        Self {
            frame_timeout_ms: 10_000,
            poll_interval_ms: 1,
            max_consecutive_failures: 3,
            timeout_backoff_ms: 0,
            shutdown_timeout_ms: 5000,
        }
    }
}

impl Default for ImagerSection {
    fn default() -> Self {
        let template = ConfigurationTemplate::default();
        Self {
            exposure_time_us: template.exposure_time_us,
            imager_type: template.imager_type,
            frame_rate_hz: template.frame_rate_hz,
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl RingConfig {
    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; defaults and environment apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> RingResult<Self> {
        Ok(figment(path.as_ref(), ENV_PREFIX).extract()?)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> RingResult<()> {
        let ring = &self.ring;
        if ring.hardware_devices.is_empty() {
            return Err(RingError::NoHardwareDevices);
        }

        let mut seen = HashSet::new();
        for address in &ring.hardware_devices {
            if !seen.insert(address) {
                return Err(invalid(format!("Duplicate hardware device: {}", address)));
            }
        }
        if seen.contains(&ring.software_device) {
            return Err(invalid(format!(
                "Software device {} is also listed as a hardware device",
                ring.software_device
            )));
        }

        if !ring.hardware_trigger.is_edge_triggered() {
            return Err(invalid(format!(
                "Invalid hardware_trigger '{}'. Must be one of: positive_edge, negative_edge",
                ring.hardware_trigger
            )));
        }
        // Each device must expose exactly once per pulse or the ring multiplies its own triggers
        if ring.hardware_trigger.exposures_per_pulse() != 1 {
            return Err(invalid(format!(
                "hardware_trigger '{}' starts {} exposures per pulse; a ring needs exactly one",
                ring.hardware_trigger,
                ring.hardware_trigger.exposures_per_pulse()
            )));
        }

        if self.acquisition.frame_timeout_ms == 0 {
            return Err(invalid("frame_timeout_ms must be greater than 0"));
        }
        if self.acquisition.max_consecutive_failures == 0 {
            return Err(invalid("max_consecutive_failures must be at least 1"));
        }

        let rate = self.imager.frame_rate_hz;
        if rate.is_nan() || rate <= 0.0 {
            return Err(invalid(format!(
                "Invalid frame_rate_hz {}. Must be positive",
                rate
            )));
        }
        if self.imager.exposure_time_us == 0 {
            return Err(invalid("exposure_time_us must be greater than 0"));
        }

        parse_log_level(&self.logging.level).map_err(RingError::Validation)?;
        self.logging
            .format
            .parse::<OutputFormat>()
            .map_err(RingError::Validation)?;

        Ok(())
    }

    /// Base device configuration; each device derives its own copy.
    pub fn template(&self) -> ConfigurationTemplate {
        ConfigurationTemplate {
            exposure_time_us: self.imager.exposure_time_us,
            imager_type: self.imager.imager_type.clone(),
            frame_rate_hz: self.imager.frame_rate_hz,
            outputs: OutputMapping::default(),
        }
    }

    /// Worker loop policy.
    pub fn policy(&self) -> AcquisitionPolicy {
        let acq = &self.acquisition;
        AcquisitionPolicy {
            poll_interval: Duration::from_millis(acq.poll_interval_ms),
            frame_timeout: Duration::from_millis(acq.frame_timeout_ms),
            max_consecutive_failures: acq.max_consecutive_failures,
            timeout_backoff: Duration::from_millis(acq.timeout_backoff_ms),
        }
    }

    /// How long shutdown waits for workers to join.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.acquisition.shutdown_timeout_ms)
    }
}

fn figment(path: &Path, env_prefix: &str) -> Figment {
    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(env_prefix).split("__"))
}

fn invalid(message: impl Into<String>) -> RingError {
    RingError::Validation(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = RingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ring.hardware_devices.len(), 2);
        assert_eq!(config.acquisition.frame_timeout_ms, 10_000);
        assert_eq!(config.acquisition.max_consecutive_failures, 3);
        assert_eq!(config.imager.imager_type, "under5m_moderate");
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            r#"
[ring]
software_device = "10.0.0.1"
hardware_devices = ["10.0.0.2", "10.0.0.3", "10.0.0.4"]
hardware_trigger = "negative_edge"

[acquisition]
frame_timeout_ms = 250
max_consecutive_failures = 5

[imager]
exposure_time_us = 400

[logging]
level = "debug"
format = "json"
"#,
        );

        let config = RingConfig::load_from(file.path()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.ring.software_device, DeviceAddress::from("10.0.0.1"));
        assert_eq!(config.ring.hardware_devices.len(), 3);
        assert_eq!(config.ring.hardware_trigger, TriggerMode::NegativeEdge);
        assert_eq!(config.acquisition.frame_timeout_ms, 250);
        // Unset fields keep their defaults
        assert_eq!(config.acquisition.poll_interval_ms, 1);
        assert_eq!(config.imager.exposure_time_us, 400);
        assert_eq!(config.imager.frame_rate_hz, 20.0);
        assert_eq!(config.logging.format, "json");

        let policy = config.policy();
        assert_eq!(policy.frame_timeout, Duration::from_millis(250));
        assert_eq!(policy.max_consecutive_failures, 5);
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/trigger-ring.toml");
        let config: RingConfig = figment(Path::new(path), "RING_SHIPPED_TEST_").extract().unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config, RingConfig::default());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RingConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.ring, RingSection::default());
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = write_config("[acquisition]\nframe_timeout_ms = 250\n");
        let prefix = "RING_CONFIG_TEST_";
        std::env::set_var(format!("{prefix}ACQUISITION__FRAME_TIMEOUT_MS"), "2500");
        std::env::set_var(format!("{prefix}LOGGING__LEVEL"), "warn");

        let config: RingConfig = figment(file.path(), prefix).extract().unwrap();

        std::env::remove_var(format!("{prefix}ACQUISITION__FRAME_TIMEOUT_MS"));
        std::env::remove_var(format!("{prefix}LOGGING__LEVEL"));

        assert_eq!(config.acquisition.frame_timeout_ms, 2500);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_unknown_trigger_mode_fails_to_parse() {
        let file = write_config("[ring]\nhardware_trigger = \"rising\"\n");
        let err = RingConfig::load_from(file.path()).unwrap_err();
        assert_eq!(err.code(), "RING_CONFIG");
    }

    #[test]
    fn test_validation_rejects_bad_topologies() {
        let mut config = RingConfig::default();
        config.ring.hardware_devices.clear();
        assert!(matches!(config.validate(), Err(RingError::NoHardwareDevices)));

        let mut config = RingConfig::default();
        config.ring.hardware_devices = vec!["a".into(), "b".into(), "a".into()];
        assert!(matches!(config.validate(), Err(RingError::Validation(_))));

        let mut config = RingConfig::default();
        config.ring.hardware_devices.push(config.ring.software_device.clone());
        assert!(matches!(config.validate(), Err(RingError::Validation(_))));

        let mut config = RingConfig::default();
        config.ring.hardware_trigger = TriggerMode::Software;
        assert!(matches!(config.validate(), Err(RingError::Validation(_))));
    }

    #[test]
    fn test_validation_rejects_multiplying_trigger_mode() {
        let mut config = RingConfig::default();
        config.ring.hardware_trigger = TriggerMode::BothEdges;
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), "RING_VALIDATION");
        assert!(err.to_string().contains("both_edges"));

        config.ring.hardware_trigger = TriggerMode::NegativeEdge;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = RingConfig::default();
        config.acquisition.frame_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = RingConfig::default();
        config.acquisition.max_consecutive_failures = 0;
        assert!(config.validate().is_err());

        let mut config = RingConfig::default();
        config.imager.frame_rate_hz = 0.0;
        assert!(config.validate().is_err());

        let mut config = RingConfig::default();
        config.imager.frame_rate_hz = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = RingConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());

        let mut config = RingConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_template_carries_imager_settings() {
        let mut config = RingConfig::default();
        config.imager.exposure_time_us = 750;
        config.imager.frame_rate_hz = 10.0;
        let derived = config.template().derive(1, TriggerMode::Software);
        assert_eq!(derived.exposure_time_us, 750);
        assert_eq!(derived.frame_rate_hz, 10.0);
        assert_eq!(derived.trigger_mode, TriggerMode::Software);
        assert!(derived.outputs.signals_acquisition_finished());
    }
}
