//! Device configuration payloads.
//!
//! Cameras are configured from one shared [`ConfigurationTemplate`]. The
//! template is never patched in place: each device gets its own
//! [`DeviceConfiguration`] derived from it with the device-specific overrides
//! (application index and trigger mode), so configuring devices from several
//! threads cannot interfere.
//!
//! The digital outputs are part of the payload because they close the trigger
//! ring: [`OutputEvent::AcquisitionFinished`] on an output line is the
//! frame-finished pulse that drives the next camera's trigger input.

use serde::{Deserialize, Serialize};

use crate::device::TriggerMode;

/// Device event routed to a digital output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputEvent {
    /// Asserted while the device is able to accept a trigger.
    ReadyForTrigger,
    /// Pulsed when one acquisition has completed.
    AcquisitionFinished,
    /// Output held low.
    Disabled,
}

/// Assignment of events to the two digital outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputMapping {
    /// Event on digital output 1.
    pub out1: OutputEvent,
    /// Event on digital output 2.
    pub out2: OutputEvent,
    /// Pulse width in microseconds; 0 means the device default.
    #[serde(default)]
    pub pulse_duration_us: u32,
}

impl OutputMapping {
    /// Whether any output carries the frame-finished pulse.
    pub fn signals_acquisition_finished(&self) -> bool {
        self.out1 == OutputEvent::AcquisitionFinished
            || self.out2 == OutputEvent::AcquisitionFinished
    }
}

impl Default for OutputMapping {
    fn default() -> Self {
        Self {
            out1: OutputEvent::ReadyForTrigger,
            out2: OutputEvent::AcquisitionFinished,
            pulse_duration_us: 0,
        }
    }
}

/// Shared base for all device configurations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationTemplate {
    /// Exposure in microseconds.
    pub exposure_time_us: u32,
    /// Imager preset name.
    pub imager_type: String,
    /// Upper bound on the acquisition rate.
    pub frame_rate_hz: f64,
    /// Digital output routing.
    #[serde(default)]
    pub outputs: OutputMapping,
}

impl Default for ConfigurationTemplate {
    fn default() -> Self {
        Self {
            exposure_time_us: 1000,
            imager_type: "under5m_moderate".to_string(),
            frame_rate_hz: 20.0,
            outputs: OutputMapping::default(),
        }
    }
}

impl ConfigurationTemplate {
    /// Produce a fresh configuration for one device.
    pub fn derive(&self, application_index: u32, trigger_mode: TriggerMode) -> DeviceConfiguration {
        DeviceConfiguration {
            active_application: application_index,
            trigger_mode,
            exposure_time_us: self.exposure_time_us,
            imager_type: self.imager_type.clone(),
            frame_rate_hz: self.frame_rate_hz,
            outputs: self.outputs,
        }
    }
}

/// Complete configuration for one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfiguration {
    /// Application index the payload is written for.
    pub active_application: u32,
    /// Trigger source of this device.
    pub trigger_mode: TriggerMode,
    /// Exposure in microseconds.
    pub exposure_time_us: u32,
    /// Imager preset name.
    pub imager_type: String,
    /// Upper bound on the acquisition rate.
    pub frame_rate_hz: f64,
    /// Digital output routing.
    pub outputs: OutputMapping,
}

impl DeviceConfiguration {
    /// Structured payload sent to the device.
    ///
    /// The active application and the application entry carry the same index;
    /// the trigger mode is encoded with its numeric device code.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "device": {
                "active_application": self.active_application,
            },
            "applications": [{
                "index": self.active_application,
                "trigger_mode": self.trigger_mode.code(),
                "outputs": self.outputs,
                "imager": {
                    "exposure_time_us": self.exposure_time_us,
                    "type": self.imager_type,
                    "frame_rate_hz": self.frame_rate_hz,
                },
            }],
        })
    }
}
