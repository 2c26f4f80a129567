//! Device identity, trigger modes and collaborator traits.
//!
//! The acquisition core consumes cameras through four traits, from the outside in:
//!
//! ```text
//! CameraDriver ──connect──▶ CameraDevice ──open_acquisition──▶ FrameGrabber
//!                                                                  │
//!                                                 software_trigger │
//!                                                                  ▼
//!                                                          SoftwareTrigger
//! ```
//!
//! A [`FrameGrabber`] is owned by exactly one acquisition thread and is only
//! `Send`. The [`SoftwareTrigger`] handle it hands out is `Send + Sync` so that
//! another device's callback can fire it while the owner is blocked in
//! [`FrameGrabber::wait_for_frame`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DeviceResult;
use crate::frame::FrameResult;
use crate::settings::DeviceConfiguration;

/// Opaque address of one physical camera (typically an IP address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    /// Wrap an address string.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The address as given.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceAddress {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DeviceAddress {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&DeviceAddress> for DeviceAddress {
    fn from(value: &DeviceAddress) -> Self {
        value.clone()
    }
}

/// Trigger source of a camera.
///
/// Discriminants are the numeric codes used in the device configuration payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Continuous acquisition at the configured frame rate.
    FreeRun = 1,
    /// One exposure per software trigger command.
    Software = 2,
    /// One exposure per rising edge on the trigger input.
    PositiveEdge = 3,
    /// One exposure per falling edge on the trigger input.
    NegativeEdge = 4,
    /// One exposure per edge of either polarity.
    BothEdges = 5,
}

impl TriggerMode {
    /// Numeric payload code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Mode for a payload code, `None` if unknown.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(TriggerMode::FreeRun),
            2 => Some(TriggerMode::Software),
            3 => Some(TriggerMode::PositiveEdge),
            4 => Some(TriggerMode::NegativeEdge),
            5 => Some(TriggerMode::BothEdges),
            _ => None,
        }
    }

    /// Whether the mode reacts to the electrical trigger input.
    pub fn is_edge_triggered(self) -> bool {
        matches!(
            self,
            TriggerMode::PositiveEdge | TriggerMode::NegativeEdge | TriggerMode::BothEdges
        )
    }

    /// Exposures started by one output pulse (a rising then a falling edge).
    pub fn exposures_per_pulse(self) -> u32 {
        match self {
            TriggerMode::PositiveEdge | TriggerMode::NegativeEdge => 1,
            TriggerMode::BothEdges => 2,
            TriggerMode::FreeRun | TriggerMode::Software => 0,
        }
    }
}

impl std::fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TriggerMode::FreeRun => "free_run",
            TriggerMode::Software => "software",
            TriggerMode::PositiveEdge => "positive_edge",
            TriggerMode::NegativeEdge => "negative_edge",
            TriggerMode::BothEdges => "both_edges",
        };
        write!(f, "{}", label)
    }
}

/// Entry point of a camera backend.
pub trait CameraDriver: Send + Sync {
    /// Connect to the device at `address`.
    fn connect(&self, address: &DeviceAddress) -> DeviceResult<Box<dyn CameraDevice>>;
}

/// A connected, configurable camera.
pub trait CameraDevice: Send {
    /// Address this device was connected at.
    fn address(&self) -> &DeviceAddress;

    /// Index of the application currently active on the device.
    fn active_application(&self) -> DeviceResult<u32>;

    /// Apply a complete configuration payload.
    fn configure(&mut self, config: &DeviceConfiguration) -> DeviceResult<()>;

    /// Trigger mode the device is effectively running with.
    fn trigger_mode(&self) -> DeviceResult<TriggerMode>;

    /// Open a frame-acquisition session.
    fn open_acquisition(&self) -> DeviceResult<Box<dyn FrameGrabber>>;
}

/// Blocking frame source for one device.
pub trait FrameGrabber: Send {
    /// Block until the next frame arrives or `timeout` elapses.
    ///
    /// # Returns
    /// - `Ok(FrameResult::Frame)` when a frame was delivered in time
    /// - `Ok(FrameResult::Timeout)` when nothing arrived within `timeout`
    /// - `Err` on a connectivity or protocol fault
    fn wait_for_frame(&mut self, timeout: Duration) -> DeviceResult<FrameResult>;

    /// Handle that fires software triggers on this grabber's device.
    fn software_trigger(&self) -> Arc<dyn SoftwareTrigger>;
}

/// Fire-and-forget software trigger, callable from any thread.
pub trait SoftwareTrigger: Send + Sync {
    /// Device this handle triggers.
    fn address(&self) -> &DeviceAddress;

    /// Send a single software trigger edge.
    fn fire(&self) -> DeviceResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_mode_codes_round_trip() {
        for code in 1..=5u8 {
            let mode = TriggerMode::from_code(code).unwrap();
            assert_eq!(mode.code(), code);
        }
        assert_eq!(TriggerMode::from_code(0), None);
        assert_eq!(TriggerMode::from_code(6), None);
    }

    #[test]
    fn test_edge_modes() {
        assert!(TriggerMode::PositiveEdge.is_edge_triggered());
        assert!(TriggerMode::BothEdges.is_edge_triggered());
        assert!(!TriggerMode::Software.is_edge_triggered());
        assert!(!TriggerMode::FreeRun.is_edge_triggered());
        assert_eq!(TriggerMode::BothEdges.exposures_per_pulse(), 2);
        assert_eq!(TriggerMode::NegativeEdge.exposures_per_pulse(), 1);
        assert_eq!(TriggerMode::Software.exposures_per_pulse(), 0);
    }

    #[test]
    fn test_trigger_mode_serde_names() {
        let json = serde_json::to_string(&TriggerMode::PositiveEdge).unwrap();
        assert_eq!(json, "\"positive_edge\"");
        let mode: TriggerMode = serde_json::from_str("\"both_edges\"").unwrap();
        assert_eq!(mode, TriggerMode::BothEdges);
    }

    #[test]
    fn test_address_display() {
        let address = DeviceAddress::from("192.168.0.70");
        assert_eq!(address.to_string(), "192.168.0.70");
        assert_eq!(address.as_str(), "192.168.0.70");
    }
}
