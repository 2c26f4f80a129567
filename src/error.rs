//! Error types for the trigger ring.
//!
//! `RingError` is the error type of every fallible operation in this crate.
//! Device-level failures keep their own type ([`DeviceError`]) and are wrapped
//! with `#[from]` so the `?` operator lifts them into a `RingError`.
//!
//! Every variant carries a stable code (`RING_*`) that log lines emit as a
//! `code` field, next to the `DEV_*` codes of [`DeviceError`].

use ring_core::{DeviceAddress, DeviceError};
use thiserror::Error;

/// Convenience alias for results using the ring error type.
pub type RingResult<T> = std::result::Result<T, RingError>;

/// Ring setup and lifecycle errors.
#[derive(Error, Debug)]
pub enum RingError {
    /// The configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// The configuration parsed but is not a usable ring.
    #[error("Configuration validation error: {0}")]
    Validation(String),

    /// A device operation failed.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// A worker thread could not be created.
    #[error("Failed to spawn acquisition thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The seed device did not start.
    #[error("Software-triggered device '{address}' could not be started; the ring cannot be seeded")]
    SoftwareDeviceUnavailable {
        /// Software device address.
        address: DeviceAddress,
    },

    /// No hardware device is configured or none started.
    #[error("No hardware-triggered devices configured")]
    NoHardwareDevices,
}

impl From<figment::Error> for RingError {
    fn from(err: figment::Error) -> Self {
        RingError::Config(Box::new(err))
    }
}

impl RingError {
    /// Stable code for structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            RingError::Config(_) => "RING_CONFIG",
            RingError::Validation(_) => "RING_VALIDATION",
            RingError::Device(_) => "RING_DEVICE",
            RingError::Spawn(_) => "RING_SPAWN",
            RingError::SoftwareDeviceUnavailable { .. } => "RING_SOFTWARE_DEVICE_UNAVAILABLE",
            RingError::NoHardwareDevices => "RING_NO_HARDWARE_DEVICES",
        }
    }
}
