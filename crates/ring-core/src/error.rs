//! Device error taxonomy.
//!
//! Every failure reported by a camera backend is a [`DeviceError`]: the address
//! of the device it concerns, a [`DeviceErrorKind`] category and a message.
//! A frame wait that simply produced nothing is *not* an error; it is
//! [`FrameResult::Timeout`](crate::frame::FrameResult::Timeout).
//!
//! Kinds carry stable string codes (see [`DeviceErrorKind::code`]) which are
//! attached to every error log line so that operators and log aggregation can
//! match on them without parsing messages.

use thiserror::Error;

use crate::device::DeviceAddress;

/// Category of a device failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceErrorKind {
    /// Device unreachable or the link dropped.
    Connection,
    /// Configuration payload rejected or application lookup failed.
    Configuration,
    /// Fault reported by the device during an in-flight operation.
    Protocol,
    /// Software trigger rejected (wrong mode, device busy).
    Trigger,
    /// Anything the driver could not classify.
    Unknown,
}

impl DeviceErrorKind {
    /// Stable identifier exposed in logs.
    pub fn code(&self) -> &'static str {
        match self {
            DeviceErrorKind::Connection => "DEV_CONNECTION",
            DeviceErrorKind::Configuration => "DEV_CONFIGURATION",
            DeviceErrorKind::Protocol => "DEV_PROTOCOL",
            DeviceErrorKind::Trigger => "DEV_TRIGGER",
            DeviceErrorKind::Unknown => "DEV_UNKNOWN",
        }
    }
}

impl std::fmt::Display for DeviceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DeviceErrorKind::Connection => "connection",
            DeviceErrorKind::Configuration => "configuration",
            DeviceErrorKind::Protocol => "protocol",
            DeviceErrorKind::Trigger => "trigger",
            DeviceErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

/// Structured device failure.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Device '{address}' {kind} error: {message}")]
pub struct DeviceError {
    /// Device the failure belongs to.
    pub address: DeviceAddress,
    /// Failure category.
    pub kind: DeviceErrorKind,
    /// Driver detail.
    pub message: String,
}

impl DeviceError {
    /// Error of any kind.
    pub fn new(
        address: impl Into<DeviceAddress>,
        kind: DeviceErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a [`DeviceErrorKind::Connection`] error.
    pub fn connection(address: impl Into<DeviceAddress>, message: impl Into<String>) -> Self {
        Self::new(address, DeviceErrorKind::Connection, message)
    }

    /// Shorthand for a [`DeviceErrorKind::Configuration`] error.
    pub fn configuration(address: impl Into<DeviceAddress>, message: impl Into<String>) -> Self {
        Self::new(address, DeviceErrorKind::Configuration, message)
    }

    /// Shorthand for a [`DeviceErrorKind::Protocol`] error.
    pub fn protocol(address: impl Into<DeviceAddress>, message: impl Into<String>) -> Self {
        Self::new(address, DeviceErrorKind::Protocol, message)
    }

    /// Shorthand for a [`DeviceErrorKind::Trigger`] error.
    pub fn trigger(address: impl Into<DeviceAddress>, message: impl Into<String>) -> Self {
        Self::new(address, DeviceErrorKind::Trigger, message)
    }

    /// Stable `DEV_*` code of the kind.
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

/// Result alias for collaborator calls.
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;
