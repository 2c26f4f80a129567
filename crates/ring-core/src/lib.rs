//! Core types and traits for trigger-ring.
//!
//! This crate defines the narrow interfaces through which the acquisition core
//! talks to cameras, plus the value types that cross them:
//!
//! - [`device`] - device identity, trigger modes and the driver/device/grabber traits
//! - [`settings`] - configuration template and per-device derived configuration
//! - [`frame`] - frames and the frame-or-timeout wait result
//! - [`error`] - device error taxonomy with stable codes
//!
//! Real camera backends and the in-process simulator both implement
//! [`CameraDriver`]; the acquisition loop only ever sees the traits.

pub mod device;
pub mod error;
pub mod frame;
pub mod settings;

pub use device::{CameraDevice, CameraDriver, DeviceAddress, FrameGrabber, SoftwareTrigger, TriggerMode};
pub use error::{DeviceError, DeviceErrorKind, DeviceResult};
pub use frame::{Frame, FrameResult};
pub use settings::{ConfigurationTemplate, DeviceConfiguration, OutputEvent, OutputMapping};
