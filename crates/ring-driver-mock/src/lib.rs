//! Simulated cameras for trigger-ring.
//!
//! This crate implements the `ring-core` collaborator traits in-process so the
//! trigger ring can run without hardware. It models:
//!
//! - trigger modes (software, edge-triggered, free-run)
//! - frame-finished output pulses routed over a [`TriggerBus`]
//! - exposure/readout timing ([`TimingConfig`])
//! - bounded frame buffering with lost-frame accounting
//! - fault injection ([`ErrorConfig`], [`ErrorScenario`])
//!
//! Everything the cameras do is appended to a shared [`ActivityLog`] so tests can
//! check cross-device ordering.
//!
//! ```rust,ignore
//! use ring_driver_mock::{CameraSpec, SimulatedDriver, TimingConfig};
//!
//! let driver = SimulatedDriver::builder()
//!     .timing(TimingConfig::realistic())
//!     .camera(CameraSpec::new("192.168.0.70"))
//!     .camera(CameraSpec::new("192.168.0.71"))
//!     .build();
//! driver.wire(&"192.168.0.70".into(), &"192.168.0.71".into())?;
//! ```

pub mod activity;
pub mod bus;
pub mod camera;
pub mod common;
pub mod driver;
mod pattern;

pub use activity::{Activity, ActivityKind, ActivityLog};
pub use bus::TriggerBus;
pub use camera::{CameraSpec, FrameStatistics, SimulatedDevice, SimulatedGrabber, DEFAULT_BUFFER_FRAMES};
pub use common::{ErrorConfig, ErrorScenario, MockRng, TimingConfig};
pub use driver::{SimulatedDriver, SimulatedDriverBuilder};

pub use common::errors::ops;
