//! Frame callbacks invoked by acquisition workers.
//!
//! - [`ReportCallback`] logs every outcome and optionally forwards it to an
//!   event tap.
//! - [`RetriggerCallback`] fires the software device's trigger first and then
//!   delegates to an inner callback (a `ReportCallback` by default). It is
//!   bound to the last hardware device only.
//!
//! Callbacks run on the worker thread that owns them and never panic on
//! device failures.

use chrono::{DateTime, Utc};
use ring_core::{DeviceAddress, DeviceError, FrameResult};
use tokio::sync::mpsc::UnboundedSender;

use crate::trigger::TriggerCoordinator;

/// Reaction to the outcome of one frame wait.
pub trait FrameCallback: Send {
    /// A frame arrived or the wait timed out.
    fn on_result(&mut self, device: &DeviceAddress, result: &FrameResult);

    /// The wait failed with a device error.
    fn on_error(&mut self, device: &DeviceAddress, error: &DeviceError);
}

/// Outcome forwarded to the event tap.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportEvent {
    /// Device whose worker produced the outcome.
    pub device: DeviceAddress,
    /// What happened.
    pub kind: ReportKind,
}

/// Kind of a reported outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportKind {
    /// A frame was delivered.
    Frame {
        /// Device frame counter.
        sequence: u64,
        /// Capture time.
        timestamp: DateTime<Utc>,
    },
    /// No frame within the frame timeout.
    Timeout,
    /// The frame wait failed.
    Error {
        /// Stable `DEV_*` code.
        code: &'static str,
        /// Rendered device error.
        message: String,
    },
    /// Firing the software device's trigger failed.
    RetriggerFailed {
        /// Stable `DEV_*` code.
        code: &'static str,
        /// Rendered device error.
        message: String,
    },
}

impl ReportKind {
    fn from_error(error: &DeviceError) -> Self {
        ReportKind::Error {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// Logs each outcome through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct ReportCallback {
    tap: Option<UnboundedSender<ReportEvent>>,
}

impl ReportCallback {
    /// Log-only reporting.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also forward every outcome to `tap`.
    pub fn with_tap(tap: UnboundedSender<ReportEvent>) -> Self {
        Self { tap: Some(tap) }
    }

    fn forward(&self, device: &DeviceAddress, kind: ReportKind) {
        if let Some(tap) = &self.tap {
            // Receiver gone means nobody listens any more
            let _ = tap.send(ReportEvent {
                device: device.clone(),
                kind,
            });
        }
    }

    fn retrigger_failed(&self, device: &DeviceAddress, error: &DeviceError) {
        tracing::error!(
            device = %device,
            target_device = %error.address,
            code = error.code(),
            error = %error,
            "Software retrigger failed"
        );
        self.forward(
            device,
            ReportKind::RetriggerFailed {
                code: error.code(),
                message: error.to_string(),
            },
        );
    }
}

impl FrameCallback for ReportCallback {
    fn on_result(&mut self, device: &DeviceAddress, result: &FrameResult) {
        match result {
            FrameResult::Frame(frame) => {
                tracing::info!(
                    device = %device,
                    sequence = frame.sequence,
                    timestamp = %frame.timestamp.to_rfc3339(),
                    "Frame received"
                );
                self.forward(
                    device,
                    ReportKind::Frame {
                        sequence: frame.sequence,
                        timestamp: frame.timestamp,
                    },
                );
            }
            FrameResult::Timeout => {
                tracing::warn!(device = %device, "Timeout occurred while waiting for frame");
                self.forward(device, ReportKind::Timeout);
            }
        }
    }

    fn on_error(&mut self, device: &DeviceAddress, error: &DeviceError) {
        tracing::error!(
            device = %device,
            code = error.code(),
            error = %error,
            "Acquisition error"
        );
        self.forward(device, ReportKind::from_error(error));
    }
}

/// Fires the software trigger, then reports.
///
/// Retriggers on frames and on timeouts so a dropped pulse somewhere in the
/// chain does not stall the ring. Device errors are reported without a
/// retrigger.
pub struct RetriggerCallback<C = ReportCallback> {
    coordinator: TriggerCoordinator,
    inner: C,
    report: ReportCallback,
}

impl RetriggerCallback<ReportCallback> {
    /// Retrigger, then report through `report`.
    pub fn new(coordinator: TriggerCoordinator, report: ReportCallback) -> Self {
        Self {
            coordinator,
            inner: report.clone(),
            report,
        }
    }
}

impl<C: FrameCallback> RetriggerCallback<C> {
    /// Retrigger in front of an arbitrary callback.
    ///
    /// `report` only receives retrigger failures.
    pub fn wrapping(coordinator: TriggerCoordinator, inner: C, report: ReportCallback) -> Self {
        Self {
            coordinator,
            inner,
            report,
        }
    }
}

impl<C: FrameCallback> FrameCallback for RetriggerCallback<C> {
    fn on_result(&mut self, device: &DeviceAddress, result: &FrameResult) {
        if let Err(err) = self.coordinator.fire_software_trigger() {
            self.report.retrigger_failed(device, &err);
        }
        self.inner.on_result(device, result);
    }

    fn on_error(&mut self, device: &DeviceAddress, error: &DeviceError) {
        self.inner.on_error(device, error);
    }
}
