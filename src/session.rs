//! Per-device acquisition session.
//!
//! An [`AcquisitionSession`] owns the frame grabber of one configured device.
//! It is moved into that device's worker thread and never shared; the only
//! thing that leaves it is the thread-safe [`SoftwareTrigger`] handle.

use std::sync::Arc;
use std::time::Duration;

use ring_core::{CameraDevice, DeviceAddress, DeviceResult, FrameGrabber, FrameResult, SoftwareTrigger};

/// Frame source of one configured device.
pub struct AcquisitionSession {
    address: DeviceAddress,
    grabber: Box<dyn FrameGrabber>,
}

impl AcquisitionSession {
    /// Open a frame acquisition on an already configured device.
    pub fn open(device: &dyn CameraDevice) -> DeviceResult<Self> {
        let grabber = device.open_acquisition()?;
        tracing::debug!(device = %device.address(), "Acquisition session opened");
        Ok(Self {
            address: device.address().clone(),
            grabber,
        })
    }

    /// Device this session reads from.
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Block until a frame is delivered or `timeout` elapses.
    ///
    /// `Ok(FrameResult::Timeout)` is a normal outcome. Device faults are
    /// returned as errors and never folded into a timeout.
    pub fn wait_for_frame(&mut self, timeout: Duration) -> DeviceResult<FrameResult> {
        self.grabber.wait_for_frame(timeout)
    }

    /// Handle that fires this device's software trigger from any thread.
    pub fn trigger_handle(&self) -> Arc<dyn SoftwareTrigger> {
        self.grabber.software_trigger()
    }
}

impl std::fmt::Debug for AcquisitionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionSession")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring_core::{CameraDriver, ConfigurationTemplate, TriggerMode};
    use ring_driver_mock::SimulatedDriver;

    #[test]
    fn test_session_times_out_then_receives_triggered_frame() {
        let driver = SimulatedDriver::with_cameras(["sw"]);
        let mut device = driver.connect(&"sw".into()).unwrap();
        device
            .configure(&ConfigurationTemplate::default().derive(1, TriggerMode::Software))
            .unwrap();

        let mut session = AcquisitionSession::open(device.as_ref()).unwrap();
        assert_eq!(session.address().as_str(), "sw");
        assert!(session
            .wait_for_frame(Duration::from_millis(20))
            .unwrap()
            .is_timeout());

        session.trigger_handle().fire().unwrap();
        let result = session.wait_for_frame(Duration::from_millis(500)).unwrap();
        assert_eq!(result.frame().map(|f| f.sequence), Some(1));
    }
}
