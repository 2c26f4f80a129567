//! Simulated camera driver.

use std::collections::HashMap;
use std::sync::Arc;

use ring_core::{CameraDevice, CameraDriver, DeviceAddress, DeviceError, DeviceResult};

use crate::activity::ActivityLog;
use crate::bus::TriggerBus;
use crate::camera::{CameraCore, CameraSpec, FrameStatistics, SimulatedDevice};
use crate::common::errors::ops;
use crate::common::TimingConfig;

/// Builder for [`SimulatedDriver`].
#[derive(Debug, Default)]
pub struct SimulatedDriverBuilder {
    timing: TimingConfig,
    cameras: Vec<CameraSpec>,
}

impl SimulatedDriverBuilder {
    /// Timing used by cameras without their own override.
    pub fn timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// Add a camera.
    pub fn camera(mut self, spec: CameraSpec) -> Self {
        self.cameras.push(spec);
        self
    }

    /// Create the cameras and their shared trigger bus.
    pub fn build(self) -> SimulatedDriver {
        let activity = ActivityLog::new();
        let bus = Arc::new(TriggerBus::new(activity.clone()));
        let mut cameras = HashMap::new();
        for spec in self.cameras {
            let core = Arc::new(CameraCore::new(spec, self.timing, bus.clone(), activity.clone()));
            bus.attach(&core);
            cameras.insert(core.address().clone(), core);
        }
        SimulatedDriver {
            cameras,
            bus,
            activity,
        }
    }
}

/// In-process bench of simulated cameras sharing one trigger bus.
///
/// # Example
///
/// ```rust,ignore
/// let driver = SimulatedDriver::builder()
///     .camera(CameraSpec::new("sw"))
///     .camera(CameraSpec::new("hw1"))
///     .build();
/// driver.wire(&"sw".into(), &"hw1".into())?;
/// let device = driver.connect(&"sw".into())?;
/// ```
pub struct SimulatedDriver {
    cameras: HashMap<DeviceAddress, Arc<CameraCore>>,
    bus: Arc<TriggerBus>,
    activity: ActivityLog,
}

impl SimulatedDriver {
    /// Empty bench builder.
    pub fn builder() -> SimulatedDriverBuilder {
        SimulatedDriverBuilder::default()
    }

    /// Bench with default cameras at `addresses` and instant timing.
    pub fn with_cameras<I, A>(addresses: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<DeviceAddress>,
    {
        addresses
            .into_iter()
            .fold(Self::builder(), |b, a| b.camera(CameraSpec::new(a)))
            .build()
    }

    /// Connect `from`'s frame-finished output to `to`'s trigger input.
    pub fn wire(&self, from: &DeviceAddress, to: &DeviceAddress) -> DeviceResult<()> {
        self.bus.wire(from, to)
    }

    /// Trigger lines between cameras.
    pub fn bus(&self) -> &TriggerBus {
        &self.bus
    }

    /// Shared activity log of every camera.
    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    /// Counters of the camera at `address`.
    pub fn statistics(&self, address: &DeviceAddress) -> Option<FrameStatistics> {
        self.cameras.get(address).map(|c| c.statistics())
    }

    /// Addresses of all cameras, sorted.
    pub fn addresses(&self) -> Vec<DeviceAddress> {
        let mut addresses: Vec<_> = self.cameras.keys().cloned().collect();
        addresses.sort();
        addresses
    }
}

impl CameraDriver for SimulatedDriver {
    fn connect(&self, address: &DeviceAddress) -> DeviceResult<Box<dyn CameraDevice>> {
        let core = self
            .cameras
            .get(address)
            .ok_or_else(|| DeviceError::connection(address, "no device answering at this address"))?;
        core.errors().check_operation(address, ops::CONNECT)?;
        tracing::debug!(device = %address, "Simulated camera connected");
        Ok(Box::new(SimulatedDevice::new(core.clone())))
    }
}
