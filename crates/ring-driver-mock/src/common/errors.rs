//! Fault injection for simulated cameras.
//!
//! Each simulated camera carries an [`ErrorConfig`]. Every collaborator call
//! (`connect`, `configure`, `wait_for_frame`, `software_trigger`, ...) asks it
//! whether to fail before doing any work.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use ring_core::{DeviceAddress, DeviceError, DeviceErrorKind};

use super::rng::MockRng;

/// Operation names checked by the simulator.
pub mod ops {
    /// `CameraDriver::connect`.
    pub const CONNECT: &str = "connect";
    /// `CameraDevice::active_application`.
    pub const ACTIVE_APPLICATION: &str = "active_application";
    /// `CameraDevice::configure`.
    pub const CONFIGURE: &str = "configure";
    /// `CameraDevice::open_acquisition`.
    pub const OPEN_ACQUISITION: &str = "open_acquisition";
    /// `FrameGrabber::wait_for_frame`.
    pub const WAIT_FOR_FRAME: &str = "wait_for_frame";
    /// `SoftwareTrigger::fire`.
    pub const SOFTWARE_TRIGGER: &str = "software_trigger";
}

/// A deterministic failure pattern.
#[derive(Debug, Clone)]
pub enum ErrorScenario {
    /// Nothing answers at the device address; `connect` always fails.
    Unreachable,
    /// The device rejects every configuration payload.
    RejectConfiguration,
    /// The next `count` calls of `operation` fail with a protocol error.
    FailNext {
        /// One of [`ops`].
        operation: &'static str,
        /// Failures before the operation recovers.
        count: u32,
    },
    /// `operation` succeeds `count` times, then fails with a protocol error.
    FailAfterN {
        /// One of [`ops`].
        operation: &'static str,
        /// Successful calls before the first failure.
        count: u32,
    },
    /// Every operation fails with a connection error once `after` waits succeeded.
    CommunicationLoss {
        /// Successful frame waits before the link drops.
        after: u32,
    },
}

#[derive(Default, Debug)]
struct ErrorState {
    /// Calls seen per operation.
    calls: HashMap<&'static str, u32>,
    communication_lost: bool,
}

/// Fault injection configuration for one simulated camera.
#[derive(Clone, Debug)]
pub struct ErrorConfig {
    /// Per-operation protocol failure probability; `"*"` applies to all.
    failure_rates: Arc<HashMap<&'static str, f64>>,
    scenarios: Arc<Vec<ErrorScenario>>,
    rng: Arc<MockRng>,
    state: Arc<Mutex<ErrorState>>,
}

impl ErrorConfig {
    /// No injected faults.
    pub fn none() -> Self {
        Self::scenarios(Vec::new())
    }

    /// A single failure pattern.
    pub fn scenario(scenario: ErrorScenario) -> Self {
        Self::scenarios(vec![scenario])
    }

    /// Several failure patterns, checked in order.
    pub fn scenarios(scenarios: Vec<ErrorScenario>) -> Self {
        Self {
            failure_rates: Arc::new(HashMap::new()),
            scenarios: Arc::new(scenarios),
            rng: Arc::new(MockRng::new(None)),
            state: Arc::new(Mutex::new(ErrorState::default())),
        }
    }

    /// Uniform random protocol failures on every operation.
    pub fn random_failures_seeded(rate: f64, seed: Option<u64>) -> Self {
        let mut rates = HashMap::new();
        rates.insert("*", rate);
        Self {
            failure_rates: Arc::new(rates),
            scenarios: Arc::new(Vec::new()),
            rng: Arc::new(MockRng::new(seed)),
            state: Arc::new(Mutex::new(ErrorState::default())),
        }
    }

    /// Decide whether `operation` on `address` fails.
    pub fn check_operation(
        &self,
        address: &DeviceAddress,
        operation: &'static str,
    ) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        let calls = {
            let entry = state.calls.entry(operation).or_insert(0);
            *entry += 1;
            *entry
        };

        if state.communication_lost {
            return Err(DeviceError::connection(address, "communication lost"));
        }

        for scenario in self.scenarios.iter() {
            match scenario {
                ErrorScenario::Unreachable if operation == ops::CONNECT => {
                    return Err(DeviceError::connection(
                        address,
                        "no device answering at this address",
                    ));
                }
                ErrorScenario::RejectConfiguration if operation == ops::CONFIGURE => {
                    return Err(DeviceError::configuration(
                        address,
                        "configuration payload rejected",
                    ));
                }
                ErrorScenario::FailNext { operation: op, count }
                    if *op == operation && calls <= *count =>
                {
                    return Err(DeviceError::protocol(
                        address,
                        format!("injected fault on '{}' ({} of {})", operation, calls, count),
                    ));
                }
                ErrorScenario::FailAfterN { operation: op, count }
                    if *op == operation && calls > *count =>
                {
                    return Err(DeviceError::protocol(
                        address,
                        format!("injected fault after {} '{}' calls", count, operation),
                    ));
                }
                ErrorScenario::CommunicationLoss { after }
                    if operation == ops::WAIT_FOR_FRAME && calls > *after =>
                {
                    state.communication_lost = true;
                    return Err(DeviceError::connection(address, "communication lost"));
                }
                _ => {}
            }
        }

        let rate = self
            .failure_rates
            .get(operation)
            .or_else(|| self.failure_rates.get("*"))
            .copied()
            .unwrap_or(0.0);
        if self.rng.should_fail(rate) {
            return Err(DeviceError::new(
                address,
                DeviceErrorKind::Protocol,
                format!("random fault on '{}'", operation),
            ));
        }

        Ok(())
    }

    /// Clear counters and the communication-lost latch.
    pub fn reset(&self) {
        *self.state.lock() = ErrorState::default();
    }
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self::none()
    }
}
