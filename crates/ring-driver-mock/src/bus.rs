//! Simulated trigger lines between cameras.
//!
//! Wiring `a -> b` connects camera `a`'s frame-finished output to camera `b`'s
//! trigger input. Pulses are delivered synchronously with the instant at which
//! the upstream acquisition finishes, so downstream frames are scheduled
//! relative to it without any timer threads.
//!
//! Hardware wiring must be acyclic: a closed hardware loop would retrigger
//! itself forever. The ring is closed in software by the acquisition core.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::RwLock;
use ring_core::{DeviceAddress, DeviceError};

use crate::activity::{ActivityKind, ActivityLog};
use crate::camera::CameraCore;

/// Trigger line routing for one simulated bench.
pub struct TriggerBus {
    lines: RwLock<HashMap<DeviceAddress, Vec<DeviceAddress>>>,
    inputs: RwLock<HashMap<DeviceAddress, Weak<CameraCore>>>,
    activity: ActivityLog,
}

impl TriggerBus {
    pub(crate) fn new(activity: ActivityLog) -> Self {
        Self {
            lines: RwLock::new(HashMap::new()),
            inputs: RwLock::new(HashMap::new()),
            activity,
        }
    }

    pub(crate) fn attach(&self, camera: &Arc<CameraCore>) {
        self.inputs
            .write()
            .insert(camera.address().clone(), Arc::downgrade(camera));
    }

    /// Connect `from`'s output to `to`'s trigger input.
    pub fn wire(&self, from: &DeviceAddress, to: &DeviceAddress) -> Result<(), DeviceError> {
        {
            let inputs = self.inputs.read();
            for address in [from, to] {
                if !inputs.contains_key(address) {
                    return Err(DeviceError::connection(address, "no such simulated device"));
                }
            }
        }
        if from == to || self.reaches(to, from) {
            return Err(DeviceError::configuration(
                from,
                format!("wiring to '{}' would close a hardware trigger loop", to),
            ));
        }

        let mut lines = self.lines.write();
        let targets = lines.entry(from.clone()).or_default();
        if !targets.contains(to) {
            targets.push(to.clone());
        }
        tracing::debug!(from = %from, to = %to, "Trigger line wired");
        Ok(())
    }

    /// Devices directly fed by `from`'s output.
    pub fn downstream(&self, from: &DeviceAddress) -> Vec<DeviceAddress> {
        self.lines.read().get(from).cloned().unwrap_or_default()
    }

    fn reaches(&self, start: &DeviceAddress, goal: &DeviceAddress) -> bool {
        let lines = self.lines.read();
        let mut stack = vec![start.clone()];
        let mut seen = Vec::new();
        while let Some(node) = stack.pop() {
            if &node == goal {
                return true;
            }
            if seen.contains(&node) {
                continue;
            }
            if let Some(next) = lines.get(&node) {
                stack.extend(next.iter().cloned());
            }
            seen.push(node);
        }
        false
    }

    /// Emit a frame-finished pulse from `from`, finishing at `at`.
    pub(crate) fn pulse(&self, from: &DeviceAddress, at: Instant) {
        let targets: Vec<Arc<CameraCore>> = {
            let inputs = self.inputs.read();
            self.downstream(from)
                .iter()
                .filter_map(|t| inputs.get(t).and_then(Weak::upgrade))
                .collect()
        };
        for target in targets {
            self.activity
                .record(target.address(), ActivityKind::HardwarePulse);
            target.accept_pulse(at);
        }
    }
}
