//! Ordered record of what happened on the simulated bench.
//!
//! All simulated cameras of one driver append to the same log, so the order of
//! entries is a global happens-before order: a software trigger is recorded
//! before the frame it causes is queued, and a delivery is recorded after the
//! frame left the queue.

use std::sync::Arc;

use parking_lot::Mutex;
use ring_core::DeviceAddress;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    /// A software trigger was accepted.
    SoftwareTrigger,
    /// A frame-finished pulse reached this device's trigger input.
    HardwarePulse,
    /// A frame was handed to the acquisition session.
    FrameDelivered {
        /// Sequence number of the delivered frame.
        sequence: u64,
    },
}

/// One log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    /// Camera the entry belongs to.
    pub address: DeviceAddress,
    /// What happened.
    pub kind: ActivityKind,
}

/// Shared, append-only activity log.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    entries: Arc<Mutex<Vec<Activity>>>,
}

impl ActivityLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, address: &DeviceAddress, kind: ActivityKind) {
        self.entries.lock().push(Activity {
            address: address.clone(),
            kind,
        });
    }

    /// Copy of all entries so far.
    pub fn snapshot(&self) -> Vec<Activity> {
        self.entries.lock().clone()
    }

    /// Entries for one device.
    pub fn for_device(&self, address: &DeviceAddress) -> Vec<ActivityKind> {
        self.entries
            .lock()
            .iter()
            .filter(|a| &a.address == address)
            .map(|a| a.kind)
            .collect()
    }

    /// Frames delivered by one device.
    pub fn frames_delivered(&self, address: &DeviceAddress) -> usize {
        self.for_device(address)
            .iter()
            .filter(|k| matches!(k, ActivityKind::FrameDelivered { .. }))
            .count()
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_preserves_order_and_filters() {
        let log = ActivityLog::new();
        let sw = DeviceAddress::from("sw");
        let hw = DeviceAddress::from("hw");

        log.record(&sw, ActivityKind::SoftwareTrigger);
        log.record(&hw, ActivityKind::HardwarePulse);
        log.record(&sw, ActivityKind::FrameDelivered { sequence: 1 });

        assert_eq!(
            log.for_device(&sw),
            vec![
                ActivityKind::SoftwareTrigger,
                ActivityKind::FrameDelivered { sequence: 1 }
            ]
        );
        assert_eq!(log.frames_delivered(&sw), 1);
        assert_eq!(log.frames_delivered(&hw), 0);
        assert_eq!(log.snapshot().len(), 3);

        log.clear();
        assert!(log.snapshot().is_empty());
    }
}
