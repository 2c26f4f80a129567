//! Acquisition timing for simulated cameras.

use std::time::Duration;

use super::rng::MockRng;

/// How long a simulated acquisition takes after its trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// Include the configured exposure time.
    pub apply_exposure: bool,
    /// Fixed readout time after exposure, in microseconds.
    pub readout_us: u64,
    /// Upper bound of uniform random jitter added per frame, in microseconds.
    pub jitter_us: u64,
}

impl TimingConfig {
    /// Frames are ready the instant they are triggered. For unit tests.
    pub fn instant() -> Self {
        Self {
            apply_exposure: false,
            readout_us: 0,
            jitter_us: 0,
        }
    }

    /// Hardware-like timing: exposure plus ~8 ms readout with a little jitter.
    pub fn realistic() -> Self {
        Self {
            apply_exposure: true,
            readout_us: 8_000,
            jitter_us: 500,
        }
    }

    /// Time from trigger to frame-finished.
    pub fn acquisition_time(&self, exposure_us: u32, rng: &MockRng) -> Duration {
        let exposure = if self.apply_exposure {
            u64::from(exposure_us)
        } else {
            0
        };
        Duration::from_micros(exposure + self.readout_us + rng.up_to(self.jitter_us))
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::instant()
    }
}
