//! Simulated 3D camera.
//!
//! A camera accepts triggers according to its configured [`TriggerMode`]:
//!
//! - `Software`: one acquisition per [`SoftwareTrigger::fire`]
//! - `PositiveEdge` / `NegativeEdge`: one acquisition per incoming pulse
//! - `BothEdges`: two acquisitions per incoming pulse
//! - `FreeRun`: acquisitions at the configured frame rate while a session waits
//!
//! Each acquisition is queued with the instant it finishes (trigger time plus
//! [`TimingConfig::acquisition_time`]) and, if an output line carries
//! [`OutputEvent::AcquisitionFinished`](ring_core::OutputEvent), emits a pulse on
//! the [`TriggerBus`] at that same instant. The queue holds at most
//! `buffer_frames` acquisitions; overflow drops the oldest and counts it as lost.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::{Condvar, Mutex, MutexGuard};
use ring_core::{
    CameraDevice, ConfigurationTemplate, DeviceAddress, DeviceConfiguration, DeviceError,
    DeviceResult, Frame, FrameGrabber, FrameResult, SoftwareTrigger, TriggerMode,
};

use crate::activity::{ActivityKind, ActivityLog};
use crate::bus::TriggerBus;
use crate::common::errors::ops;
use crate::common::{ErrorConfig, MockRng, TimingConfig};
use crate::pattern::amplitude_image;

/// Acquisitions a camera buffers before dropping the oldest.
pub const DEFAULT_BUFFER_FRAMES: usize = 8;

/// Per-camera counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStatistics {
    /// Acquisitions started by any trigger source.
    pub acquired: u64,
    /// Frames handed to a session.
    pub delivered: u64,
    /// Acquisitions dropped on buffer overflow.
    pub lost_frames: u64,
    /// Software triggers accepted.
    pub software_triggers: u64,
    /// Pulses seen on the trigger input.
    pub hardware_pulses: u64,
    /// Triggers that did not match the configured mode.
    pub ignored_triggers: u64,
}

/// Description of one simulated camera.
#[derive(Debug, Clone)]
pub struct CameraSpec {
    pub(crate) address: DeviceAddress,
    pub(crate) application: u32,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) errors: ErrorConfig,
    pub(crate) timing: Option<TimingConfig>,
    pub(crate) buffer_frames: usize,
}

impl CameraSpec {
    /// Default camera at `address`: application 1, no faults.
    pub fn new(address: impl Into<DeviceAddress>) -> Self {
        Self {
            address: address.into(),
            application: 1,
            width: 64,
            height: 48,
            errors: ErrorConfig::none(),
            timing: None,
            buffer_frames: DEFAULT_BUFFER_FRAMES,
        }
    }

    /// Address the camera answers at.
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Application index the camera reports as active.
    pub fn application(mut self, index: u32) -> Self {
        self.application = index;
        self
    }

    /// Fault injection for this camera.
    pub fn errors(mut self, errors: ErrorConfig) -> Self {
        self.errors = errors;
        self
    }

    /// Override the driver-wide timing for this camera.
    pub fn timing(mut self, timing: TimingConfig) -> Self {
        self.timing = Some(timing);
        self
    }

    /// Acquisitions buffered before the oldest is dropped; at least one.
    pub fn buffer_frames(mut self, frames: usize) -> Self {
        self.buffer_frames = frames.max(1);
        self
    }
}

struct CameraState {
    config: DeviceConfiguration,
    /// Finish instants of queued acquisitions, oldest first.
    queue: VecDeque<Instant>,
    next_sequence: u64,
    next_free_run: Option<Instant>,
    stats: FrameStatistics,
}

pub(crate) struct CameraCore {
    address: DeviceAddress,
    application: u32,
    width: u32,
    height: u32,
    buffer_frames: usize,
    timing: TimingConfig,
    errors: ErrorConfig,
    rng: MockRng,
    bus: Arc<TriggerBus>,
    activity: ActivityLog,
    state: Mutex<CameraState>,
    frame_ready: Condvar,
}

impl CameraCore {
    pub(crate) fn new(
        spec: CameraSpec,
        timing: TimingConfig,
        bus: Arc<TriggerBus>,
        activity: ActivityLog,
    ) -> Self {
        // Factory state: free-running with the stock imager settings.
        let config = ConfigurationTemplate::default().derive(spec.application, TriggerMode::FreeRun);
        Self {
            address: spec.address,
            application: spec.application,
            width: spec.width,
            height: spec.height,
            buffer_frames: spec.buffer_frames,
            timing: spec.timing.unwrap_or(timing),
            errors: spec.errors,
            rng: MockRng::default(),
            bus,
            activity,
            state: Mutex::new(CameraState {
                config,
                queue: VecDeque::new(),
                next_sequence: 0,
                next_free_run: None,
                stats: FrameStatistics::default(),
            }),
            frame_ready: Condvar::new(),
        }
    }

    pub(crate) fn address(&self) -> &DeviceAddress {
        &self.address
    }

    pub(crate) fn errors(&self) -> &ErrorConfig {
        &self.errors
    }

    pub(crate) fn statistics(&self) -> FrameStatistics {
        self.state.lock().stats.clone()
    }

    /// Queue `count` back-to-back acquisitions starting at `at`.
    fn enqueue(&self, state: &mut CameraState, at: Instant, count: u32) -> Vec<Instant> {
        let exposure_us = state.config.exposure_time_us;
        let mut finished = Vec::with_capacity(count as usize);
        let mut start = at;
        for _ in 0..count {
            let ready = start + self.timing.acquisition_time(exposure_us, &self.rng);
            if state.queue.len() >= self.buffer_frames {
                state.queue.pop_front();
                state.stats.lost_frames += 1;
                tracing::warn!(
                    device = %self.address,
                    lost = state.stats.lost_frames,
                    "Frame buffer overflow, dropping oldest acquisition"
                );
            }
            state.queue.push_back(ready);
            state.stats.acquired += 1;
            finished.push(ready);
            start = ready;
        }
        finished
    }

    fn emit_finished(&self, signals: bool, finished: &[Instant]) {
        if !signals {
            return;
        }
        for at in finished {
            self.bus.pulse(&self.address, *at);
        }
    }

    pub(crate) fn accept_pulse(&self, at: Instant) {
        let (signals, finished) = {
            let mut state = self.state.lock();
            state.stats.hardware_pulses += 1;
            let exposures = state.config.trigger_mode.exposures_per_pulse();
            if exposures == 0 {
                state.stats.ignored_triggers += 1;
                return;
            }
            let finished = self.enqueue(&mut state, at, exposures);
            (state.config.outputs.signals_acquisition_finished(), finished)
        };
        self.frame_ready.notify_all();
        self.emit_finished(signals, &finished);
    }

    fn fire_software(&self) -> DeviceResult<()> {
        self.errors.check_operation(&self.address, ops::SOFTWARE_TRIGGER)?;
        let (signals, finished) = {
            let mut state = self.state.lock();
            let mode = state.config.trigger_mode;
            if mode != TriggerMode::Software {
                state.stats.ignored_triggers += 1;
                return Err(DeviceError::trigger(
                    &self.address,
                    format!("software trigger rejected in {} mode", mode),
                ));
            }
            state.stats.software_triggers += 1;
            self.activity
                .record(&self.address, ActivityKind::SoftwareTrigger);
            let finished = self.enqueue(&mut state, Instant::now(), 1);
            (state.config.outputs.signals_acquisition_finished(), finished)
        };
        self.frame_ready.notify_all();
        self.emit_finished(signals, &finished);
        Ok(())
    }

    fn configure(&self, config: &DeviceConfiguration) -> DeviceResult<()> {
        self.errors.check_operation(&self.address, ops::CONFIGURE)?;
        if !(config.frame_rate_hz.is_finite() && config.frame_rate_hz > 0.0) {
            return Err(DeviceError::configuration(
                &self.address,
                format!("invalid frame rate {}", config.frame_rate_hz),
            ));
        }
        if config.exposure_time_us == 0 {
            return Err(DeviceError::configuration(&self.address, "exposure time must be positive"));
        }
        if config.active_application != self.application {
            return Err(DeviceError::configuration(
                &self.address,
                format!(
                    "application {} is not active (active: {})",
                    config.active_application, self.application
                ),
            ));
        }
        tracing::debug!(
            device = %self.address,
            payload = %config.to_payload(),
            "Simulated camera configured"
        );

        let mut state = self.state.lock();
        state.config = config.clone();
        state.queue.clear();
        state.next_free_run = None;
        Ok(())
    }

    /// Schedule the next free-run acquisition if the queue ran dry.
    fn schedule_free_run(&self, state: &mut CameraState, now: Instant) -> Option<Instant> {
        if state.config.trigger_mode != TriggerMode::FreeRun || !state.queue.is_empty() {
            return None;
        }
        let period = Duration::from_secs_f64(1.0 / state.config.frame_rate_hz);
        let due = match state.next_free_run {
            Some(t) if t > now => t,
            Some(_) => now,
            None => now + period,
        };
        state.next_free_run = Some(due + period);
        state.queue.push_back(due);
        state.stats.acquired += 1;
        Some(due)
    }

    fn wait(&self, timeout: Duration) -> DeviceResult<FrameResult> {
        self.errors.check_operation(&self.address, ops::WAIT_FOR_FRAME)?;
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            let now = Instant::now();
            if let Some(due) = self.schedule_free_run(&mut state, now) {
                let signals = state.config.outputs.signals_acquisition_finished();
                MutexGuard::unlocked(&mut state, || self.emit_finished(signals, &[due]));
                continue;
            }

            match state.queue.front().copied() {
                Some(ready) if ready <= now => {
                    state.queue.pop_front();
                    state.next_sequence += 1;
                    state.stats.delivered += 1;
                    let sequence = state.next_sequence;
                    drop(state);
                    self.activity
                        .record(&self.address, ActivityKind::FrameDelivered { sequence });
                    return Ok(FrameResult::Frame(self.make_frame(sequence)));
                }
                _ if now >= deadline => return Ok(FrameResult::Timeout),
                Some(ready) => {
                    self.frame_ready.wait_until(&mut state, ready.min(deadline));
                }
                None => {
                    self.frame_ready.wait_until(&mut state, deadline);
                }
            }
        }
    }

    fn make_frame(&self, sequence: u64) -> Frame {
        Frame {
            sequence,
            timestamp: Utc::now(),
            width: self.width,
            height: self.height,
            payload: amplitude_image(self.width, self.height, sequence),
        }
    }
}

/// Connected handle to a simulated camera.
pub struct SimulatedDevice {
    core: Arc<CameraCore>,
}

impl SimulatedDevice {
    pub(crate) fn new(core: Arc<CameraCore>) -> Self {
        Self { core }
    }
}

impl CameraDevice for SimulatedDevice {
    fn address(&self) -> &DeviceAddress {
        &self.core.address
    }

    fn active_application(&self) -> DeviceResult<u32> {
        self.core
            .errors
            .check_operation(&self.core.address, ops::ACTIVE_APPLICATION)?;
        Ok(self.core.application)
    }

    fn configure(&mut self, config: &DeviceConfiguration) -> DeviceResult<()> {
        self.core.configure(config)
    }

    fn trigger_mode(&self) -> DeviceResult<TriggerMode> {
        Ok(self.core.state.lock().config.trigger_mode)
    }

    fn open_acquisition(&self) -> DeviceResult<Box<dyn FrameGrabber>> {
        self.core
            .errors
            .check_operation(&self.core.address, ops::OPEN_ACQUISITION)?;
        Ok(Box::new(SimulatedGrabber {
            core: self.core.clone(),
        }))
    }
}

/// Frame grabber of a simulated camera.
pub struct SimulatedGrabber {
    core: Arc<CameraCore>,
}

impl FrameGrabber for SimulatedGrabber {
    fn wait_for_frame(&mut self, timeout: Duration) -> DeviceResult<FrameResult> {
        self.core.wait(timeout)
    }

    fn software_trigger(&self) -> Arc<dyn SoftwareTrigger> {
        Arc::new(SimulatedTrigger {
            core: self.core.clone(),
        })
    }
}

struct SimulatedTrigger {
    core: Arc<CameraCore>,
}

impl SoftwareTrigger for SimulatedTrigger {
    fn address(&self) -> &DeviceAddress {
        &self.core.address
    }

    fn fire(&self) -> DeviceResult<()> {
        self.core.fire_software()
    }
}
