//! Per-device acquisition workers.
//!
//! Each configured device gets one worker running on its own OS thread
//! (`acq-<address>`). The loop is:
//!
//! ```text
//!  ┌──────┐ poll_interval ┌─────────┐ frame / timeout / error ┌─────────────┐
//!  │ Idle │──────────────▶│ Waiting │────────────────────────▶│ Dispatching │──┐
//!  └──────┘               └─────────┘                         └─────────────┘  │
//!     ▲                                                                         │
//!     └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! and it leaves the loop for one of two terminal states:
//!
//! - `Stopped`: the shared [`ShutdownSignal`] was raised (checked before
//!   every wait)
//! - `Halted`: `max_consecutive_failures` device errors in a row
//!
//! Workers share nothing per frame. The only cross-device interaction is the
//! trigger mechanism of the devices themselves.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use ring_core::{DeviceAddress, DeviceError, DeviceErrorKind};

use crate::callback::FrameCallback;
use crate::session::AcquisitionSession;

/// Position of a worker in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WorkerState {
    /// Sleeping before the next wait.
    Idle = 0,
    /// Blocked in a frame wait.
    Waiting = 1,
    /// Running the callback.
    Dispatching = 2,
    /// Too many consecutive device errors.
    Halted = 3,
    /// Shutdown requested.
    Stopped = 4,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Waiting,
            2 => WorkerState::Dispatching,
            3 => WorkerState::Halted,
            _ => WorkerState::Stopped,
        }
    }

    /// The worker loop has ended.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Halted | WorkerState::Stopped)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            WorkerState::Idle => "idle",
            WorkerState::Waiting => "waiting",
            WorkerState::Dispatching => "dispatching",
            WorkerState::Halted => "halted",
            WorkerState::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Timing and failure handling of the worker loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionPolicy {
    /// Sleep before every frame wait.
    pub poll_interval: Duration,
    /// Upper bound of one frame wait.
    pub frame_timeout: Duration,
    /// Consecutive device errors that halt the worker.
    pub max_consecutive_failures: u32,
    /// Extra sleep after a timeout.
    pub timeout_backoff: Duration,
}

impl Default for AcquisitionPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            frame_timeout: Duration::from_secs(10),
            max_consecutive_failures: 3,
            timeout_backoff: Duration::ZERO,
        }
    }
}

/// Stop request shared by every worker of a ring.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    /// Unraised signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every worker holding this signal to stop after its current wait.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters of one worker, readable from any thread.
#[derive(Debug, Default)]
pub struct WorkerStats {
    frames: AtomicU64,
    timeouts: AtomicU64,
    errors: AtomicU64,
    consecutive_failures: AtomicU32,
}

/// Point-in-time copy of [`WorkerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStatsSnapshot {
    /// Frames delivered.
    pub frames: u64,
    /// Waits that ended without a frame.
    pub timeouts: u64,
    /// Failed waits.
    pub errors: u64,
    /// Failed waits since the last successful one.
    pub consecutive_failures: u32,
}

impl WorkerStats {
    /// Read all counters.
    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
        }
    }
}

/// Why a worker thread ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerExit {
    /// Left the loop on shutdown.
    Stopped,
    /// Carries the last device error.
    Halted(DeviceError),
}

#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    stats: WorkerStats,
}

impl Shared {
    fn set(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Spawns acquisition loops.
pub struct AcquisitionWorker {
    address: DeviceAddress,
    session: AcquisitionSession,
    callback: Box<dyn FrameCallback>,
    policy: AcquisitionPolicy,
    shutdown: ShutdownSignal,
    shared: Arc<Shared>,
}

impl AcquisitionWorker {
    /// Move `session` and `callback` onto a new thread and start looping.
    pub fn spawn(
        session: AcquisitionSession,
        callback: Box<dyn FrameCallback>,
        policy: AcquisitionPolicy,
        shutdown: ShutdownSignal,
    ) -> std::io::Result<WorkerHandle> {
        let address = session.address().clone();
        let shared = Arc::new(Shared {
            state: AtomicU8::new(WorkerState::Idle as u8),
            stats: WorkerStats::default(),
        });
        let worker = AcquisitionWorker {
            address: address.clone(),
            session,
            callback,
            policy,
            shutdown,
            shared: shared.clone(),
        };

        let thread = thread::Builder::new()
            .name(format!("acq-{}", address))
            .spawn(move || worker.run())?;

        Ok(WorkerHandle {
            address,
            shared,
            thread: Some(thread),
        })
    }

    fn run(mut self) -> WorkerExit {
        let span = tracing::info_span!("acquisition", device = %self.address);
        let _enter = span.enter();
        tracing::debug!(
            frame_timeout_ms = self.policy.frame_timeout.as_millis() as u64,
            "Acquisition loop started"
        );

        let mut failures: u32 = 0;
        loop {
            if self.shutdown.is_triggered() {
                return self.stop();
            }

            self.shared.set(WorkerState::Idle);
            thread::sleep(self.policy.poll_interval);
            if self.shutdown.is_triggered() {
                return self.stop();
            }

            self.shared.set(WorkerState::Waiting);
            let outcome = self.session.wait_for_frame(self.policy.frame_timeout);

            self.shared.set(WorkerState::Dispatching);
            let stats = &self.shared.stats;
            match outcome {
                Ok(result) => {
                    failures = 0;
                    stats.consecutive_failures.store(0, Ordering::Relaxed);
                    let timed_out = result.is_timeout();
                    if timed_out {
                        stats.timeouts.fetch_add(1, Ordering::Relaxed);
                    } else {
                        stats.frames.fetch_add(1, Ordering::Relaxed);
                    }
                    self.callback.on_result(&self.address, &result);
                    if timed_out && !self.policy.timeout_backoff.is_zero() {
                        thread::sleep(self.policy.timeout_backoff);
                    }
                }
                Err(err) => {
                    failures += 1;
                    stats.errors.fetch_add(1, Ordering::Relaxed);
                    stats.consecutive_failures.store(failures, Ordering::Relaxed);
                    self.callback.on_error(&self.address, &err);
                    if failures >= self.policy.max_consecutive_failures {
                        tracing::error!(
                            code = err.code(),
                            failures,
                            "Halting acquisition after consecutive device errors"
                        );
                        self.shared.set(WorkerState::Halted);
                        return WorkerExit::Halted(err);
                    }
                }
            }
        }
    }

    fn stop(&self) -> WorkerExit {
        tracing::debug!("Acquisition loop stopped");
        self.shared.set(WorkerState::Stopped);
        WorkerExit::Stopped
    }
}

/// Owner-side view of a running worker.
#[derive(Debug)]
pub struct WorkerHandle {
    address: DeviceAddress,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<WorkerExit>>,
}

impl WorkerHandle {
    /// Device this worker acquires from.
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Current loop position.
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Current counters.
    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Whether the thread has exited (or was already joined).
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Block until the thread exits.
    pub fn join(mut self) -> WorkerExit {
        self.join_inner()
    }

    /// Join if the thread exits before `deadline`; otherwise give the handle back.
    pub fn join_until(mut self, deadline: Instant) -> Result<WorkerExit, WorkerHandle> {
        while !self.is_finished() {
            if Instant::now() >= deadline {
                return Err(self);
            }
            thread::sleep(Duration::from_millis(5));
        }
        Ok(self.join_inner())
    }

    fn join_inner(&mut self) -> WorkerExit {
        let Some(thread) = self.thread.take() else {
            return WorkerExit::Stopped;
        };
        thread.join().unwrap_or_else(|_| {
            self.shared.set(WorkerState::Halted);
            WorkerExit::Halted(DeviceError::new(
                &self.address,
                DeviceErrorKind::Unknown,
                "acquisition thread panicked",
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::ReportCallback;
    use ring_core::{CameraDriver, ConfigurationTemplate, TriggerMode};
    use ring_driver_mock::{ops, CameraSpec, ErrorConfig, ErrorScenario, SimulatedDriver};

    fn policy(frame_timeout_ms: u64) -> AcquisitionPolicy {
        AcquisitionPolicy {
            frame_timeout: Duration::from_millis(frame_timeout_ms),
            ..Default::default()
        }
    }

    fn hardware_session(driver: &SimulatedDriver, address: &str) -> AcquisitionSession {
        let mut device = driver.connect(&address.into()).unwrap();
        device
            .configure(&ConfigurationTemplate::default().derive(1, TriggerMode::PositiveEdge))
            .unwrap();
        AcquisitionSession::open(device.as_ref()).unwrap()
    }

    fn failing_driver(count: u32) -> SimulatedDriver {
        SimulatedDriver::builder()
            .camera(CameraSpec::new("hw1").errors(ErrorConfig::scenario(
                ErrorScenario::FailNext {
                    operation: ops::WAIT_FOR_FRAME,
                    count,
                },
            )))
            .build()
    }

    #[test]
    fn test_worker_halts_after_consecutive_errors() {
        let driver = failing_driver(10);
        let handle = AcquisitionWorker::spawn(
            hardware_session(&driver, "hw1"),
            Box::new(ReportCallback::new()),
            policy(50),
            ShutdownSignal::new(),
        )
        .unwrap();

        let exit = handle.join_until(Instant::now() + Duration::from_secs(5));
        let exit = exit.map_err(|_| "worker did not halt").unwrap();
        match exit {
            WorkerExit::Halted(err) => {
                assert_eq!(err.kind, DeviceErrorKind::Protocol);
                assert_eq!(err.address.as_str(), "hw1");
            }
            WorkerExit::Stopped => panic!("expected a halt"),
        }
    }

    #[test]
    fn test_halted_state_and_stats() {
        let driver = failing_driver(10);
        let handle = AcquisitionWorker::spawn(
            hardware_session(&driver, "hw1"),
            Box::new(ReportCallback::new()),
            policy(50),
            ShutdownSignal::new(),
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(handle.state(), WorkerState::Halted);
        let stats = handle.stats();
        assert_eq!(stats.errors, 3);
        assert_eq!(stats.consecutive_failures, 3);
        assert_eq!(stats.frames, 0);
    }

    #[test]
    fn test_success_resets_failure_counter() {
        // Two errors, then plain timeouts: below the threshold of three
        let driver = failing_driver(2);
        let shutdown = ShutdownSignal::new();
        let handle = AcquisitionWorker::spawn(
            hardware_session(&driver, "hw1"),
            Box::new(ReportCallback::new()),
            policy(10),
            shutdown.clone(),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(150));
        assert!(!handle.is_finished());
        let stats = handle.stats();
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.consecutive_failures, 0);
        assert!(stats.timeouts >= 1);

        shutdown.trigger();
        assert_eq!(handle.join(), WorkerExit::Stopped);
    }

    #[test]
    fn test_timeouts_keep_worker_running_until_shutdown() {
        let driver = SimulatedDriver::with_cameras(["hw1"]);
        let shutdown = ShutdownSignal::new();
        let handle = AcquisitionWorker::spawn(
            hardware_session(&driver, "hw1"),
            Box::new(ReportCallback::new()),
            policy(10),
            shutdown.clone(),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(100));
        assert!(!handle.state().is_terminal());
        assert!(handle.stats().timeouts >= 2);

        shutdown.trigger();
        let exit = handle
            .join_until(Instant::now() + Duration::from_secs(2))
            .map_err(|_| "worker ignored shutdown")
            .unwrap();
        assert_eq!(exit, WorkerExit::Stopped);
    }

    #[test]
    fn test_join_until_returns_handle_on_deadline() {
        let driver = SimulatedDriver::with_cameras(["hw1"]);
        let shutdown = ShutdownSignal::new();
        let handle = AcquisitionWorker::spawn(
            hardware_session(&driver, "hw1"),
            Box::new(ReportCallback::new()),
            policy(1000),
            shutdown.clone(),
        )
        .unwrap();

        let handle = match handle.join_until(Instant::now() + Duration::from_millis(20)) {
            Ok(_) => panic!("worker exited without a shutdown"),
            Err(handle) => handle,
        };
        assert_eq!(handle.address().as_str(), "hw1");

        shutdown.trigger();
        assert_eq!(handle.join(), WorkerExit::Stopped);
    }

    #[test]
    fn test_worker_thread_is_named_after_device() {
        let driver = SimulatedDriver::with_cameras(["10.0.0.9"]);
        let shutdown = ShutdownSignal::new();
        let handle = AcquisitionWorker::spawn(
            hardware_session(&driver, "10.0.0.9"),
            Box::new(ReportCallback::new()),
            policy(10),
            shutdown.clone(),
        )
        .unwrap();

        let name = handle
            .thread
            .as_ref()
            .and_then(|t| t.thread().name().map(str::to_owned));
        assert_eq!(name.as_deref(), Some("acq-10.0.0.9"));

        shutdown.trigger();
        assert_eq!(handle.join(), WorkerExit::Stopped);
    }
}
