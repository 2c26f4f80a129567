//! Ring startup and teardown.
//!
//! [`start`] brings a ring up in four steps:
//!
//! 1. connect and configure every device (software device in
//!    [`TriggerMode::Software`], hardware devices in the configured edge
//!    mode) and open one acquisition session per device. Each device is
//!    guarded on its own: a failure is logged, recorded as a
//!    [`ConfigurationFailure`] and the device gets no worker.
//! 2. assign roles over the hardware devices that started; the last one
//!    retriggers the software device.
//! 3. spawn one worker per started device.
//! 4. fire the seed software trigger.
//!
//! The returned [`RunningRing`] owns the workers. Dropping it raises the
//! shutdown signal without waiting.

use std::time::{Duration, Instant};

use ring_core::{
    CameraDriver, ConfigurationTemplate, DeviceAddress, DeviceError, DeviceResult, TriggerMode,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::callback::{FrameCallback, ReportCallback, ReportEvent, RetriggerCallback};
use crate::config::RingConfig;
use crate::error::{RingError, RingResult};
use crate::session::AcquisitionSession;
use crate::trigger::{Role, RoleAssignment, TriggerCoordinator, TriggerWiring};
use crate::worker::{AcquisitionPolicy, AcquisitionWorker, ShutdownSignal, WorkerExit, WorkerHandle};

/// A device that could not be started.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationFailure {
    /// Device that was skipped.
    pub address: DeviceAddress,
    /// First error of its start sequence.
    pub error: DeviceError,
}

/// Outcome of [`RunningRing::shutdown`].
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Workers that exited, with their exit reason.
    pub exits: Vec<(DeviceAddress, WorkerExit)>,
    /// Workers still running when the timeout expired.
    pub stragglers: Vec<DeviceAddress>,
}

impl ShutdownReport {
    /// Every worker joined in time.
    pub fn is_clean(&self) -> bool {
        self.stragglers.is_empty()
    }
}

/// A started trigger ring.
#[derive(Debug)]
pub struct RunningRing {
    software_device: DeviceAddress,
    workers: Vec<WorkerHandle>,
    roles: RoleAssignment,
    wiring: TriggerWiring,
    failures: Vec<ConfigurationFailure>,
    coordinator: TriggerCoordinator,
    shutdown: ShutdownSignal,
}

/// Configure the devices named in `config`, start one worker per device and
/// seed the ring with one software trigger.
///
/// # Errors
///
/// - [`RingError::Validation`] / [`RingError::NoHardwareDevices`] for an
///   invalid configuration
/// - [`RingError::SoftwareDeviceUnavailable`] when the software device could
///   not be started (the ring cannot be seeded)
/// - [`RingError::NoHardwareDevices`] when no hardware device started
/// - [`RingError::Spawn`] when a worker thread cannot be created
/// - [`RingError::Device`] when the seed trigger fails
pub fn start(
    driver: &dyn CameraDriver,
    config: &RingConfig,
    tap: Option<UnboundedSender<ReportEvent>>,
) -> RingResult<RunningRing> {
    config.validate()?;
    let template = config.template();
    let software_device = config.ring.software_device.clone();
    let mut failures = Vec::new();

    let software_session = guarded(
        start_device(driver, &software_device, &template, TriggerMode::Software),
        &software_device,
        &mut failures,
    );

    let mut hardware_sessions = Vec::with_capacity(config.ring.hardware_devices.len());
    for address in &config.ring.hardware_devices {
        let started = start_device(driver, address, &template, config.ring.hardware_trigger);
        if let Some(session) = guarded(started, address, &mut failures) {
            hardware_sessions.push(session);
        }
    }

    let Some(software_session) = software_session else {
        return Err(RingError::SoftwareDeviceUnavailable {
            address: software_device,
        });
    };

    let started: Vec<DeviceAddress> = hardware_sessions
        .iter()
        .map(|s| s.address().clone())
        .collect();
    let roles = RoleAssignment::new(&started)?;
    let wiring = TriggerWiring::ring(&software_device, roles.devices());
    let coordinator = TriggerCoordinator::new(software_session.trigger_handle());

    let report = match tap {
        Some(tap) => ReportCallback::with_tap(tap),
        None => ReportCallback::new(),
    };
    let shutdown = ShutdownSignal::new();
    let policy = config.policy();

    let mut ring = RunningRing {
        software_device,
        workers: Vec::with_capacity(started.len() + 1),
        roles,
        wiring,
        failures,
        coordinator,
        shutdown,
    };

    for session in hardware_sessions {
        let callback: Box<dyn FrameCallback> = match ring.roles.role_of(session.address()) {
            Some(Role::Retrigger) => Box::new(RetriggerCallback::new(
                ring.coordinator.clone(),
                report.clone(),
            )),
            _ => Box::new(report.clone()),
        };
        ring.spawn(session, callback, &policy, config.shutdown_timeout())?;
    }
    ring.spawn(
        software_session,
        Box::new(report),
        &policy,
        config.shutdown_timeout(),
    )?;

    if let Err(err) = ring.coordinator.fire_software_trigger() {
        tracing::error!(code = err.code(), error = %err, "Seed software trigger failed");
        ring.abort(config.shutdown_timeout());
        return Err(err.into());
    }

    tracing::info!(
        wiring = %ring.wiring,
        retrigger = %ring.roles.retrigger_device(),
        workers = ring.workers.len(),
        failed = ring.failures.len(),
        "Trigger ring started"
    );
    Ok(ring)
}

/// [`start`] the ring and block until every worker has terminated.
pub fn run(
    driver: &dyn CameraDriver,
    config: &RingConfig,
    tap: Option<UnboundedSender<ReportEvent>>,
) -> RingResult<Vec<(DeviceAddress, WorkerExit)>> {
    Ok(start(driver, config, tap)?.wait())
}

fn start_device(
    driver: &dyn CameraDriver,
    address: &DeviceAddress,
    template: &ConfigurationTemplate,
    mode: TriggerMode,
) -> DeviceResult<AcquisitionSession> {
    let mut device = driver.connect(address)?;
    let application = device.active_application()?;
    let config = template.derive(application, mode);
    tracing::debug!(device = %address, payload = %config.to_payload(), "Configuring device");
    device.configure(&config)?;

    let effective = device.trigger_mode()?;
    if effective != mode {
        return Err(DeviceError::configuration(
            address,
            format!("device reports trigger mode {}, expected {}", effective, mode),
        ));
    }
    tracing::info!(device = %address, application, mode = %mode, "Device configured");

    AcquisitionSession::open(device.as_ref())
}

fn guarded(
    result: DeviceResult<AcquisitionSession>,
    address: &DeviceAddress,
    failures: &mut Vec<ConfigurationFailure>,
) -> Option<AcquisitionSession> {
    match result {
        Ok(session) => Some(session),
        Err(error) => {
            tracing::error!(
                device = %address,
                code = error.code(),
                error = %error,
                "Device could not be started; it gets no worker"
            );
            failures.push(ConfigurationFailure {
                address: address.clone(),
                error,
            });
            None
        }
    }
}

impl RunningRing {
    fn spawn(
        &mut self,
        session: AcquisitionSession,
        callback: Box<dyn FrameCallback>,
        policy: &AcquisitionPolicy,
        shutdown_timeout: Duration,
    ) -> RingResult<()> {
        match AcquisitionWorker::spawn(session, callback, policy.clone(), self.shutdown.clone()) {
            Ok(handle) => {
                self.workers.push(handle);
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to spawn acquisition thread");
                self.abort(shutdown_timeout);
                Err(err.into())
            }
        }
    }

    fn abort(&mut self, timeout: Duration) {
        let report = self.shutdown_workers(timeout);
        for address in &report.stragglers {
            tracing::warn!(device = %address, "Worker did not stop during startup abort");
        }
    }

    /// Address of the seed device.
    pub fn software_device(&self) -> &DeviceAddress {
        &self.software_device
    }

    /// Workers in spawn order, software device last.
    pub fn workers(&self) -> &[WorkerHandle] {
        &self.workers
    }

    /// Worker of `address`, if that device started.
    pub fn worker(&self, address: &DeviceAddress) -> Option<&WorkerHandle> {
        self.workers.iter().find(|w| w.address() == address)
    }

    /// Roles of the started hardware devices.
    pub fn roles(&self) -> &RoleAssignment {
        &self.roles
    }

    /// Trigger edges of the running ring.
    pub fn wiring(&self) -> &TriggerWiring {
        &self.wiring
    }

    /// Devices skipped during startup.
    pub fn configuration_failures(&self) -> &[ConfigurationFailure] {
        &self.failures
    }

    /// Signal that stops every worker of this ring.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Whether every worker thread has exited.
    pub fn all_finished(&self) -> bool {
        self.workers.iter().all(WorkerHandle::is_finished)
    }

    /// Whether the retrigger worker exited without a shutdown request.
    ///
    /// Nothing fires the software device after that, so the ring is stalled
    /// even while the other workers keep waiting.
    pub fn retrigger_halted(&self) -> bool {
        !self.shutdown.is_triggered()
            && self
                .worker(self.roles.retrigger_device())
                .map_or(true, WorkerHandle::is_finished)
    }

    /// Block until every worker exits on its own or through the shutdown signal.
    pub fn wait(mut self) -> Vec<(DeviceAddress, WorkerExit)> {
        std::mem::take(&mut self.workers)
            .into_iter()
            .map(|w| (w.address().clone(), w.join()))
            .collect()
    }

    /// Raise the shutdown signal and join workers for at most `timeout`.
    ///
    /// A worker blocked in a frame wait notices the signal once its wait
    /// returns, so `timeout` should exceed the frame timeout for a clean stop.
    pub fn shutdown(mut self, timeout: Duration) -> ShutdownReport {
        let report = self.shutdown_workers(timeout);
        if report.is_clean() {
            tracing::info!(workers = report.exits.len(), "Trigger ring stopped");
        } else {
            tracing::warn!(
                stragglers = ?report.stragglers,
                "Trigger ring stopped with workers still running"
            );
        }
        report
    }

    fn shutdown_workers(&mut self, timeout: Duration) -> ShutdownReport {
        self.shutdown.trigger();
        let deadline = Instant::now() + timeout;
        let mut report = ShutdownReport::default();
        for worker in std::mem::take(&mut self.workers) {
            let address = worker.address().clone();
            match worker.join_until(deadline) {
                Ok(exit) => report.exits.push((address, exit)),
                // Dropping the handle detaches the thread
                Err(_) => report.stragglers.push(address),
            }
        }
        report
    }
}

impl Drop for RunningRing {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}
