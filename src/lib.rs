//! # trigger-ring
//!
//! Frame acquisition across several cameras where one camera is triggered in
//! software and the others are daisy-chained through hardware trigger lines.
//! The last camera of the hardware chain fires the software camera's next
//! trigger, closing the ring, so one seed trigger keeps every camera busy.
//!
//! ## Crate Structure
//!
//! - **`config`**: [`RingConfig`], loaded with figment from TOML and
//!   `TRIGGER_RING_*` environment variables, with explicit validation.
//! - **`error`**: [`RingError`] with stable `RING_*` codes.
//! - **`logging`**: tracing-subscriber setup (pretty, compact, JSON).
//! - **`session`**: [`AcquisitionSession`], the per-device frame wait.
//! - **`trigger`**: device roles, the [`TriggerCoordinator`] and the
//!   inspectable [`TriggerWiring`].
//! - **`callback`**: report and retrigger-then-report frame callbacks.
//! - **`worker`**: one acquisition loop per device on its own thread.
//! - **`lifecycle`**: configures devices, spawns workers, seeds the ring and
//!   shuts it down.
//! - **`simulation`**: builds a wired bench of simulated cameras.
//!
//! Device collaborators (driver, device, grabber, software trigger) are the
//! traits of [`ring_core`]; [`ring_driver_mock`] implements them in-process.

pub mod callback;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod session;
pub mod simulation;
pub mod trigger;
pub mod worker;

pub use ring_core;
pub use ring_driver_mock;

pub use callback::{FrameCallback, ReportCallback, ReportEvent, ReportKind, RetriggerCallback};
pub use config::RingConfig;
pub use error::{RingError, RingResult};
pub use lifecycle::{ConfigurationFailure, RunningRing, ShutdownReport};
pub use session::AcquisitionSession;
pub use trigger::{Role, RoleAssignment, TriggerCoordinator, TriggerWiring};
pub use worker::{
    AcquisitionPolicy, AcquisitionWorker, ShutdownSignal, WorkerExit, WorkerHandle, WorkerState,
};
