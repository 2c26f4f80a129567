//! Common infrastructure for simulated cameras.
//!
//! - **timing**: exposure/readout delays
//! - **errors**: fault injection
//! - **rng**: seeded random number generator

pub mod errors;
pub mod rng;
pub mod timing;

pub use errors::{ErrorConfig, ErrorScenario};
pub use rng::MockRng;
pub use timing::TimingConfig;
