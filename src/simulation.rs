//! Simulated bench for a ring configuration.
//!
//! Builds one simulated camera per configured address and connects the
//! frame-finished outputs the way [`TriggerWiring`] describes, so
//! [`lifecycle::start`](crate::lifecycle::start) can run without hardware.

use ring_driver_mock::{CameraSpec, SimulatedDriver, TimingConfig};

use crate::config::RingConfig;
use crate::error::RingResult;
use crate::trigger::TriggerWiring;

/// Simulated cameras for every device in `config`, already wired.
pub fn bench(config: &RingConfig, timing: TimingConfig) -> RingResult<SimulatedDriver> {
    let driver = config
        .ring
        .hardware_devices
        .iter()
        .fold(
            SimulatedDriver::builder()
                .timing(timing)
                .camera(CameraSpec::new(&config.ring.software_device)),
            |builder, address| builder.camera(CameraSpec::new(address)),
        )
        .build();
    wire_ring(&driver, config)?;
    Ok(driver)
}

/// Connect the hardware edges of the ring described by `config`.
///
/// The closing software edge is not a cable; the retrigger callback covers it.
pub fn wire_ring(driver: &SimulatedDriver, config: &RingConfig) -> RingResult<TriggerWiring> {
    let wiring = TriggerWiring::ring(&config.ring.software_device, &config.ring.hardware_devices);
    for edge in wiring.hardware_edges() {
        driver.wire(&edge.from, &edge.to)?;
    }
    Ok(wiring)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring_core::DeviceAddress;

    #[test]
    fn test_bench_wires_the_chain() {
        let config = RingConfig::default();
        let driver = bench(&config, TimingConfig::instant()).unwrap();

        let sw = &config.ring.software_device;
        let hw = &config.ring.hardware_devices;
        assert_eq!(driver.addresses().len(), 3);
        assert_eq!(driver.bus().downstream(sw), vec![hw[0].clone()]);
        assert_eq!(driver.bus().downstream(&hw[0]), vec![hw[1].clone()]);
        // The last hardware device closes the ring in software
        assert_eq!(driver.bus().downstream(&hw[1]), Vec::<DeviceAddress>::new());
    }
}
