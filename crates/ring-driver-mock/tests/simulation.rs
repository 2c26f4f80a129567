//! Integration tests for the simulated bench.

use std::time::{Duration, Instant};

use ring_core::{
    CameraDriver, ConfigurationTemplate, DeviceAddress, DeviceErrorKind, FrameResult, TriggerMode,
};
use ring_driver_mock::*;

fn addr(s: &str) -> DeviceAddress {
    DeviceAddress::from(s)
}

fn configure(driver: &SimulatedDriver, address: &str, mode: TriggerMode) {
    let mut device = driver.connect(&addr(address)).unwrap();
    let app = device.active_application().unwrap();
    device
        .configure(&ConfigurationTemplate::default().derive(app, mode))
        .unwrap();
}

#[test]
fn test_configure_then_query_mode() {
    let driver = SimulatedDriver::with_cameras(["a"]);
    let modes = [
        TriggerMode::FreeRun,
        TriggerMode::Software,
        TriggerMode::PositiveEdge,
        TriggerMode::NegativeEdge,
        TriggerMode::BothEdges,
    ];
    for mode in modes {
        let mut device = driver.connect(&addr("a")).unwrap();
        let config = ConfigurationTemplate::default().derive(1, mode);
        device.configure(&config).unwrap();
        assert_eq!(device.trigger_mode().unwrap(), mode);
    }
}

#[test]
fn test_unknown_address_is_connection_error() {
    let driver = SimulatedDriver::with_cameras(["a"]);
    let err = driver.connect(&addr("b")).err().unwrap();
    assert_eq!(err.kind, DeviceErrorKind::Connection);
    assert_eq!(err.address, addr("b"));
}

#[test]
fn test_wrong_application_rejected() {
    let driver = SimulatedDriver::builder()
        .camera(CameraSpec::new("a").application(2))
        .build();
    let mut device = driver.connect(&addr("a")).unwrap();
    let err = device
        .configure(&ConfigurationTemplate::default().derive(1, TriggerMode::Software))
        .unwrap_err();
    assert_eq!(err.kind, DeviceErrorKind::Configuration);
}

#[test]
fn test_wait_without_trigger_times_out_after_bound() {
    let driver = SimulatedDriver::with_cameras(["hw"]);
    configure(&driver, "hw", TriggerMode::PositiveEdge);
    let device = driver.connect(&addr("hw")).unwrap();
    let mut grabber = device.open_acquisition().unwrap();

    let bound = Duration::from_millis(150);
    let start = Instant::now();
    let result = grabber.wait_for_frame(bound).unwrap();
    let elapsed = start.elapsed();

    assert_eq!(result, FrameResult::Timeout);
    assert!(elapsed >= bound, "timed out early: {:?}", elapsed);
    assert!(elapsed < bound + Duration::from_millis(250), "overshot: {:?}", elapsed);
}

#[test]
fn test_software_trigger_delivers_one_frame() {
    let driver = SimulatedDriver::with_cameras(["sw"]);
    configure(&driver, "sw", TriggerMode::Software);
    let device = driver.connect(&addr("sw")).unwrap();
    let mut grabber = device.open_acquisition().unwrap();

    grabber.software_trigger().fire().unwrap();
    let frame = match grabber.wait_for_frame(Duration::from_millis(500)).unwrap() {
        FrameResult::Frame(frame) => frame,
        FrameResult::Timeout => panic!("expected a frame"),
    };
    assert_eq!(frame.sequence, 1);
    assert_eq!(frame.payload.len(), (frame.width * frame.height * 2) as usize);

    let second = grabber.wait_for_frame(Duration::from_millis(50)).unwrap();
    assert!(second.is_timeout());
}

#[test]
fn test_software_trigger_rejected_in_hardware_mode() {
    let driver = SimulatedDriver::with_cameras(["hw"]);
    configure(&driver, "hw", TriggerMode::PositiveEdge);
    let device = driver.connect(&addr("hw")).unwrap();
    let grabber = device.open_acquisition().unwrap();

    let err = grabber.software_trigger().fire().unwrap_err();
    assert_eq!(err.kind, DeviceErrorKind::Trigger);
    assert_eq!(driver.statistics(&addr("hw")).unwrap().ignored_triggers, 1);
}

#[test]
fn test_pulse_propagates_down_the_chain() {
    let driver = SimulatedDriver::with_cameras(["sw", "hw1", "hw2"]);
    configure(&driver, "sw", TriggerMode::Software);
    configure(&driver, "hw1", TriggerMode::PositiveEdge);
    configure(&driver, "hw2", TriggerMode::BothEdges);
    driver.wire(&addr("sw"), &addr("hw1")).unwrap();
    driver.wire(&addr("hw1"), &addr("hw2")).unwrap();

    let sw = driver.connect(&addr("sw")).unwrap().open_acquisition().unwrap();
    sw.software_trigger().fire().unwrap();

    let hw1 = driver.statistics(&addr("hw1")).unwrap();
    let hw2 = driver.statistics(&addr("hw2")).unwrap();
    assert_eq!(hw1.hardware_pulses, 1);
    assert_eq!(hw1.acquired, 1);
    assert_eq!(hw2.hardware_pulses, 1);
    assert_eq!(hw2.acquired, 2);
}

#[test]
fn test_software_mode_ignores_pulses() {
    let driver = SimulatedDriver::with_cameras(["a", "b"]);
    configure(&driver, "a", TriggerMode::Software);
    configure(&driver, "b", TriggerMode::Software);
    driver.wire(&addr("a"), &addr("b")).unwrap();

    let a = driver.connect(&addr("a")).unwrap().open_acquisition().unwrap();
    a.software_trigger().fire().unwrap();

    let b = driver.statistics(&addr("b")).unwrap();
    assert_eq!(b.hardware_pulses, 1);
    assert_eq!(b.ignored_triggers, 1);
    assert_eq!(b.acquired, 0);
}

#[test]
fn test_hardware_loop_rejected() {
    let driver = SimulatedDriver::with_cameras(["a", "b", "c"]);
    driver.wire(&addr("a"), &addr("b")).unwrap();
    driver.wire(&addr("b"), &addr("c")).unwrap();
    let err = driver.wire(&addr("c"), &addr("a")).unwrap_err();
    assert_eq!(err.kind, DeviceErrorKind::Configuration);
    assert!(driver.wire(&addr("a"), &addr("a")).is_err());
    assert_eq!(driver.bus().downstream(&addr("c")), Vec::<DeviceAddress>::new());
}

#[test]
fn test_buffer_overflow_counts_lost_frames() {
    let driver = SimulatedDriver::builder()
        .camera(CameraSpec::new("sw").buffer_frames(2))
        .build();
    configure(&driver, "sw", TriggerMode::Software);
    let grabber = driver.connect(&addr("sw")).unwrap().open_acquisition().unwrap();
    let trigger = grabber.software_trigger();
    for _ in 0..5 {
        trigger.fire().unwrap();
    }
    let stats = driver.statistics(&addr("sw")).unwrap();
    assert_eq!(stats.acquired, 5);
    assert_eq!(stats.lost_frames, 3);
}

#[test]
fn test_free_run_produces_frames() {
    let driver = SimulatedDriver::with_cameras(["fr"]);
    let mut device = driver.connect(&addr("fr")).unwrap();
    let mut config = ConfigurationTemplate::default().derive(1, TriggerMode::FreeRun);
    config.frame_rate_hz = 200.0;
    device.configure(&config).unwrap();
    let mut grabber = device.open_acquisition().unwrap();

    for expected in 1..=3 {
        match grabber.wait_for_frame(Duration::from_millis(200)).unwrap() {
            FrameResult::Frame(frame) => assert_eq!(frame.sequence, expected),
            FrameResult::Timeout => panic!("free-run camera timed out"),
        }
    }
}

#[test]
fn test_injected_protocol_errors_then_recovery() {
    let driver = SimulatedDriver::builder()
        .camera(CameraSpec::new("hw").errors(ErrorConfig::scenario(ErrorScenario::FailNext {
            operation: ops::WAIT_FOR_FRAME,
            count: 2,
        })))
        .build();
    configure(&driver, "hw", TriggerMode::PositiveEdge);
    let mut grabber = driver.connect(&addr("hw")).unwrap().open_acquisition().unwrap();

    for _ in 0..2 {
        let err = grabber.wait_for_frame(Duration::from_millis(10)).unwrap_err();
        assert_eq!(err.kind, DeviceErrorKind::Protocol);
    }
    assert!(grabber.wait_for_frame(Duration::from_millis(10)).unwrap().is_timeout());
}

#[test]
fn test_activity_orders_trigger_before_delivery() {
    let driver = SimulatedDriver::with_cameras(["sw"]);
    configure(&driver, "sw", TriggerMode::Software);
    let mut grabber = driver.connect(&addr("sw")).unwrap().open_acquisition().unwrap();
    grabber.software_trigger().fire().unwrap();
    grabber.wait_for_frame(Duration::from_millis(100)).unwrap();

    assert_eq!(
        driver.activity().for_device(&addr("sw")),
        vec![
            ActivityKind::SoftwareTrigger,
            ActivityKind::FrameDelivered { sequence: 1 }
        ]
    );
}
