//! End-to-end runs of the hub driver against the recording host.
use std::time::Duration;

use usbh_interface::usb::{HubDescriptor, HubPortFeature, Setup, HUB_CLASS};
use usbh_interface::{HostEvent, XferResult};
use usbhubd::mock::{HostOp, MockHost};
use usbhubd::{HubConfig, HubDriver, HubState};

const RHPORT: u8 = 0;
const HUB_ADDR: u8 = 5;
const STATUS_EP: u8 = 0x81;

const CONNECTED_AND_CHANGED: [u8; 4] = [0x01, 0x01, 0x01, 0x00];
const DISCONNECTED_AND_CHANGED: [u8; 4] = [0x00, 0x01, 0x01, 0x00];

fn hub_interface() -> [u8; 16] {
    [
        9, 4, 0, 0, 1, HUB_CLASS, 0, 0, 0, //
        7, 5, STATUS_EP, 0x03, 1, 0, 12,
    ]
}

fn mount(host: &mut MockHost, driver: &mut HubDriver, ports: u8) {
    driver.open(host, HUB_ADDR, &hub_interface()).unwrap();
    driver.set_configuration(host, HUB_ADDR, 0).unwrap();
    host.complete_control(
        driver,
        XferResult::Success,
        &[9, 0x29, ports, 0, 0, 50, 0, 0, 0],
    );
    for _ in 0..ports {
        host.complete_control(driver, XferResult::Success, &[]);
    }
}

fn mounted(ports: u8) -> (MockHost, HubDriver) {
    let config = HubConfig::from_toml("device_max = 4\nfile_level = \"off\"").unwrap();
    // only the first test to get here installs the logger
    let _ = config.setup_logging("scenarios");
    let mut host = MockHost::new(RHPORT);
    let mut driver = HubDriver::new(&config);
    mount(&mut host, &mut driver, ports);
    assert!(driver.is_mounted(HUB_ADDR));
    host.take_ops();
    (host, driver)
}

/// Runs every pending control transfer to successful completion, answering GET_STATUS with
/// `status`.
fn run_chain(host: &mut MockHost, driver: &mut HubDriver, status: [u8; 4]) {
    while let Some(setup) = host.pending_control() {
        let data: &[u8] = if setup == Setup::hub_get_status(setup.hub_port()) {
            &status
        } else {
            &[]
        };
        host.complete_control(driver, XferResult::Success, data);
    }
}

#[test]
fn mount_powers_ports_then_polls() {
    let mut host = MockHost::new(RHPORT);
    let mut driver = HubDriver::new(&HubConfig::default());
    mount(&mut host, &mut driver, 3);

    let mut expected = vec![
        HostOp::OpenEndpoint {
            daddr: HUB_ADDR,
            ep_addr: STATUS_EP,
        },
        HostOp::Control {
            daddr: HUB_ADDR,
            setup: Setup::hub_get_descriptor(HubDescriptor::REQUEST_LEN),
        },
    ];
    for port in 1..=3 {
        expected.push(HostOp::Control {
            daddr: HUB_ADDR,
            setup: Setup::hub_set_feature(port, HubPortFeature::PortPower as u16),
        });
    }
    expected.extend([
        HostOp::Claim {
            daddr: HUB_ADDR,
            ep_addr: STATUS_EP,
        },
        HostOp::Interrupt {
            daddr: HUB_ADDR,
            ep_addr: STATUS_EP,
            length: 1,
        },
        HostOp::ConfigComplete {
            daddr: HUB_ADDR,
            itf_num: 0,
            settle: Duration::from_millis(100),
        },
    ]);
    assert_eq!(host.ops, expected);
}

// Scenario A: a device appears on port 1.
#[test]
fn connect_resets_port_then_attaches() {
    let (mut host, mut driver) = mounted(2);
    host.notify_status(&mut driver, HUB_ADDR, XferResult::Success, &[0b0010])
        .unwrap()
        .unwrap();
    run_chain(&mut host, &mut driver, CONNECTED_AND_CHANGED);

    assert_eq!(
        host.controls(),
        [
            Setup::hub_get_status(1),
            Setup::hub_clear_feature(1, HubPortFeature::CPortConnection as u16),
            Setup::hub_set_feature(1, HubPortFeature::PortReset as u16),
        ]
    );
    assert_eq!(host.events(), [HostEvent::attach(RHPORT, HUB_ADDR, 1)]);
    // the event goes out before polling resumes
    assert!(matches!(
        host.ops[host.ops.len() - 3..],
        [HostOp::Event(_), HostOp::Claim { .. }, HostOp::Interrupt { .. }]
    ));
    assert!(host.is_armed(HUB_ADDR));
    assert_eq!(host.arm_count(HUB_ADDR), 1);
}

// Scenario B: the device on port 1 goes away.
#[test]
fn disconnect_removes_without_reset() {
    let (mut host, mut driver) = mounted(2);
    host.notify_status(&mut driver, HUB_ADDR, XferResult::Success, &[0b0010])
        .unwrap()
        .unwrap();
    run_chain(&mut host, &mut driver, DISCONNECTED_AND_CHANGED);

    assert_eq!(
        host.controls(),
        [
            Setup::hub_get_status(1),
            Setup::hub_clear_feature(1, HubPortFeature::CPortConnection as u16),
        ]
    );
    assert_eq!(host.events(), [HostEvent::remove(RHPORT, HUB_ADDR, 1)]);
    assert!(host.is_armed(HUB_ADDR));
    assert_eq!(host.arm_count(HUB_ADDR), 1);
}

// Scenario C: the port reset fails and is retried as the same request.
#[test]
fn failed_reset_is_resubmitted() {
    let (mut host, mut driver) = mounted(2);
    host.notify_status(&mut driver, HUB_ADDR, XferResult::Success, &[0b0010])
        .unwrap()
        .unwrap();
    host.complete_control(&mut driver, XferResult::Success, &CONNECTED_AND_CHANGED);
    host.complete_control(&mut driver, XferResult::Success, &[]);

    let reset = Setup::hub_set_feature(1, HubPortFeature::PortReset as u16);
    assert_eq!(
        host.complete_control(&mut driver, XferResult::Timeout, &[]),
        Some(reset)
    );

    assert_eq!(host.pending_control(), Some(reset));
    assert_eq!(
        host.controls()
            .iter()
            .filter(|setup| **setup == Setup::hub_get_status(1))
            .count(),
        1
    );
    assert!(!host.is_armed(HUB_ADDR));
    assert!(host.events().is_empty());

    host.complete_control(&mut driver, XferResult::Success, &[]);
    assert_eq!(host.events(), [HostEvent::attach(RHPORT, HUB_ADDR, 1)]);
    assert!(host.is_armed(HUB_ADDR));
}

// Scenario D: a zero status byte.
#[test]
fn zero_status_byte_only_rearms() {
    let (mut host, mut driver) = mounted(2);
    host.notify_status(&mut driver, HUB_ADDR, XferResult::Success, &[0])
        .unwrap()
        .unwrap();

    assert!(host.controls().is_empty());
    assert_eq!(
        host.take_ops(),
        [
            HostOp::Release {
                daddr: HUB_ADDR,
                ep_addr: STATUS_EP
            },
            HostOp::Claim {
                daddr: HUB_ADDR,
                ep_addr: STATUS_EP
            },
            HostOp::Interrupt {
                daddr: HUB_ADDR,
                ep_addr: STATUS_EP,
                length: 1
            },
        ]
    );
}

#[test]
fn leftover_port_bits_resurface_next_cycle() {
    let (mut host, mut driver) = mounted(4);

    // ports 2 and 4 both changed; only port 2 is handled this round
    host.notify_status(&mut driver, HUB_ADDR, XferResult::Success, &[0b1_0100])
        .unwrap()
        .unwrap();
    run_chain(&mut host, &mut driver, CONNECTED_AND_CHANGED);

    host.notify_status(&mut driver, HUB_ADDR, XferResult::Success, &[0b1_0000])
        .unwrap()
        .unwrap();
    run_chain(&mut host, &mut driver, DISCONNECTED_AND_CHANGED);

    assert_eq!(
        host.events(),
        [
            HostEvent::attach(RHPORT, HUB_ADDR, 2),
            HostEvent::remove(RHPORT, HUB_ADDR, 4),
        ]
    );
    assert_eq!(host.arm_count(HUB_ADDR), 2);
}

#[test]
fn never_armed_during_a_chain() {
    let (mut host, mut driver) = mounted(2);
    host.notify_status(&mut driver, HUB_ADDR, XferResult::Success, &[0b0100])
        .unwrap()
        .unwrap();

    let mut steps = 0;
    while let Some(setup) = host.pending_control() {
        assert!(!host.is_armed(HUB_ADDR));
        let data: &[u8] = if steps == 0 { &CONNECTED_AND_CHANGED } else { &[] };
        assert_eq!(
            host.complete_control(&mut driver, XferResult::Success, data),
            Some(setup)
        );
        steps += 1;
    }
    assert_eq!(steps, 3);
    assert!(host.is_armed(HUB_ADDR));
    assert_eq!(driver.hub(HUB_ADDR).unwrap().state, HubState::Polling);
}

#[test]
fn hubs_are_independent() {
    let (mut host, mut driver) = mounted(2);
    let other = HUB_ADDR + 1;
    driver.open(&mut host, other, &hub_interface()).unwrap();
    driver.set_configuration(&mut host, other, 0).unwrap();

    // the first hub's chain and the second hub's configuration are interleaved
    host.notify_status(&mut driver, HUB_ADDR, XferResult::Success, &[0b0010])
        .unwrap()
        .unwrap();
    host.complete_control(&mut driver, XferResult::Success, &[9, 0x29, 1, 0, 0, 5, 0, 0, 0]);
    host.complete_control(&mut driver, XferResult::Success, &DISCONNECTED_AND_CHANGED);
    host.complete_control(&mut driver, XferResult::Success, &[]);
    host.complete_control(&mut driver, XferResult::Success, &[]);

    assert!(driver.is_mounted(other));
    assert!(host.is_armed(other));
    assert!(host.is_armed(HUB_ADDR));
    assert_eq!(host.events(), [HostEvent::remove(RHPORT, HUB_ADDR, 1)]);
}

#[test]
fn close_then_reopen_starts_clean() {
    let (mut host, mut driver) = mounted(2);
    host.notify_status(&mut driver, HUB_ADDR, XferResult::Success, &[0b0010])
        .unwrap()
        .unwrap();
    host.complete_control(&mut driver, XferResult::Success, &CONNECTED_AND_CHANGED);
    driver.close(HUB_ADDR);
    driver.close(HUB_ADDR);

    // whatever was in flight for the old hub is dropped
    host.complete_control(&mut driver, XferResult::Success, &[]);
    assert!(host.pending_control().is_none());
    assert!(host.events().is_empty());

    driver.open(&mut host, HUB_ADDR, &hub_interface()).unwrap();
    let hub = driver.hub(HUB_ADDR).unwrap();
    assert_eq!(hub.port_count, 0);
    assert!(hub.port_status.is_empty());
    assert_eq!(hub.state, HubState::Opened);
    assert!(!driver.is_mounted(HUB_ADDR));
}
