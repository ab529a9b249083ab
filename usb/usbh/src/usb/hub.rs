//! Hub class wire types. (See USB2 Chapter 11.24)
use std::fmt;
use std::time::Duration;

use super::setup::{ReqDirection, ReqRecipient, ReqType, Setup, SetupReq};
use super::DescriptorKind;

/// bInterfaceClass / bDeviceClass of a hub.
pub const HUB_CLASS: u8 = 0x09;

/// The fixed head of the USB 2.0 hub descriptor. (See USB2 Table 11-13)
///
/// The variable-length DeviceRemovable and PortPwrCtrlMask bitmaps follow on the wire; the driver
/// has no use for them.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct HubDescriptor {
    pub length: u8,
    pub kind: u8,
    pub ports: u8,
    pub characteristics: u16,
    /// Time from power-on of a port until power is good, in 2 ms units.
    pub power_on_good: u8,
    pub current: u8,
}

unsafe impl plain::Plain for HubDescriptor {}

impl HubDescriptor {
    pub const DESCRIPTOR_KIND: u8 = DescriptorKind::Hub as u8;

    /// How many bytes GET_DESCRIPTOR asks for: the fixed head plus one byte of each bitmap, which
    /// covers hubs with up to seven ports.
    pub const REQUEST_LEN: u16 = 9;

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        plain::from_bytes::<Self>(bytes).ok().copied()
    }

    pub fn characteristics(&self) -> u16 {
        u16::from_le(self.characteristics)
    }

    pub fn power_on_good_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.power_on_good) * 2)
    }
}

/// Hub-level feature selectors. (See USB2 Table 11-17)
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum HubFeature {
    CHubLocalPower = 0,
    CHubOverCurrent = 1,
}

impl HubFeature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CHubLocalPower => "C_HUB_LOCAL_POWER",
            Self::CHubOverCurrent => "C_HUB_OVER_CURRENT",
        }
    }
}

/// Port feature selectors. (See USB2 Table 11-17)
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum HubPortFeature {
    PortConnection = 0,
    PortEnable = 1,
    PortSuspend = 2,
    PortOverCurrent = 3,
    PortReset = 4,
    PortPower = 8,
    PortLowSpeed = 9,
    CPortConnection = 16,
    CPortEnable = 17,
    CPortSuspend = 18,
    CPortOverCurrent = 19,
    CPortReset = 20,
    PortTest = 21,
    PortIndicator = 22,
}

impl HubPortFeature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PortConnection => "PORT_CONNECTION",
            Self::PortEnable => "PORT_ENABLE",
            Self::PortSuspend => "PORT_SUSPEND",
            Self::PortOverCurrent => "PORT_OVER_CURRENT",
            Self::PortReset => "PORT_RESET",
            Self::PortPower => "PORT_POWER",
            Self::PortLowSpeed => "PORT_LOW_SPEED",
            Self::CPortConnection => "PORT_CONNECTION_CHANGE",
            Self::CPortEnable => "PORT_ENABLE_CHANGE",
            Self::CPortSuspend => "PORT_SUSPEND_CHANGE",
            Self::CPortOverCurrent => "PORT_OVER_CURRENT_CHANGE",
            Self::CPortReset => "PORT_RESET_CHANGE",
            Self::PortTest => "PORT_TEST",
            Self::PortIndicator => "PORT_INDICATOR",
        }
    }
}

/// Any feature selector a SET_FEATURE or CLEAR_FEATURE can carry.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Feature {
    Hub(HubFeature),
    Port(HubPortFeature),
}

impl Feature {
    pub fn selector(self) -> u16 {
        match self {
            Self::Hub(f) => f as u16,
            Self::Port(f) => f as u16,
        }
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hub(f) => f.as_str(),
            Self::Port(f) => f.as_str(),
        }
    }
}

impl From<HubFeature> for Feature {
    fn from(f: HubFeature) -> Self {
        Self::Hub(f)
    }
}

impl From<HubPortFeature> for Feature {
    fn from(f: HubPortFeature) -> Self {
        Self::Port(f)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags::bitflags! {
    /// wHubStatus in the low half, wHubChange in the high half. (See USB2 Table 11-19, 11-20)
    #[derive(Default)]
    #[repr(transparent)]
    pub struct HubStatus: u32 {
        const LOCAL_POWER = 1 << 0;
        const OVER_CURRENT = 1 << 1;
        // bits 2-15 reserved
        const LOCAL_POWER_CHANGED = 1 << 16;
        const OVER_CURRENT_CHANGED = 1 << 17;
        // bits 18-31 reserved
    }
}

unsafe impl plain::Plain for HubStatus {}

impl HubStatus {
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        Some(Self::from_bits_truncate(read_u32_le(bytes)?))
    }

    /// The change to acknowledge first; local power takes precedence over over-current.
    pub fn pending_change(&self) -> Option<HubFeature> {
        if self.contains(Self::LOCAL_POWER_CHANGED) {
            Some(HubFeature::CHubLocalPower)
        } else if self.contains(Self::OVER_CURRENT_CHANGED) {
            Some(HubFeature::CHubOverCurrent)
        } else {
            None
        }
    }
}

bitflags::bitflags! {
    /// wPortStatus in the low half, wPortChange in the high half. (See USB2 Table 11-21, 11-22)
    #[derive(Default)]
    #[repr(transparent)]
    pub struct HubPortStatus: u32 {
        const CONNECTION = 1 << 0;
        const ENABLE = 1 << 1;
        const SUSPEND = 1 << 2;
        const OVER_CURRENT = 1 << 3;
        const RESET = 1 << 4;
        // bits 5-7 reserved
        const POWER = 1 << 8;
        const LOW_SPEED = 1 << 9;
        const HIGH_SPEED = 1 << 10;
        const TEST = 1 << 11;
        const INDICATOR = 1 << 12;
        // bits 13-15 reserved
        const CONNECTION_CHANGED = 1 << 16;
        const ENABLE_CHANGED = 1 << 17;
        const SUSPEND_CHANGED = 1 << 18;
        const OVER_CURRENT_CHANGED = 1 << 19;
        const RESET_CHANGED = 1 << 20;
        // bits 21 - 31 reserved
    }
}

unsafe impl plain::Plain for HubPortStatus {}

/// Port change bits in the order they are acknowledged, with the feature that clears each.
/// Only the first pending one is acted upon per status-change notification.
pub const PORT_CHANGE_PRIORITY: [(HubPortStatus, HubPortFeature); 5] = [
    (HubPortStatus::CONNECTION_CHANGED, HubPortFeature::CPortConnection),
    (HubPortStatus::ENABLE_CHANGED, HubPortFeature::CPortEnable),
    (HubPortStatus::SUSPEND_CHANGED, HubPortFeature::CPortSuspend),
    (HubPortStatus::OVER_CURRENT_CHANGED, HubPortFeature::CPortOverCurrent),
    (HubPortStatus::RESET_CHANGED, HubPortFeature::CPortReset),
];

impl HubPortStatus {
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        Some(Self::from_bits_truncate(read_u32_le(bytes)?))
    }

    pub fn pending_change(&self) -> Option<HubPortFeature> {
        PORT_CHANGE_PRIORITY
            .iter()
            .find(|(bit, _)| self.contains(*bit))
            .map(|&(_, feature)| feature)
    }

    pub fn is_powered(&self) -> bool {
        self.contains(Self::POWER)
    }
    pub fn is_connected(&self) -> bool {
        self.contains(Self::CONNECTION)
    }
}

fn read_u32_le(bytes: &[u8]) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(raw))
}

/// The status-change bitmap read from a hub's interrupt endpoint. Bit 0 flags a hub event, bit N
/// flags an event on port N.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StatusChange(pub u8);

impl StatusChange {
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
    pub fn hub_event(self) -> bool {
        self.0 & 1 != 0
    }
    /// The lowest-numbered port in `1..=port_count` with a pending event.
    pub fn lowest_port(self, port_count: u8) -> Option<u8> {
        (1..=port_count.min(7)).find(|&port| self.0 & (1 << port) != 0)
    }
}

impl fmt::Display for StatusChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

const fn hub_recipient(port: u8) -> ReqRecipient {
    if port == 0 {
        ReqRecipient::Device
    } else {
        ReqRecipient::Other
    }
}

/// Hub class requests. Port 0 addresses the hub itself.
impl Setup {
    pub const fn hub_get_status(port: u8) -> Self {
        Self::new(
            ReqDirection::DeviceToHost,
            ReqType::Class,
            hub_recipient(port),
            SetupReq::GetStatus,
            0,
            port as u16,
            4,
        )
    }

    pub const fn hub_set_feature(port: u8, selector: u16) -> Self {
        Self::new(
            ReqDirection::HostToDevice,
            ReqType::Class,
            hub_recipient(port),
            SetupReq::SetFeature,
            selector,
            port as u16,
            0,
        )
    }

    pub const fn hub_clear_feature(port: u8, selector: u16) -> Self {
        Self::new(
            ReqDirection::HostToDevice,
            ReqType::Class,
            hub_recipient(port),
            SetupReq::ClearFeature,
            selector,
            port as u16,
            0,
        )
    }

    pub const fn hub_get_descriptor(length: u16) -> Self {
        Self::new(
            ReqDirection::DeviceToHost,
            ReqType::Class,
            ReqRecipient::Device,
            SetupReq::GetDescriptor,
            (HubDescriptor::DESCRIPTOR_KIND as u16) << 8,
            0,
            length,
        )
    }

    /// The port a hub class request addresses.
    pub fn hub_port(&self) -> u8 {
        let index = self.index;
        index as u8
    }
}
