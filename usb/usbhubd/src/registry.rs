use std::time::Duration;

use log::warn;
use usbh_interface::usb::{HubFeature, HubPortFeature, HubPortStatus};

use crate::HubError;

/// Where a hub is in its request chain. Each variant names the request that is in flight.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HubState {
    /// Interface bound, waiting for SET_CONFIGURATION.
    Opened,
    GettingDescriptor,
    PoweringPort(u8),
    /// Configuration failed; the hub is never polled.
    Failed,
    /// Configured, but no status transfer could be armed.
    Idle,
    /// The status-change interrupt transfer is armed.
    Polling,
    GettingHubStatus,
    ClearingHubChange(HubFeature),
    GettingPortStatus(u8),
    ClearingPortChange(u8, HubPortFeature),
    ClearingConnectionChange(u8),
    ResettingPort(u8),
}

impl Default for HubState {
    fn default() -> Self {
        Self::Opened
    }
}

impl HubState {
    pub fn is_configured(&self) -> bool {
        !matches!(
            self,
            Self::Opened | Self::GettingDescriptor | Self::PoweringPort(_) | Self::Failed
        )
    }
}

/// The per-hub record.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HubInterface {
    pub itf_num: u8,
    /// The interrupt IN endpoint delivering status-change bitmaps.
    pub ep_in: u8,
    pub port_count: u8,
    /// Power-on to power-good time, in 2 ms units.
    pub power_on_good: u8,
    /// Status of the port currently being processed.
    pub port_status: HubPortStatus,
    pub state: HubState,
}

impl HubInterface {
    pub fn new(itf_num: u8, ep_in: u8) -> Self {
        Self {
            itf_num,
            ep_in,
            ..Self::default()
        }
    }

    pub fn settle_time(&self) -> Duration {
        Duration::from_millis(u64::from(self.power_on_good) * 2)
    }
}

/// Fixed-capacity table of hubs, keyed by device address.
///
/// Hubs get the addresses right after the ones reserved for plain devices, so the hub at
/// `device_max + 1` lives in slot 0.
#[derive(Debug)]
pub struct HubRegistry<const N: usize> {
    first_addr: u16,
    slots: [Option<HubInterface>; N],
}

impl<const N: usize> HubRegistry<N> {
    pub fn new(device_max: u8) -> Self {
        Self {
            first_addr: u16::from(device_max) + 1,
            slots: [None; N],
        }
    }

    fn index(&self, daddr: u8) -> Option<usize> {
        let index = usize::from(u16::from(daddr).checked_sub(self.first_addr)?);
        (index < N).then(|| index)
    }

    /// Whether `daddr` falls into the hub address range.
    pub fn has_slot(&self, daddr: u8) -> bool {
        self.index(daddr).is_some()
    }

    pub fn get(&self, daddr: u8) -> Option<&HubInterface> {
        self.slots[self.index(daddr)?].as_ref()
    }

    pub fn get_mut(&mut self, daddr: u8) -> Option<&mut HubInterface> {
        let index = self.index(daddr)?;
        self.slots[index].as_mut()
    }

    pub fn insert(&mut self, daddr: u8, hub: HubInterface) -> Result<(), HubError> {
        let index = self.index(daddr).ok_or(HubError::NoSlot(daddr))?;
        if self.slots[index].replace(hub).is_some() {
            warn!("hub {}: slot was still occupied", daddr);
        }
        Ok(())
    }

    pub fn remove(&mut self, daddr: u8) -> Option<HubInterface> {
        let index = self.index(daddr)?;
        self.slots[index].take()
    }

    pub fn clear(&mut self) {
        self.slots = [None; N];
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &HubInterface)> + '_ {
        let first_addr = self.first_addr;
        self.slots
            .iter()
            .enumerate()
            .filter_map(move |(i, slot)| Some(((first_addr + i as u16) as u8, slot.as_ref()?)))
    }
}
