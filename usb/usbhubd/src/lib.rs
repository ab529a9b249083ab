//! USB Hub Class Driver
//!
//! Discovers hub interfaces, powers their downstream ports and keeps an interrupt transfer armed
//! on each hub's status-change endpoint. Status changes are translated into GET_STATUS,
//! CLEAR_FEATURE and PORT_RESET requests, and finally into attach/remove events for the host
//! controller event queue.
//!
//! Nothing here blocks. Each step submits exactly one request and returns; the next step runs
//! when the dispatcher hands the completed request back through [`HubDriver::xfer_complete`] or
//! [`HubDriver::on_status_notification`]. Where a hub is in that chain is kept in its
//! [`HubState`], so a completion is dispatched on (state, result) alone.
//!
//! Per hub the chain looks like this:
//!
//! ```text
//! set_configuration -> GET_DESCRIPTOR -> SET_FEATURE(PORT_POWER) x ports -> polling
//!
//! polling -> bit 0    -> GET_STATUS(hub)  -> CLEAR_FEATURE(C_HUB_*)          -> polling
//!         -> bit N    -> GET_STATUS(port) -> CLEAR_FEATURE(C_PORT_*)         -> polling
//!                                         -> CLEAR_FEATURE(C_PORT_CONNECTION)
//!                                              -> connected: PORT_RESET -> attach -> polling
//!                                              -> otherwise: remove             -> polling
//!         -> nothing  -> polling
//! ```
use log::{debug, trace, warn};

use usbh_interface::plain;
use usbh_interface::usb::{DescriptorKind, EndpointDescriptor, InterfaceDescriptor, HUB_CLASS};
use usbh_interface::{Dispatcher, UsbHost, Xfer};

mod config;
mod configure;
mod error;
pub mod mock;
mod poller;
mod port_event;
mod registry;
pub mod request;

pub use config::HubConfig;
pub use error::HubError;
pub use registry::{HubInterface, HubRegistry, HubState};

/// How many hubs can be mounted at once by default.
pub const DEFAULT_HUB_MAX: usize = 4;

/// The hub class driver, with room for `N` concurrently mounted hubs.
pub struct HubDriver<const N: usize = DEFAULT_HUB_MAX> {
    registry: HubRegistry<N>,
}

impl<const N: usize> HubDriver<N> {
    pub fn new(config: &HubConfig) -> Self {
        Self {
            registry: HubRegistry::new(config.device_max),
        }
    }

    /// Forgets every hub.
    pub fn init(&mut self) {
        self.registry.clear();
    }

    pub fn deinit(&mut self) {
        self.registry.clear();
    }

    pub fn hub(&self, daddr: u8) -> Option<&HubInterface> {
        self.registry.get(daddr)
    }

    pub fn registry(&self) -> &HubRegistry<N> {
        &self.registry
    }

    /// Whether the hub finished configuration and its ports are being watched.
    pub fn is_mounted(&self, daddr: u8) -> bool {
        self.registry
            .get(daddr)
            .map_or(false, |hub| hub.state.is_configured())
    }

    /// Binds to a hub interface. `desc` holds the interface descriptor directly followed by the
    /// status-change endpoint descriptor.
    pub fn open<H: Dispatcher + ?Sized>(
        &mut self,
        host: &mut H,
        daddr: u8,
        desc: &[u8],
    ) -> Result<(), HubError> {
        let itf = plain::from_bytes::<InterfaceDescriptor>(desc)
            .map(|itf| *itf)
            .map_err(|_| HubError::DescriptorTooShort {
                len: desc.len(),
                needed: InterfaceDescriptor::LEN,
            })?;

        let (class, sub_class, protocol) = (itf.class, itf.sub_class, itf.protocol);
        if class != HUB_CLASS || sub_class != 0 {
            return Err(HubError::NotAHub { class, sub_class });
        }
        // only a single transaction translator is supported
        if protocol > 1 {
            return Err(HubError::MultiTt(protocol));
        }

        // the endpoint descriptor follows at bLength
        if usize::from(itf.length) < InterfaceDescriptor::LEN {
            return Err(HubError::DescriptorTooShort {
                len: usize::from(itf.length),
                needed: InterfaceDescriptor::LEN,
            });
        }
        let needed = usize::from(itf.length) + EndpointDescriptor::LEN;
        if desc.len() < needed {
            return Err(HubError::DescriptorTooShort {
                len: desc.len(),
                needed,
            });
        }

        let endp = desc
            .get(usize::from(itf.length)..)
            .and_then(|rest| plain::from_bytes::<EndpointDescriptor>(rest).ok())
            .copied()
            .ok_or(HubError::DescriptorTooShort {
                len: desc.len(),
                needed,
            })?;
        let ep_addr = endp.address;
        if endp.kind != DescriptorKind::Endpoint as u8 || !endp.is_interrupt() || !endp.is_in() {
            return Err(HubError::NotInterruptEndpoint(ep_addr));
        }

        if !self.registry.has_slot(daddr) {
            return Err(HubError::NoSlot(daddr));
        }
        host.open_endpoint(daddr, &endp)?;

        let itf_num = itf.number;
        self.registry
            .insert(daddr, HubInterface::new(itf_num, ep_addr))?;
        debug!(
            "hub {}: opened interface {}, status endpoint {:#04x}",
            daddr, itf_num, ep_addr
        );
        Ok(())
    }

    /// Unbinds a hub. Closing a hub that is not open does nothing.
    ///
    /// Completions still in flight for the hub are dropped when they arrive.
    pub fn close(&mut self, daddr: u8) {
        if let Some(hub) = self.registry.remove(daddr) {
            debug!("hub {}: closed interface {}", daddr, hub.itf_num);
        }
    }

    /// Entry point for every completed control transfer on a hub's default pipe.
    pub fn xfer_complete<H: UsbHost + ?Sized>(&mut self, host: &mut H, xfer: Xfer) {
        let daddr = xfer.daddr;
        let state = match self.registry.get(daddr) {
            Some(hub) => hub.state,
            None => {
                warn!("hub {}: dropping completion for closed hub", daddr);
                return;
            }
        };
        trace!(
            "hub {}: control transfer {} in state {:?}",
            daddr,
            xfer.result.as_str(),
            state
        );

        match state {
            HubState::GettingDescriptor => self.descriptor_complete(host, xfer),
            HubState::PoweringPort(port) => self.port_power_complete(host, xfer, port),
            HubState::GettingHubStatus => self.hub_status_complete(host, xfer),
            HubState::GettingPortStatus(port) => self.port_status_complete(host, xfer, port),
            HubState::ClearingHubChange(_) | HubState::ClearingPortChange(..) => {
                self.change_cleared(host, xfer)
            }
            HubState::ClearingConnectionChange(port) => {
                self.connection_change_cleared(host, xfer, port)
            }
            HubState::ResettingPort(port) => self.port_reset_complete(host, xfer, port),
            HubState::Opened | HubState::Idle | HubState::Polling | HubState::Failed => {
                debug!(
                    "hub {}: ignoring control completion in state {:?}",
                    daddr, state
                );
            }
        }
    }

    fn set_state(&mut self, daddr: u8, state: HubState) {
        if let Some(hub) = self.registry.get_mut(daddr) {
            trace!("hub {}: {:?} -> {:?}", daddr, hub.state, state);
            hub.state = state;
        }
    }
}
