use log::{error, info};
use usbh_interface::usb::{HubDescriptor, HubPortFeature};
use usbh_interface::{UsbHost, Xfer};

use crate::{request, HubDriver, HubError, HubState};

impl<const N: usize> HubDriver<N> {
    /// Starts configuring an opened hub: read the hub descriptor, power every port in order, then
    /// arm status polling and report the interface as configured.
    ///
    /// A failure anywhere in that sequence leaves the hub in [`HubState::Failed`]; nothing is
    /// retried here.
    pub fn set_configuration<H: UsbHost + ?Sized>(
        &mut self,
        host: &mut H,
        daddr: u8,
        itf_num: u8,
    ) -> Result<(), HubError> {
        let hub = self
            .registry
            .get_mut(daddr)
            .ok_or(HubError::NotOpen(daddr))?;
        if hub.itf_num != itf_num {
            return Err(HubError::InterfaceMismatch {
                daddr,
                expected: hub.itf_num,
                got: itf_num,
            });
        }

        request::get_hub_descriptor(host, daddr)?;
        hub.state = HubState::GettingDescriptor;
        Ok(())
    }

    pub(crate) fn descriptor_complete<H: UsbHost + ?Sized>(&mut self, host: &mut H, xfer: Xfer) {
        let daddr = xfer.daddr;
        if !xfer.result.is_success() {
            error!(
                "hub {}: failed to read hub descriptor: {}",
                daddr,
                xfer.result.as_str()
            );
            self.set_state(daddr, HubState::Failed);
            return;
        }
        let desc = match HubDescriptor::from_bytes(xfer.data()) {
            Some(desc) => desc,
            None => {
                error!(
                    "hub {}: hub descriptor too short ({} bytes)",
                    daddr,
                    xfer.data().len()
                );
                self.set_state(daddr, HubState::Failed);
                return;
            }
        };

        let port_count = desc.ports;
        if let Some(hub) = self.registry.get_mut(daddr) {
            hub.port_count = port_count;
            hub.power_on_good = desc.power_on_good;
            info!(
                "hub {}: {} ports, power on to power good {} ms",
                daddr,
                port_count,
                hub.settle_time().as_millis()
            );
        }

        if port_count == 0 {
            self.finish_configuration(host, daddr);
        } else {
            self.power_port(host, daddr, 1);
        }
    }

    pub(crate) fn port_power_complete<H: UsbHost + ?Sized>(
        &mut self,
        host: &mut H,
        xfer: Xfer,
        port: u8,
    ) {
        let daddr = xfer.daddr;
        if !xfer.result.is_success() {
            error!(
                "hub {}: failed to power port {}: {}",
                daddr,
                port,
                xfer.result.as_str()
            );
            self.set_state(daddr, HubState::Failed);
            return;
        }

        let port_count = self.registry.get(daddr).map_or(0, |hub| hub.port_count);
        if port >= port_count {
            self.finish_configuration(host, daddr);
        } else {
            self.power_port(host, daddr, port + 1);
        }
    }

    fn power_port<H: UsbHost + ?Sized>(&mut self, host: &mut H, daddr: u8, port: u8) {
        match request::set_feature(host, daddr, port, HubPortFeature::PortPower) {
            Ok(()) => self.set_state(daddr, HubState::PoweringPort(port)),
            Err(err) => {
                error!("hub {}: failed to power port {}: {}", daddr, port, err);
                self.set_state(daddr, HubState::Failed);
            }
        }
    }

    fn finish_configuration<H: UsbHost + ?Sized>(&mut self, host: &mut H, daddr: u8) {
        let (itf_num, settle) = match self.registry.get(daddr) {
            Some(hub) => (hub.itf_num, hub.settle_time()),
            None => return,
        };
        self.set_state(daddr, HubState::Idle);
        self.rearm(host, daddr);
        host.set_config_complete(daddr, itf_num, settle);
    }
}
