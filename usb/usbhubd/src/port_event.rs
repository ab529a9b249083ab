//! Decoding of hub and port status into change acknowledgements, port resets and attach/remove
//! events.
//!
//! Every chain started by a status notification ends by re-arming the status transfer, except a
//! failed port reset, which is retried in place first.
use log::{debug, info, warn};
use usbh_interface::usb::{HubPortFeature, HubPortStatus, HubStatus};
use usbh_interface::{HostEvent, UsbHost, Xfer, XferResult};

use crate::{request, HubDriver, HubState};

impl<const N: usize> HubDriver<N> {
    pub(crate) fn hub_status_complete<H: UsbHost + ?Sized>(&mut self, host: &mut H, xfer: Xfer) {
        let daddr = xfer.daddr;
        if !xfer.result.is_success() {
            warn!("hub {}: get hub status {}", daddr, xfer.result.as_str());
            return self.rearm(host, daddr);
        }
        let status = match HubStatus::from_le_bytes(xfer.data()) {
            Some(status) => status,
            None => {
                warn!("hub {}: short hub status ({} bytes)", daddr, xfer.actual_len);
                return self.rearm(host, daddr);
            }
        };
        debug!("hub {}: hub status {:?}", daddr, status);

        let processed = match status.pending_change() {
            Some(feature) => self.submit_or_log(
                daddr,
                request::clear_hub_feature(host, daddr, feature),
                HubState::ClearingHubChange(feature),
            ),
            None => false,
        };
        if !processed {
            self.rearm(host, daddr);
        }
    }

    pub(crate) fn port_status_complete<H: UsbHost + ?Sized>(
        &mut self,
        host: &mut H,
        xfer: Xfer,
        port: u8,
    ) {
        let daddr = xfer.daddr;
        if !xfer.result.is_success() {
            warn!(
                "hub {}: get status of port {} {}",
                daddr,
                port,
                xfer.result.as_str()
            );
            return self.rearm(host, daddr);
        }
        let status = match HubPortStatus::from_le_bytes(xfer.data()) {
            Some(status) => status,
            None => {
                warn!(
                    "hub {}: short status for port {} ({} bytes)",
                    daddr, port, xfer.actual_len
                );
                return self.rearm(host, daddr);
            }
        };
        debug!("hub {}: port {} status {:?}", daddr, port, status);
        if let Some(hub) = self.registry.get_mut(daddr) {
            hub.port_status = status;
        }

        let processed = match status.pending_change() {
            Some(HubPortFeature::CPortConnection) => self.submit_or_log(
                daddr,
                request::clear_feature(host, daddr, port, HubPortFeature::CPortConnection),
                HubState::ClearingConnectionChange(port),
            ),
            Some(feature) => self.submit_or_log(
                daddr,
                request::clear_feature(host, daddr, port, feature),
                HubState::ClearingPortChange(port, feature),
            ),
            None => false,
        };
        if !processed {
            self.rearm(host, daddr);
        }
    }

    /// End of the acknowledge-only branches.
    pub(crate) fn change_cleared<H: UsbHost + ?Sized>(&mut self, host: &mut H, xfer: Xfer) {
        if !xfer.result.is_success() {
            warn!(
                "hub {}: clear feature {}",
                xfer.daddr,
                xfer.result.as_str()
            );
        }
        self.rearm(host, xfer.daddr);
    }

    pub(crate) fn connection_change_cleared<H: UsbHost + ?Sized>(
        &mut self,
        host: &mut H,
        xfer: Xfer,
        port: u8,
    ) {
        let daddr = xfer.daddr;
        if !xfer.result.is_success() {
            warn!(
                "hub {}: clear connection change of port {} {}",
                daddr,
                port,
                xfer.result.as_str()
            );
            return self.rearm(host, daddr);
        }

        // decided on the status read before the clear, it is not fetched again
        let connected = self
            .registry
            .get(daddr)
            .map_or(false, |hub| hub.port_status.is_connected());
        if !connected {
            let rhport = host.root_port_for(daddr);
            return self.emit(host, HostEvent::remove(rhport, daddr, port));
        }

        let reset = request::port_reset(host, daddr, port);
        if !self.submit_or_log(daddr, reset, HubState::ResettingPort(port)) {
            self.rearm(host, daddr);
        }
    }

    pub(crate) fn port_reset_complete<H: UsbHost + ?Sized>(
        &mut self,
        host: &mut H,
        mut xfer: Xfer,
        port: u8,
    ) {
        let daddr = xfer.daddr;
        if xfer.result.is_success() {
            let rhport = host.root_port_for(daddr);
            return self.emit(host, HostEvent::attach(rhport, daddr, port));
        }

        warn!(
            "hub {}: reset of port {} {}, retrying",
            daddr,
            port,
            xfer.result.as_str()
        );
        xfer.result = XferResult::Invalid;
        xfer.actual_len = 0;
        if let Err(err) = host.submit_control(xfer) {
            warn!("hub {}: port {} reset not queued: {}", daddr, port, err);
            self.rearm(host, daddr);
        }
    }

    fn emit<H: UsbHost + ?Sized>(&mut self, host: &mut H, event: HostEvent) {
        info!("hub {}: {}", event.hub_addr, event);
        host.emit_event(event);
        self.rearm(host, event.hub_addr);
    }
}
