//! Hub class control requests.
//!
//! Each function builds one request and queues it on the hub's default pipe without waiting for
//! it. An `Err` means nothing was queued and no completion will follow; otherwise the completed
//! request comes back through [`HubDriver::xfer_complete`](crate::HubDriver::xfer_complete).
//!
//! Port 0 addresses the hub itself.
use log::debug;
use usbh_interface::usb::{Feature, HubDescriptor, HubFeature, HubPortFeature, Setup};
use usbh_interface::{Dispatcher, Xfer, XferError};

/// GET_STATUS; the 4-byte response holds the status and change words.
pub fn get_status<D: Dispatcher + ?Sized>(
    host: &mut D,
    daddr: u8,
    port: u8,
) -> Result<(), XferError> {
    debug!("hub {}: get status, port {}", daddr, port);
    host.submit_control(Xfer::control(daddr, Setup::hub_get_status(port)))
}

pub fn set_feature<D: Dispatcher + ?Sized>(
    host: &mut D,
    daddr: u8,
    port: u8,
    feature: impl Into<Feature>,
) -> Result<(), XferError> {
    let feature = feature.into();
    debug!("hub {}: set feature {}, port {}", daddr, feature, port);
    host.submit_control(Xfer::control(
        daddr,
        Setup::hub_set_feature(port, feature.selector()),
    ))
}

pub fn clear_feature<D: Dispatcher + ?Sized>(
    host: &mut D,
    daddr: u8,
    port: u8,
    feature: impl Into<Feature>,
) -> Result<(), XferError> {
    let feature = feature.into();
    debug!("hub {}: clear feature {}, port {}", daddr, feature, port);
    host.submit_control(Xfer::control(
        daddr,
        Setup::hub_clear_feature(port, feature.selector()),
    ))
}

pub fn get_hub_descriptor<D: Dispatcher + ?Sized>(
    host: &mut D,
    daddr: u8,
) -> Result<(), XferError> {
    debug!("hub {}: get hub descriptor", daddr);
    host.submit_control(Xfer::control(
        daddr,
        Setup::hub_get_descriptor(HubDescriptor::REQUEST_LEN),
    ))
}

pub fn get_hub_status<D: Dispatcher + ?Sized>(host: &mut D, daddr: u8) -> Result<(), XferError> {
    get_status(host, daddr, 0)
}

pub fn clear_hub_feature<D: Dispatcher + ?Sized>(
    host: &mut D,
    daddr: u8,
    feature: HubFeature,
) -> Result<(), XferError> {
    clear_feature(host, daddr, 0, feature)
}

pub fn port_reset<D: Dispatcher + ?Sized>(
    host: &mut D,
    daddr: u8,
    port: u8,
) -> Result<(), XferError> {
    set_feature(host, daddr, port, HubPortFeature::PortReset)
}

/// Acknowledges the end of a port reset, for the enumeration pipeline.
pub fn port_clear_reset_change<D: Dispatcher + ?Sized>(
    host: &mut D,
    daddr: u8,
    port: u8,
) -> Result<(), XferError> {
    clear_feature(host, daddr, port, HubPortFeature::CPortReset)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock::{HostOp, MockHost};
    use usbh_interface::usb::{ReqRecipient, SetupReq};

    #[test]
    fn hub_and_port_recipients() {
        let mut host = MockHost::new(0);
        get_hub_status(&mut host, 5).unwrap();
        host.take_pending();
        get_status(&mut host, 5, 2).unwrap();
        host.take_pending();

        let setups = host.controls();
        assert_eq!(setups[0].req_recipient(), ReqRecipient::Device as u8);
        assert_eq!(setups[1].req_recipient(), ReqRecipient::Other as u8);
        assert_eq!(setups[1].hub_port(), 2);
        assert_eq!({ setups[1].length }, 4);
    }

    #[test]
    fn convenience_wrappers() {
        let mut host = MockHost::new(0);
        port_reset(&mut host, 5, 3).unwrap();
        host.take_pending();
        port_clear_reset_change(&mut host, 5, 3).unwrap();
        host.take_pending();
        clear_hub_feature(&mut host, 5, HubFeature::CHubOverCurrent).unwrap();
        host.take_pending();

        assert_eq!(
            host.controls(),
            [
                Setup::hub_set_feature(3, HubPortFeature::PortReset as u16),
                Setup::hub_clear_feature(3, HubPortFeature::CPortReset as u16),
                Setup::hub_clear_feature(0, HubFeature::CHubOverCurrent as u16),
            ]
        );
        assert_eq!({ host.controls()[0].request }, SetupReq::SetFeature as u8);
    }

    #[test]
    fn busy_control_pipe_is_reported() {
        let mut host = MockHost::new(0);
        get_hub_descriptor(&mut host, 5).unwrap();
        assert_eq!(
            get_status(&mut host, 5, 1),
            Err(XferError::Busy(5))
        );
        // another device is independent
        get_status(&mut host, 6, 1).unwrap();
        assert_eq!(
            host.ops.iter().filter(|op| matches!(op, HostOp::Control { .. })).count(),
            2
        );
    }
}
