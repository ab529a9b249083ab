use log::{debug, error, trace, warn};
use usbh_interface::usb::StatusChange;
use usbh_interface::{Dispatcher, EndpointClaim, UsbHost, XferError, XferResult};

use crate::{request, HubDriver, HubError, HubState};

impl<const N: usize> HubDriver<N> {
    /// Arms the 1-byte status-change transfer on the hub's interrupt endpoint.
    ///
    /// Only a configured hub that is not polling can be armed; anything else fails with
    /// [`HubError::Busy`]. On success the endpoint stays claimed until the transfer completes and
    /// the hub is in [`HubState::Polling`]. If the transfer cannot be queued the claim is released
    /// and the hub is left [`HubState::Idle`].
    pub fn status_xfer<H: Dispatcher + ?Sized>(
        &mut self,
        host: &mut H,
        daddr: u8,
    ) -> Result<(), HubError> {
        let state = self
            .registry
            .get(daddr)
            .map(|hub| hub.state)
            .ok_or(HubError::NotOpen(daddr))?;
        if state != HubState::Idle {
            return Err(HubError::Busy { daddr, state });
        }
        self.arm(host, daddr)
    }

    /// Arms the status transfer whatever state the hub is in. Only for the end of a chain, where
    /// nothing else is in flight for the hub.
    fn arm<H: Dispatcher + ?Sized>(&mut self, host: &mut H, daddr: u8) -> Result<(), HubError> {
        let ep_in = self
            .registry
            .get(daddr)
            .map(|hub| hub.ep_in)
            .ok_or(HubError::NotOpen(daddr))?;

        let armed = EndpointClaim::acquire(host, daddr, ep_in).and_then(|mut claim| {
            claim.dispatcher().submit_interrupt(daddr, ep_in, 1)?;
            claim.keep();
            Ok(())
        });

        match armed {
            Ok(()) => {
                trace!("hub {}: status transfer armed on {:#04x}", daddr, ep_in);
                self.set_state(daddr, HubState::Polling);
                Ok(())
            }
            // a status transfer armed before the hub was reopened is still in flight; its
            // completion serves as this one
            Err(XferError::EndpointClaimed { .. }) => {
                debug!("hub {}: status transfer already in flight", daddr);
                self.set_state(daddr, HubState::Polling);
                Ok(())
            }
            Err(err) => {
                self.set_state(daddr, HubState::Idle);
                Err(err.into())
            }
        }
    }

    /// Entry point for the completed status-change transfer. The dispatcher has already released
    /// the endpoint claim.
    ///
    /// At most one event is acted upon per notification: a hub event first, otherwise the
    /// lowest-numbered port. Whatever is left over is signalled again by the hub once polling
    /// resumes.
    ///
    /// A notification the hub is not waiting for, such as one armed before the hub was closed and
    /// reopened, is dropped with [`HubError::Busy`]. Otherwise an error means polling had to be
    /// re-armed and that failed.
    pub fn on_status_notification<H: UsbHost + ?Sized>(
        &mut self,
        host: &mut H,
        daddr: u8,
        ep_addr: u8,
        result: XferResult,
        data: &[u8],
    ) -> Result<(), HubError> {
        let (port_count, ep_in, state) = match self.registry.get(daddr) {
            Some(hub) => (hub.port_count, hub.ep_in, hub.state),
            None => {
                warn!("hub {}: status notification for closed hub", daddr);
                return Err(HubError::NotOpen(daddr));
            }
        };
        if state != HubState::Polling {
            warn!(
                "hub {}: dropping stale status notification in state {:?}",
                daddr, state
            );
            return Err(HubError::Busy { daddr, state });
        }
        if ep_addr != ep_in {
            warn!(
                "hub {}: status notification on {:#04x}, expected {:#04x}",
                daddr, ep_addr, ep_in
            );
        }
        self.set_state(daddr, HubState::Idle);

        if !result.is_success() {
            debug!(
                "hub {}: status transfer {}, re-arming",
                daddr,
                result.as_str()
            );
            return self.arm(host, daddr);
        }

        let change = StatusChange(data.first().copied().unwrap_or(0));
        debug!("hub {}: status change {}", daddr, change);

        let processed = if change.hub_event() {
            self.submit_or_log(
                daddr,
                request::get_hub_status(host, daddr),
                HubState::GettingHubStatus,
            )
        } else if let Some(port) = change.lowest_port(port_count) {
            self.submit_or_log(
                daddr,
                request::get_status(host, daddr, port),
                HubState::GettingPortStatus(port),
            )
        } else {
            // some hubs report an empty bitmap
            false
        };

        if processed {
            Ok(())
        } else {
            self.arm(host, daddr)
        }
    }

    /// Moves to `next` if the request was queued. A refused request is logged and leaves the
    /// caller to re-arm.
    pub(crate) fn submit_or_log(
        &mut self,
        daddr: u8,
        submitted: Result<(), XferError>,
        next: HubState,
    ) -> bool {
        match submitted {
            Ok(()) => {
                self.set_state(daddr, next);
                true
            }
            Err(err) => {
                warn!("hub {}: request for {:?} not queued: {}", daddr, next, err);
                false
            }
        }
    }

    /// Resumes polling at the end of a chain. Failures are logged, the hub stays idle.
    pub(crate) fn rearm<H: Dispatcher + ?Sized>(&mut self, host: &mut H, daddr: u8) {
        if let Err(err) = self.arm(host, daddr) {
            error!("hub {}: failed to re-arm status transfer: {}", daddr, err);
        }
    }
}
