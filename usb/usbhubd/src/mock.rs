//! A recording host stack for driving the hub driver without hardware.
//!
//! Submissions are queued instead of executed; the caller decides when and how each one
//! completes. Like a real dispatcher, [`MockHost`] refuses a second control transfer for a device
//! while one is pending, and releases the status endpoint claim before delivering an interrupt
//! completion.
use std::collections::{BTreeSet, VecDeque};
use std::mem;
use std::time::Duration;

use usbh_interface::usb::{EndpointDescriptor, Setup};
use usbh_interface::{Dispatcher, HostEvent, HostEvents, Xfer, XferError, XferResult};

use crate::{HubDriver, HubError};

/// Everything the driver asked of the host, in order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HostOp {
    Control { daddr: u8, setup: Setup },
    Interrupt { daddr: u8, ep_addr: u8, length: u16 },
    Claim { daddr: u8, ep_addr: u8 },
    Release { daddr: u8, ep_addr: u8 },
    OpenEndpoint { daddr: u8, ep_addr: u8 },
    Event(HostEvent),
    ConfigComplete { daddr: u8, itf_num: u8, settle: Duration },
}

#[derive(Debug, Default)]
pub struct MockHost {
    pub ops: Vec<HostOp>,
    pub rhport: u8,
    /// Number of upcoming control submissions to refuse.
    pub refuse_control: usize,
    /// Number of upcoming interrupt submissions to refuse.
    pub refuse_interrupt: usize,
    pending: VecDeque<Xfer>,
    opened: BTreeSet<(u8, u8)>,
    claimed: BTreeSet<(u8, u8)>,
    armed: BTreeSet<(u8, u8)>,
}

impl MockHost {
    pub fn new(rhport: u8) -> Self {
        Self {
            rhport,
            ..Self::default()
        }
    }

    /// The setup packet of the oldest control transfer still pending.
    pub fn pending_control(&self) -> Option<Setup> {
        self.pending.front().and_then(Xfer::setup)
    }

    /// Drops every pending control transfer without completing it.
    pub fn take_pending(&mut self) -> Vec<Xfer> {
        self.pending.drain(..).collect()
    }

    /// Completes the oldest pending control transfer and hands it to the driver. Returns its
    /// setup packet, or `None` if nothing was pending.
    pub fn complete_control<const N: usize>(
        &mut self,
        driver: &mut HubDriver<N>,
        result: XferResult,
        data: &[u8],
    ) -> Option<Setup> {
        let mut xfer = self.pending.pop_front()?;
        let setup = xfer.setup();
        xfer.finish(result, data);
        driver.xfer_complete(self, xfer);
        setup
    }

    /// Completes the status transfer armed on `daddr` with the given bitmap. Returns `None` if no
    /// status transfer was armed.
    pub fn notify_status<const N: usize>(
        &mut self,
        driver: &mut HubDriver<N>,
        daddr: u8,
        result: XferResult,
        data: &[u8],
    ) -> Option<Result<(), HubError>> {
        let ep_addr = self.armed_endpoint(daddr)?;
        self.armed.remove(&(daddr, ep_addr));
        self.release_endpoint(daddr, ep_addr);
        Some(driver.on_status_notification(self, daddr, ep_addr, result, data))
    }

    pub fn armed_endpoint(&self, daddr: u8) -> Option<u8> {
        self.armed
            .iter()
            .find(|&&(armed, _)| armed == daddr)
            .map(|&(_, ep_addr)| ep_addr)
    }

    pub fn is_armed(&self, daddr: u8) -> bool {
        self.armed_endpoint(daddr).is_some()
    }

    pub fn is_claimed(&self, daddr: u8, ep_addr: u8) -> bool {
        self.claimed.contains(&(daddr, ep_addr))
    }

    /// How many status transfers were armed on `daddr` so far.
    pub fn arm_count(&self, daddr: u8) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, HostOp::Interrupt { daddr: d, .. } if *d == daddr))
            .count()
    }

    pub fn controls(&self) -> Vec<Setup> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                HostOp::Control { setup, .. } => Some(*setup),
                _ => None,
            })
            .collect()
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                HostOp::Event(event) => Some(*event),
                _ => None,
            })
            .collect()
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        mem::take(&mut self.ops)
    }
}

impl Dispatcher for MockHost {
    fn submit_control(&mut self, xfer: Xfer) -> Result<(), XferError> {
        let daddr = xfer.daddr;
        let setup = xfer.setup().ok_or(XferError::EndpointNotOpen {
            daddr,
            ep_addr: xfer.ep_addr,
        })?;
        if self.refuse_control > 0 {
            self.refuse_control -= 1;
            return Err(XferError::Busy(daddr));
        }
        if self.pending.iter().any(|pending| pending.daddr == daddr) {
            return Err(XferError::Busy(daddr));
        }
        self.ops.push(HostOp::Control { daddr, setup });
        self.pending.push_back(xfer);
        Ok(())
    }

    fn submit_interrupt(&mut self, daddr: u8, ep_addr: u8, length: u16) -> Result<(), XferError> {
        if !self.opened.contains(&(daddr, ep_addr)) {
            return Err(XferError::EndpointNotOpen { daddr, ep_addr });
        }
        if self.refuse_interrupt > 0 {
            self.refuse_interrupt -= 1;
            return Err(XferError::Busy(daddr));
        }
        assert!(
            self.claimed.contains(&(daddr, ep_addr)),
            "interrupt transfer on {}/{:#04x} submitted without a claim",
            daddr,
            ep_addr
        );
        assert!(
            self.armed.insert((daddr, ep_addr)),
            "interrupt transfer on {}/{:#04x} armed twice",
            daddr,
            ep_addr
        );
        self.ops.push(HostOp::Interrupt {
            daddr,
            ep_addr,
            length,
        });
        Ok(())
    }

    fn claim_endpoint(&mut self, daddr: u8, ep_addr: u8) -> bool {
        if !self.claimed.insert((daddr, ep_addr)) {
            return false;
        }
        self.ops.push(HostOp::Claim { daddr, ep_addr });
        true
    }

    fn release_endpoint(&mut self, daddr: u8, ep_addr: u8) {
        if self.claimed.remove(&(daddr, ep_addr)) {
            self.ops.push(HostOp::Release { daddr, ep_addr });
        }
    }

    fn open_endpoint(&mut self, daddr: u8, desc: &EndpointDescriptor) -> Result<(), XferError> {
        let ep_addr = desc.address;
        self.opened.insert((daddr, ep_addr));
        self.ops.push(HostOp::OpenEndpoint { daddr, ep_addr });
        Ok(())
    }
}

impl HostEvents for MockHost {
    fn emit_event(&mut self, event: HostEvent) {
        self.ops.push(HostOp::Event(event));
    }

    fn root_port_for(&self, _daddr: u8) -> u8 {
        self.rhport
    }

    fn set_config_complete(&mut self, daddr: u8, itf_num: u8, settle: Duration) {
        self.ops.push(HostOp::ConfigComplete {
            daddr,
            itf_num,
            settle,
        });
    }
}
