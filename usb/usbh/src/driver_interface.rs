use std::time::Duration;
use std::{cmp, fmt};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::usb::{EndpointDescriptor, Setup};

/// Inline storage for transfer data. Hub class requests never move more than a hub descriptor.
pub type XferBuf = SmallVec<[u8; 16]>;

/// The outcome of a transfer, as reported by the host controller.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum XferResult {
    Success,
    Failed,
    Stalled,
    Timeout,
    /// The transfer has not completed yet.
    Invalid,
}
impl Default for XferResult {
    fn default() -> Self {
        Self::Invalid
    }
}
impl XferResult {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Stalled => "stalled",
            Self::Timeout => "timeout",
            Self::Invalid => "invalid",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum XferKind {
    /// A control transfer on the default pipe, described by its setup packet.
    Control(Setup),
    /// A bulk or interrupt transfer of the given expected length.
    Data { buflen: u32 },
}

/// A single asynchronous transfer.
///
/// Submitting a transfer moves it into the dispatcher, which owns it (and its buffer) until the
/// transfer completes. The completed request, with `result` and `actual_len` filled in and any
/// received data in `buffer`, is then handed back by value to the owning class driver.
#[derive(Clone, Debug)]
pub struct Xfer {
    pub daddr: u8,
    pub ep_addr: u8,
    pub kind: XferKind,
    pub buffer: XferBuf,
    pub actual_len: u32,
    pub result: XferResult,
    /// Opaque word carried through to the completion untouched.
    pub user_data: usize,
}

impl Xfer {
    /// Builds a control transfer on endpoint 0. IN requests get a zeroed buffer of
    /// `setup.length` bytes to receive into.
    pub fn control(daddr: u8, setup: Setup) -> Self {
        let mut buffer = XferBuf::new();
        if setup.is_device_to_host() {
            buffer.resize(usize::from({ setup.length }), 0);
        }
        Self {
            daddr,
            ep_addr: 0,
            kind: XferKind::Control(setup),
            buffer,
            actual_len: 0,
            result: XferResult::Invalid,
            user_data: 0,
        }
    }

    pub fn setup(&self) -> Option<Setup> {
        match self.kind {
            XferKind::Control(setup) => Some(setup),
            XferKind::Data { .. } => None,
        }
    }

    /// The bytes actually transferred.
    pub fn data(&self) -> &[u8] {
        let len = cmp::min(self.actual_len as usize, self.buffer.len());
        &self.buffer[..len]
    }

    /// Records the outcome of the transfer. Used by dispatchers when a transfer finishes; `data`
    /// is copied into the request buffer for IN transfers and truncated to its capacity.
    pub fn finish(&mut self, result: XferResult, data: &[u8]) {
        let len = cmp::min(data.len(), self.buffer.len());
        self.buffer[..len].copy_from_slice(&data[..len]);
        self.actual_len = len as u32;
        self.result = result;
    }
}

/// A submission that could not be queued. No completion will be delivered for it.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum XferError {
    #[error("control pipe of device {0} is busy")]
    Busy(u8),

    #[error("invalid device address {0}")]
    InvalidAddress(u8),

    #[error("endpoint {ep_addr:#04x} of device {daddr} is not open")]
    EndpointNotOpen { daddr: u8, ep_addr: u8 },

    #[error("endpoint {ep_addr:#04x} of device {daddr} is already claimed")]
    EndpointClaimed { daddr: u8, ep_addr: u8 },
}

/// The transfer dispatcher of the host stack.
///
/// Only one control transfer may be outstanding per device; a second submission for the same
/// device fails with [`XferError::Busy`]. Control completions are delivered in submission order.
///
/// When an interrupt transfer completes, the dispatcher releases the endpoint claim before
/// notifying the class driver.
pub trait Dispatcher {
    fn submit_control(&mut self, xfer: Xfer) -> Result<(), XferError>;
    fn submit_interrupt(&mut self, daddr: u8, ep_addr: u8, length: u16) -> Result<(), XferError>;
    fn claim_endpoint(&mut self, daddr: u8, ep_addr: u8) -> bool;
    fn release_endpoint(&mut self, daddr: u8, ep_addr: u8);
    fn open_endpoint(&mut self, daddr: u8, desc: &EndpointDescriptor) -> Result<(), XferError>;
}

/// The host controller layer and the enumeration pipeline above it.
pub trait HostEvents {
    /// Queues an event for the host task. Never blocks.
    fn emit_event(&mut self, event: HostEvent);

    /// The root hub port the device is (transitively) connected to.
    fn root_port_for(&self, daddr: u8) -> u8;

    /// Signals that a class driver finished configuring an interface. `settle` is the time the
    /// device asked for before its functions are usable.
    fn set_config_complete(&mut self, daddr: u8, itf_num: u8, settle: Duration);
}

pub trait UsbHost: Dispatcher + HostEvents {}
impl<T: Dispatcher + HostEvents + ?Sized> UsbHost for T {}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum HostEventKind {
    DeviceAttach,
    DeviceRemove,
}

/// A connection change on a downstream port, handed to the host controller event queue.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct HostEvent {
    pub rhport: u8,
    pub kind: HostEventKind,
    pub hub_addr: u8,
    pub hub_port: u8,
}

impl HostEvent {
    pub fn attach(rhport: u8, hub_addr: u8, hub_port: u8) -> Self {
        Self {
            rhport,
            kind: HostEventKind::DeviceAttach,
            hub_addr,
            hub_port,
        }
    }
    pub fn remove(rhport: u8, hub_addr: u8, hub_port: u8) -> Self {
        Self {
            rhport,
            kind: HostEventKind::DeviceRemove,
            hub_addr,
            hub_port,
        }
    }
}

impl fmt::Display for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            HostEventKind::DeviceAttach => "attach",
            HostEventKind::DeviceRemove => "remove",
        };
        write!(
            f,
            "{} rhport {} hub {} port {}",
            kind, self.rhport, self.hub_addr, self.hub_port
        )
    }
}

/// A claim on a non-control endpoint.
///
/// The claim is released when the guard is dropped, unless [`EndpointClaim::keep`] hands it over
/// to a transfer that was queued successfully. The dispatcher then releases it on completion.
pub struct EndpointClaim<'a, D: Dispatcher + ?Sized> {
    dispatcher: &'a mut D,
    daddr: u8,
    ep_addr: u8,
    held: bool,
}

impl<'a, D: Dispatcher + ?Sized> EndpointClaim<'a, D> {
    pub fn acquire(dispatcher: &'a mut D, daddr: u8, ep_addr: u8) -> Result<Self, XferError> {
        if !dispatcher.claim_endpoint(daddr, ep_addr) {
            return Err(XferError::EndpointClaimed { daddr, ep_addr });
        }
        Ok(Self {
            dispatcher,
            daddr,
            ep_addr,
            held: true,
        })
    }

    pub fn dispatcher(&mut self) -> &mut D {
        self.dispatcher
    }

    /// Leaves the endpoint claimed for the in-flight transfer.
    pub fn keep(mut self) {
        self.held = false;
    }
}

impl<D: Dispatcher + ?Sized> Drop for EndpointClaim<'_, D> {
    fn drop(&mut self) {
        if self.held {
            self.dispatcher.release_endpoint(self.daddr, self.ep_addr);
        }
    }
}
