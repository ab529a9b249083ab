//! Standard and hub-class USB wire types.
//!
//! Descriptors are `#[repr(C, packed)]` mirrors of their on-the-wire layout and are read out of
//! transfer buffers with [`plain`]. Multi-byte fields are little endian on the wire.
pub use self::endpoint::{EndpointDescriptor, EndpointTy, ENDP_ATTR_TY_MASK};
pub use self::hub::*;
pub use self::interface::InterfaceDescriptor;
pub use self::setup::{ReqDirection, ReqRecipient, ReqType, Setup, SetupReq};

/// The descriptor kinds the hub driver has to recognize. (See USB2 Table 9-5 and 11-13)
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum DescriptorKind {
    Device = 1,
    Configuration = 2,
    String = 3,
    /// An Interface Descriptor. See [InterfaceDescriptor]
    Interface = 4,
    /// An Endpoint Descriptor. See [EndpointDescriptor]
    Endpoint = 5,
    /// A USB Hub Descriptor. See [HubDescriptor]
    Hub = 0x29,
}

pub(crate) mod endpoint;
pub(crate) mod hub;
pub(crate) mod interface;
pub(crate) mod setup;
