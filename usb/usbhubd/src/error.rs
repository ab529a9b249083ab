use thiserror::Error;
use usbh_interface::XferError;

use crate::HubState;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("interface class {class:#04x}/{sub_class:#04x} is not a hub")]
    NotAHub { class: u8, sub_class: u8 },

    #[error("hub protocol {0} (multiple transaction translators) is not supported")]
    MultiTt(u8),

    #[error("descriptor too short ({len} < {needed} bytes)")]
    DescriptorTooShort { len: usize, needed: usize },

    #[error("endpoint {0:#04x} is not an interrupt IN endpoint")]
    NotInterruptEndpoint(u8),

    #[error("device address {0} has no hub slot")]
    NoSlot(u8),

    #[error("hub {0} is not open")]
    NotOpen(u8),

    #[error("hub {daddr} is busy ({state:?})")]
    Busy { daddr: u8, state: HubState },

    #[error("hub {daddr} owns interface {expected}, not {got}")]
    InterfaceMismatch { daddr: u8, expected: u8, got: u8 },

    #[error("submission failed: {0}")]
    Submit(#[from] XferError),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}
