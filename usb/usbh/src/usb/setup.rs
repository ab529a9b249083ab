/// The 8-byte setup packet that starts every control transfer. (See USB2 Table 9-2)
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Setup {
    pub kind: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

unsafe impl plain::Plain for Setup {}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReqDirection {
    HostToDevice = 0,
    DeviceToHost = 1,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReqType {
    /// Standard device requests, such as SET_ADDRESS and SET_CONFIGURATION.
    Standard = 0,

    /// Class specific requests, such as the hub class GET_STATUS.
    Class = 1,

    /// Vendor specific requests.
    Vendor = 2,

    /// Reserved
    Reserved = 3,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReqRecipient {
    Device = 0,
    Interface = 1,
    Endpoint = 2,
    Other = 3,
    // 4..=30 are reserved
    VendorSpecific = 31,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SetupReq {
    GetStatus = 0x00,
    ClearFeature = 0x01,
    SetFeature = 0x03,
    SetAddress = 0x05,
    GetDescriptor = 0x06,
    SetDescriptor = 0x07,
    GetConfiguration = 0x08,
    SetConfiguration = 0x09,
    GetInterface = 0x0A,
    SetInterface = 0x0B,
    SynchFrame = 0x0C,
}

pub const USB_SETUP_DIR_BIT: u8 = 1 << 7;
pub const USB_SETUP_DIR_SHIFT: u8 = 7;
pub const USB_SETUP_REQ_TY_SHIFT: u8 = 5;
pub const USB_SETUP_RECIPIENT_MASK: u8 = 0x1F;
pub const USB_SETUP_RECIPIENT_SHIFT: u8 = 0;

impl Setup {
    pub const fn new(
        direction: ReqDirection,
        ty: ReqType,
        recipient: ReqRecipient,
        request: SetupReq,
        value: u16,
        index: u16,
        length: u16,
    ) -> Self {
        Self {
            kind: ((direction as u8) << USB_SETUP_DIR_SHIFT)
                | ((ty as u8) << USB_SETUP_REQ_TY_SHIFT)
                | ((recipient as u8) << USB_SETUP_RECIPIENT_SHIFT),
            request: request as u8,
            value,
            index,
            length,
        }
    }

    pub fn direction(&self) -> ReqDirection {
        if self.kind & USB_SETUP_DIR_BIT == 0 {
            ReqDirection::HostToDevice
        } else {
            ReqDirection::DeviceToHost
        }
    }
    pub fn is_device_to_host(&self) -> bool {
        self.direction() == ReqDirection::DeviceToHost
    }
    pub const fn req_recipient(&self) -> u8 {
        (self.kind & USB_SETUP_RECIPIENT_MASK) >> USB_SETUP_RECIPIENT_SHIFT
    }

    /// The packet as sent on the wire.
    pub fn to_bytes(&self) -> [u8; 8] {
        let value = { self.value }.to_le_bytes();
        let index = { self.index }.to_le_bytes();
        let length = { self.length }.to_le_bytes();
        [
            self.kind, self.request, value[0], value[1], index[0], index[1], length[0], length[1],
        ]
    }
}
