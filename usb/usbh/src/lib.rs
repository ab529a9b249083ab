//! USB Host Transfer Interface
//!
//! This crate describes the contract between class drivers and the rest of a host-side USB
//! stack: how a class driver submits control and interrupt transfers, how it claims non-control
//! endpoints, and how it hands attach/remove events to the host controller layer.
//!
//! The stack is cooperative and single threaded. Every operation is non-blocking: a submission
//! either queues the request (`Ok`) or fails immediately (`Err`), in which case no completion will
//! ever be delivered for it. Completed transfers are routed back to the class driver that owns the
//! device address.
//!
//! This documentation refers directly to the relevant standards:
//!
//! - USB2  - [Universal Serial Bus Specification](https://www.usb.org/document-library/usb-20-specification)
//!
pub extern crate plain;
pub extern crate smallvec;

mod driver_interface;
pub mod usb;

pub use driver_interface::*;
