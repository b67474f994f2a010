//! Abstract device transport.
//!
//! The Qoob Pro bootloader speaks a strict request/response protocol over
//! fixed 64-byte HID reports. This module defines the blocking [`Transport`]
//! trait the protocol engine drives; the concrete USB implementation lives in
//! `qoobflash-usb`, and tests substitute an in-memory device model.

use std::time::Duration;

use crate::error::Result;

/// Size of one wire transport unit (a HID report without its report id).
pub const UNIT_LEN: usize = 64;

/// Default per-exchange response timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Blocking transport carrying fixed-size units to and from one device.
///
/// The device supports no pipelining: a new unit is never sent before the
/// previous response is fully received or timed out. Both methods block the
/// calling thread. Implementations own the underlying handle exclusively and
/// release it when dropped.
pub trait Transport {
    /// Send one unit to the device.
    fn send_unit(&mut self, unit: &[u8; UNIT_LEN]) -> Result<()>;

    /// Receive one unit, failing with [`crate::Error::Timeout`] if the device
    /// does not answer within `timeout`.
    fn recv_unit(&mut self, timeout: Duration) -> Result<[u8; UNIT_LEN]>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send_unit(&mut self, unit: &[u8; UNIT_LEN]) -> Result<()> {
        (**self).send_unit(unit)
    }

    fn recv_unit(&mut self, timeout: Duration) -> Result<[u8; UNIT_LEN]> {
        (**self).recv_unit(timeout)
    }
}
