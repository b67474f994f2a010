//! HID report transport.

use std::time::Duration;

use hidapi::HidDevice;
use qoobflash_core::{Error, Result, Transport, UNIT_LEN};

use crate::map_hid_error;

/// A claimed Qoob Pro HID handle carrying 64-byte report units.
///
/// Owns the handle exclusively for the session; hidapi closes it on drop.
pub struct HidTransport {
    device: HidDevice,
    path: String,
}

impl HidTransport {
    pub(crate) fn new(device: HidDevice, path: String) -> Self {
        Self { device, path }
    }

    /// Platform path of the underlying HID node.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Transport for HidTransport {
    fn send_unit(&mut self, unit: &[u8; UNIT_LEN]) -> Result<()> {
        // hidapi wants the report id prepended; the Qoob uses the default
        // report 0
        let mut report = [0u8; UNIT_LEN + 1];
        report[1..].copy_from_slice(unit);
        let written = self.device.write(&report).map_err(map_hid_error)?;
        if written != report.len() {
            return Err(Error::Io(format!(
                "short HID write: {} of {} bytes",
                written,
                report.len()
            )));
        }
        Ok(())
    }

    fn recv_unit(&mut self, timeout: Duration) -> Result<[u8; UNIT_LEN]> {
        let mut unit = [0u8; UNIT_LEN];
        let millis = timeout.as_millis().min(i32::MAX as u128) as i32;
        let read = self
            .device
            .read_timeout(&mut unit, millis.max(1))
            .map_err(map_hid_error)?;
        match read {
            0 => Err(Error::Timeout),
            n if n == UNIT_LEN => Ok(unit),
            n => Err(Error::Io(format!("short HID read: {} of {} bytes", n, UNIT_LEN))),
        }
    }
}
