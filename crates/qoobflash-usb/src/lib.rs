//! qoobflash-usb - USB HID transport for the Qoob Pro
//!
//! The Qoob Pro bootloader enumerates as a USB HID device (VID:03EB
//! PID:0001, an Atmel AT90USB-era id pair it shares with unrelated hardware)
//! and exchanges fixed 64-byte reports. This crate finds the chip among the
//! host's HID devices and exposes it as a [`qoobflash_core::Transport`].
//!
//! # Example
//!
//! ```no_run
//! use qoobflash_core::Programmer;
//!
//! let transport = qoobflash_usb::open()?;
//! let prog = Programmer::new(transport)?;
//! println!("flash: {} bytes", prog.info().geometry.total_size);
//! # Ok::<(), qoobflash_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod discovery;
mod transport;

pub use discovery::{enumerate, open, open_nth, Candidate};
pub use transport::HidTransport;

use qoobflash_core::Error;

/// Fold a hidapi error into the core error taxonomy.
///
/// hidapi reports everything as a message string, so classification is by
/// substring. Anything unrecognized stays an I/O error with the original
/// text preserved.
fn map_hid_error(e: hidapi::HidError) -> Error {
    let msg = e.to_string();
    let lower = msg.to_lowercase();
    if lower.contains("permission") || lower.contains("access denied") {
        Error::PermissionDenied
    } else if lower.contains("busy") || lower.contains("in use") {
        Error::Busy
    } else {
        Error::Io(msg)
    }
}
