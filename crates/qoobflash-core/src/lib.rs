//! qoobflash-core - Protocol engine and flash programmer for the Qoob Pro
//!
//! This crate implements the reverse-engineered USB protocol of the Qoob Pro
//! GameCube modchip and the state machine that drives its 2 MiB flash:
//! erase, write with read-back verification, read, and standalone verify.
//! It is transport-agnostic; the concrete USB HID transport lives in
//! `qoobflash-usb`, and tests drive an in-memory device model.
//!
//! # Example
//!
//! ```ignore
//! use qoobflash_core::{FlashImage, NoProgress, Programmer};
//!
//! fn flash_bios(transport: impl qoobflash_core::Transport, bios: Vec<u8>) -> qoobflash_core::Result<()> {
//!     let mut prog = Programmer::new(transport)?;
//!     let geom = prog.info().geometry;
//!     let image = FlashImage::new(0, bios);
//!     prog.erase(0..geom.sectors_spanned(image.len() as u32), &mut NoProgress)?;
//!     prog.write(&image, &mut NoProgress)?;
//!     prog.verify(&image, &mut NoProgress)
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod device;
pub mod error;
pub mod fs;
pub mod image;
pub mod programmer;
pub mod progress;
pub mod protocol;
pub mod transport;

pub use device::{DeviceInfo, FlashGeometry, QOOB_PRODUCT_ID, QOOB_VENDOR_ID};
pub use error::{Error, Result, Stage};
pub use image::FlashImage;
pub use programmer::{Programmer, RetryPolicy, DEFAULT_RETRY_BUDGET};
pub use progress::{CancelToken, NoProgress, OpKind, ProgressSink};
pub use protocol::{ProtocolTable, QOOB_PRO_V1};
pub use transport::{Transport, DEFAULT_TIMEOUT, UNIT_LEN};
