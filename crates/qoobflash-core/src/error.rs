//! Error types for qoobflash-core

use core::fmt;

use thiserror::Error;

/// Result type alias using the core error type
pub type Result<T> = core::result::Result<T, Error>;

/// The operation stage an error was raised in.
///
/// Carried by [`Error::RetryBudgetExceeded`] so a caller knows exactly which
/// command class gave up, and can resume from the reported address instead of
/// restarting the whole operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Stage {
    Identify,
    BusAcquire,
    BusRelease,
    Erase,
    BlankCheck,
    Write,
    ReadBack,
    Read,
    Verify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Identify => "identify",
            Stage::BusAcquire => "bus acquire",
            Stage::BusRelease => "bus release",
            Stage::Erase => "erase",
            Stage::BlankCheck => "blank-check",
            Stage::Write => "write",
            Stage::ReadBack => "read-back",
            Stage::Read => "read",
            Stage::Verify => "verify",
        };
        write!(f, "{}", name)
    }
}

/// Errors that can occur while talking to a Qoob Pro.
///
/// Transport-level errors (`Timeout`, `ChecksumInvalid`) are transient and
/// retried at single-command granularity by the programmer. Data-integrity
/// errors (`BlankCheckFailed`, `VerifyMismatch`) always propagate with the
/// precise location and are never silently absorbed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// No device matching the Qoob Pro vendor/product pair was found
    #[error("no Qoob Pro found (VID 03EB, PID 0001)")]
    DeviceNotFound,

    /// The device exists but the host denied raw access
    #[error("permission denied opening the device (missing udev rule?)")]
    PermissionDenied,

    /// The device or its flash bus is held by someone else
    #[error("device busy, try again later")]
    Busy,

    /// No response within the transport timeout
    #[error("timed out waiting for device response")]
    Timeout,

    /// A response frame whose trailing checksum does not match its contents
    #[error("response checksum invalid")]
    ChecksumInvalid,

    /// A structurally invalid response (wrong length for the command sent)
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(&'static str),

    /// The device identified itself, but its version/geometry is outside the
    /// known-good set this tool was built for
    #[error("unsupported device: protocol v{version}, {total_size} byte flash")]
    UnsupportedDevice { version: u8, total_size: u32 },

    /// The device rejected a command with a non-zero status code
    #[error("device reported status 0x{status:02X}")]
    Device { status: u8 },

    /// A sector still read back non-erased bytes after the erase retry budget
    #[error("sector {sector} failed blank-check after erase")]
    BlankCheckFailed { sector: u32 },

    /// Flash contents differ from the expected image
    #[error("verify mismatch at 0x{address:06X}: expected 0x{expected:02X}, found 0x{actual:02X}")]
    VerifyMismatch {
        address: u32,
        expected: u8,
        actual: u8,
    },

    /// A single command kept failing at the transport level until the retry
    /// budget ran out. `address` is where the operation stopped; everything
    /// before it is confirmed good.
    #[error("retry budget exceeded during {stage} at 0x{address:06X}")]
    RetryBudgetExceeded { stage: Stage, address: u32 },

    /// A write was requested with no bytes to write
    #[error("image is empty, nothing to write")]
    EmptyImage,

    /// Operation cancelled at a page/sector boundary
    #[error("operation cancelled")]
    Cancelled,

    /// Address not aligned to the required page/sector granularity
    #[error("address 0x{address:06X} not aligned to {required} bytes")]
    Misaligned { address: u32, required: u32 },

    /// Range extends past the end of flash
    #[error("range out of bounds: 0x{address:06X} + {len} bytes")]
    OutOfBounds { address: u32, len: usize },

    /// Host-side I/O failure in the transport
    #[error("transport I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Whether the programmer may retry the failed command.
    ///
    /// Only transport-level failures qualify; logical and integrity errors
    /// must propagate.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Timeout | Error::ChecksumInvalid)
    }
}
