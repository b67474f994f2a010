//! The reverse-engineered Qoob Pro wire protocol.
//!
//! No public specification exists; everything here was recovered from the
//! vendor flashing utility. Opcode values, frame layouts, and the checksum
//! function are carried as a versioned compatibility table
//! ([`ProtocolTable`]) rather than hard-coded branching, so a hardware
//! revision with different protocol facts only needs a new table.
//!
//! A command frame is `opcode + operands + checksum`; a response frame is
//! `status + length + payload + checksum`. Frames travel in fixed 64-byte
//! transport units, zero-padded after the checksum.

mod codec;
mod exchange;

pub use codec::{decode, encode, Frame};
pub use exchange::{Exchange, Phase};

use crate::device::FlashGeometry;

/// Command opcodes recovered from the vendor utility.
pub mod opcodes {
    /// Reset the device (drops the connection; dead in production firmware)
    pub const RESET: u8 = 0x01;
    /// Erase one sector
    pub const ERASE: u8 = 0x02;
    /// Program one page
    pub const WRITE: u8 = 0x03;
    /// Read back flash contents
    pub const READ: u8 = 0x04;
    /// Identification/status query
    pub const IDENT: u8 = 0x05;
    /// Acquire or release the flash bus
    pub const BUS: u8 = 0x08;
}

/// A typed device operation, the codec's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<'a> {
    /// Identification handshake
    Ident,
    /// Flash bus arbitration. The GameCube shares the bus; flash access only
    /// works while the host holds it.
    Bus { acquire: bool },
    /// Erase the given sector (sector-indexed, not byte-addressed)
    Erase { sector: u8 },
    /// Program one page at a page-aligned byte address
    Write { addr: u32, data: &'a [u8] },
    /// Read `len` bytes from a byte address
    Read { addr: u32, len: u16 },
}

impl Operation<'_> {
    /// Wire opcode for this operation
    pub fn opcode(&self) -> u8 {
        match self {
            Operation::Ident => opcodes::IDENT,
            Operation::Bus { .. } => opcodes::BUS,
            Operation::Erase { .. } => opcodes::ERASE,
            Operation::Write { .. } => opcodes::WRITE,
            Operation::Read { .. } => opcodes::READ,
        }
    }

    /// Expected response payload length in bytes
    pub fn response_payload_len(&self) -> usize {
        match self {
            Operation::Ident => 4,
            Operation::Read { len, .. } => *len as usize,
            // Bus/Erase/Write answer with a bare status
            _ => 0,
        }
    }
}

/// Frozen protocol facts for one hardware/firmware revision.
///
/// Supplied as data so revision variants can be supported by adding a table,
/// not by branching in the codec.
pub struct ProtocolTable {
    /// Short identifier for logs
    pub name: &'static str,
    /// Byte value flash reads as after an erase
    pub erase_value: u8,
    /// Frame checksum function, computed over all bytes preceding the
    /// trailing checksum byte
    pub checksum: fn(&[u8]) -> u8,
    /// Protocol versions this table is known to drive safely
    pub known_versions: &'static [u8],
    /// The only flash geometry in the known-good set for this table
    pub geometry: FlashGeometry,
}

/// Two's-complement of the 8-bit byte sum: a valid frame sums to 0 mod 256.
fn checksum_sum_complement(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(0u8, |acc, b| acc.wrapping_add(*b))
        .wrapping_neg()
}

/// Compatibility table for the Qoob Pro (2 MiB flash, bootloader protocol v1).
pub const QOOB_PRO_V1: ProtocolTable = ProtocolTable {
    name: "qoob-pro-v1",
    erase_value: 0xFF,
    checksum: checksum_sum_complement,
    known_versions: &[1],
    geometry: FlashGeometry {
        total_size: 0x20_0000,
        sector_size: 0x1_0000,
        page_size: 0x100,
    },
};
