//! Device identity and flash geometry.

use crate::error::{Error, Result};

/// USB vendor id the Qoob Pro enumerates with (Atmel Corp.)
pub const QOOB_VENDOR_ID: u16 = 0x03EB;
/// USB product id in flashing mode (not listed in usb.ids)
pub const QOOB_PRODUCT_ID: u16 = 0x0001;

/// Flash geometry as reported by the identification handshake.
///
/// All operations derive their granularity from this: pages are the write
/// unit, sectors the erase unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashGeometry {
    /// Total flash size in bytes
    pub total_size: u32,
    /// Erase granularity
    pub sector_size: u32,
    /// Write granularity (sector_size is always a multiple of this)
    pub page_size: u32,
}

impl FlashGeometry {
    /// Number of erase sectors in flash
    pub fn sector_count(&self) -> u32 {
        self.total_size / self.sector_size
    }

    /// Pages per erase sector
    pub fn pages_per_sector(&self) -> u32 {
        self.sector_size / self.page_size
    }

    /// How many sectors a byte range starting at a sector boundary spans
    pub fn sectors_spanned(&self, len: u32) -> u32 {
        len.div_ceil(self.sector_size)
    }

    /// Check that `addr..addr+len` lies inside flash
    pub fn check_bounds(&self, addr: u32, len: usize) -> Result<()> {
        if (addr as u64) + (len as u64) > self.total_size as u64 {
            return Err(Error::OutOfBounds { address: addr, len });
        }
        Ok(())
    }

    /// Check that `addr` is page-aligned
    pub fn check_page_aligned(&self, addr: u32) -> Result<()> {
        if addr % self.page_size != 0 {
            return Err(Error::Misaligned {
                address: addr,
                required: self.page_size,
            });
        }
        Ok(())
    }

    /// Check that `addr` is sector-aligned
    pub fn check_sector_aligned(&self, addr: u32) -> Result<()> {
        if addr % self.sector_size != 0 {
            return Err(Error::Misaligned {
                address: addr,
                required: self.sector_size,
            });
        }
        Ok(())
    }
}

/// Everything learned from the identification handshake.
///
/// Queried once per session, before any erase/write/read, and cached
/// read-only thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    /// USB vendor id the device enumerated with
    pub vendor_id: u16,
    /// USB product id the device enumerated with
    pub product_id: u16,
    /// Bootloader protocol version
    pub protocol_version: u8,
    /// Flash geometry the device reported
    pub geometry: FlashGeometry,
}

/// Parse the identification response payload into [`DeviceInfo`].
///
/// The payload carries the protocol version and the geometry as power-of-two
/// exponents: `[version, log2(total), log2(sector), log2(page)]`. Geometry or
/// version outside the table's known-good set is `UnsupportedDevice`.
pub fn parse_ident_payload(
    payload: &[u8],
    table: &crate::protocol::ProtocolTable,
) -> Result<DeviceInfo> {
    if payload.len() != 4 {
        return Err(Error::ProtocolMismatch("identify payload length"));
    }

    let version = payload[0];
    let (total_log2, sector_log2, page_log2) = (payload[1], payload[2], payload[3]);

    // Shifts >= 32 would wrap; treat them as a bogus report
    if total_log2 >= 32 || sector_log2 >= 32 || page_log2 >= 32 {
        return Err(Error::ProtocolMismatch("identify geometry exponent"));
    }

    let geometry = FlashGeometry {
        total_size: 1u32 << total_log2,
        sector_size: 1u32 << sector_log2,
        page_size: 1u32 << page_log2,
    };

    if !table.known_versions.contains(&version) || geometry != table.geometry {
        return Err(Error::UnsupportedDevice {
            version,
            total_size: geometry.total_size,
        });
    }

    Ok(DeviceInfo {
        vendor_id: QOOB_VENDOR_ID,
        product_id: QOOB_PRODUCT_ID,
        protocol_version: version,
        geometry,
    })
}
