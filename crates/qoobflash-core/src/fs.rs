//! Flash content catalog.
//!
//! The Qoob firmware lays flash out as slots: a file starts on a sector
//! boundary with a 256-byte header carrying a four-byte type magic, a
//! description, and the file's byte size; the file then claims as many whole
//! sectors as the size needs. Scanning just the headers reproduces the table
//! of contents without pulling whole files off the device.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::image::FlashImage;
use crate::programmer::Programmer;
use crate::progress::NoProgress;
use crate::transport::Transport;

/// Bytes of a slot header (one flash page).
pub const SLOT_HEADER_LEN: usize = 256;

const DESC_START: usize = 0x04;
const DESC_END: usize = 0xF8;
const SIZE_OFFSET: usize = 0xFC;

/// What a slot header's magic says the file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// A flashable BIOS image (the boot-critical slot)
    Bios,
    /// Boot background picture
    Background,
    /// Chip configuration block
    Config,
    /// Cheat database
    CheatDb,
    /// Cheat engine code
    CheatEngine,
    /// Raw binary
    Bin,
    /// GameCube DOL executable
    Dol,
    /// ELF executable
    Elf,
    /// Swiss homebrew loader
    Swiss,
    /// Magic not in the known set
    Unknown([u8; 4]),
}

impl SlotKind {
    fn from_magic(magic: [u8; 4]) -> Self {
        match &magic {
            b"(C) " => Self::Bios,
            b"QPIC" => Self::Background,
            b"QCFG" => Self::Config,
            b"QCHT" => Self::CheatDb,
            b"QCHE" => Self::CheatEngine,
            b"BIN\0" => Self::Bin,
            b"DOL\0" => Self::Dol,
            b"ELF\0" => Self::Elf,
            b"SWIS" => Self::Swiss,
            _ => Self::Unknown(magic),
        }
    }

    /// Whether the magic belongs to the known file-type set.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl core::fmt::Display for SlotKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            SlotKind::Bios => "bios",
            SlotKind::Background => "background",
            SlotKind::Config => "config",
            SlotKind::CheatDb => "cheat-db",
            SlotKind::CheatEngine => "cheat-engine",
            SlotKind::Bin => "bin",
            SlotKind::Dol => "dol",
            SlotKind::Elf => "elf",
            SlotKind::Swiss => "swiss",
            SlotKind::Unknown(_) => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// One slot's parsed header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotHeader {
    kind: SlotKind,
    description: String,
    size: u32,
}

impl SlotHeader {
    /// Parse the leading bytes of a slot. `None` if shorter than a header.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < SLOT_HEADER_LEN {
            return None;
        }
        let kind = SlotKind::from_magic([bytes[0], bytes[1], bytes[2], bytes[3]]);

        let raw = &bytes[DESC_START..DESC_END];
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let description = String::from_utf8_lossy(&raw[..end]).into_owned();

        let size = u32::from_be_bytes([
            bytes[SIZE_OFFSET],
            bytes[SIZE_OFFSET + 1],
            bytes[SIZE_OFFSET + 2],
            bytes[SIZE_OFFSET + 3],
        ]);

        Some(Self {
            kind,
            description,
            size,
        })
    }

    /// File type from the header magic.
    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    /// Description string, NUL-terminated on the wire.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// File size in bytes, header included.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Whole sectors the file claims.
    pub fn sectors(&self, sector_size: u32) -> u32 {
        self.size.div_ceil(sector_size)
    }
}

/// Per-sector occupancy derived from the header scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorOccupancy {
    /// Sector reads back fully erased
    Empty,
    /// Sector holds data but no recognizable slot claims it
    Unknown,
    /// Claimed by the slot starting at this sector index
    Slot(u32),
}

/// Table of contents of the flash, built from slot headers.
#[derive(Debug)]
pub struct FlashCatalog {
    occupancy: Vec<SectorOccupancy>,
    slots: BTreeMap<u32, SlotHeader>,
}

impl FlashCatalog {
    /// Occupancy of every sector, indexed by sector number.
    pub fn occupancy(&self) -> &[SectorOccupancy] {
        &self.occupancy
    }

    /// Recognized slots in address order, keyed by start sector.
    pub fn slots(&self) -> impl Iterator<Item = (u32, &SlotHeader)> + '_ {
        self.slots.iter().map(|(sector, header)| (*sector, header))
    }

    /// Header of the slot starting at `sector`, if one does.
    pub fn slot(&self, sector: u32) -> Option<&SlotHeader> {
        self.slots.get(&sector)
    }

    /// Number of fully erased sectors.
    pub fn free_sectors(&self) -> u32 {
        self.occupancy
            .iter()
            .filter(|o| matches!(o, SectorOccupancy::Empty))
            .count() as u32
    }
}

/// Scan slot headers into a catalog.
///
/// Reads one header page at each candidate sector start and skips ahead over
/// the sectors a recognized slot claims. An all-erased header page marks the
/// sector empty; a header with an unknown magic or an impossible span leaves
/// it unknown and the scan moves one sector on.
pub fn scan<T: Transport>(prog: &mut Programmer<T>) -> Result<FlashCatalog> {
    let geom = prog.info().geometry;
    let erase_value = prog.table().erase_value;
    let count = geom.sector_count();

    let mut occupancy = vec![SectorOccupancy::Unknown; count as usize];
    let mut slots = BTreeMap::new();

    let mut sector = 0u32;
    while sector < count {
        let page: FlashImage =
            prog.read(sector * geom.sector_size, SLOT_HEADER_LEN as u32, &mut NoProgress)?;

        let advance = if page.data().iter().all(|&b| b == erase_value) {
            occupancy[sector as usize] = SectorOccupancy::Empty;
            1
        } else {
            match SlotHeader::parse(page.data()) {
                Some(header)
                    if header.kind().is_known()
                        && header.sectors(geom.sector_size) >= 1
                        && sector + header.sectors(geom.sector_size) <= count =>
                {
                    let span = header.sectors(geom.sector_size);
                    for claimed in sector..sector + span {
                        occupancy[claimed as usize] = SectorOccupancy::Slot(sector);
                    }
                    slots.insert(sector, header);
                    span
                }
                _ => 1,
            }
        };
        sector += advance;
    }

    Ok(FlashCatalog { occupancy, slots })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(magic: &[u8; 4], description: &str, size: u32) -> Vec<u8> {
        let mut bytes = vec![0u8; SLOT_HEADER_LEN];
        bytes[..4].copy_from_slice(magic);
        bytes[DESC_START..DESC_START + description.len()]
            .copy_from_slice(description.as_bytes());
        bytes[SIZE_OFFSET..].copy_from_slice(&size.to_be_bytes());
        bytes
    }

    #[test]
    fn parses_known_magics() {
        for (magic, kind) in [
            (b"(C) ", SlotKind::Bios),
            (b"QPIC", SlotKind::Background),
            (b"QCFG", SlotKind::Config),
            (b"QCHT", SlotKind::CheatDb),
            (b"QCHE", SlotKind::CheatEngine),
            (b"BIN\0", SlotKind::Bin),
            (b"DOL\0", SlotKind::Dol),
            (b"ELF\0", SlotKind::Elf),
            (b"SWIS", SlotKind::Swiss),
        ] {
            let header = SlotHeader::parse(&header_bytes(magic, "", 0)).unwrap();
            assert_eq!(header.kind(), kind);
            assert!(header.kind().is_known());
        }

        let header = SlotHeader::parse(&header_bytes(b"ZZZZ", "", 0)).unwrap();
        assert_eq!(header.kind(), SlotKind::Unknown(*b"ZZZZ"));
        assert!(!header.kind().is_known());
    }

    #[test]
    fn description_stops_at_nul() {
        let header =
            SlotHeader::parse(&header_bytes(b"(C) ", "Qoob BIOS 1.3c", 0x1234)).unwrap();
        assert_eq!(header.description(), "Qoob BIOS 1.3c");
        assert_eq!(header.size(), 0x1234);
    }

    #[test]
    fn size_rounds_up_to_whole_sectors() {
        let header = SlotHeader::parse(&header_bytes(b"DOL\0", "x", 0x1_8000)).unwrap();
        assert_eq!(header.sectors(0x1_0000), 2);

        let exact = SlotHeader::parse(&header_bytes(b"DOL\0", "x", 0x2_0000)).unwrap();
        assert_eq!(exact.sectors(0x1_0000), 2);
    }

    #[test]
    fn short_input_is_rejected() {
        assert!(SlotHeader::parse(&[0u8; 16]).is_none());
    }
}
