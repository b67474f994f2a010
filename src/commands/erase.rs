//! Erase command

use qoobflash_core::Result;

use super::{open_programmer, IndicatifProgress};

pub fn run(device: usize, retries: u32, start: u32, length: Option<u32>) -> Result<()> {
    let mut prog = open_programmer(device, retries)?;
    let geom = prog.info().geometry;

    geom.check_sector_aligned(start)?;
    let len = length.unwrap_or_else(|| geom.total_size.saturating_sub(start));
    let first_sector = start / geom.sector_size;
    let sectors = first_sector..first_sector + geom.sectors_spanned(len);

    let count = sectors.len();
    let mut progress = IndicatifProgress::new();
    prog.erase(sectors, &mut progress)?;

    println!("Erased {} sector(s) from 0x{:06X}", count, start);
    Ok(())
}
