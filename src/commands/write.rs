//! Write command: erase the affected sectors, program, verify.

use std::path::Path;

use qoobflash_core::{Error, FlashImage, Result};

use super::{io_error, open_programmer, IndicatifProgress};

pub fn run(device: usize, retries: u32, input: &Path, start: u32, verify: bool) -> Result<()> {
    let data = std::fs::read(input).map_err(io_error)?;
    if data.is_empty() {
        return Err(Error::EmptyImage);
    }
    println!("Read {} bytes from {}", data.len(), input.display());

    let mut prog = open_programmer(device, retries)?;
    let geom = prog.info().geometry;

    // Erase works on whole sectors, so the write base must sit on one
    geom.check_sector_aligned(start)?;
    geom.check_bounds(start, data.len())?;

    let image = FlashImage::new(start, data);
    let first_sector = start / geom.sector_size;
    let sectors = first_sector..first_sector + geom.sectors_spanned(image.len() as u32);

    let mut progress = IndicatifProgress::new();
    prog.erase(sectors, &mut progress)?;
    prog.write(&image, &mut progress)?;
    if verify {
        prog.verify(&image, &mut progress)?;
    }

    println!(
        "Wrote {} bytes at 0x{:06X}{}",
        image.len(),
        start,
        if verify { ", verified" } else { "" }
    );
    Ok(())
}
