//! Verify command

use std::path::Path;

use qoobflash_core::{FlashImage, Result};

use super::{io_error, open_programmer, IndicatifProgress};

pub fn run(device: usize, retries: u32, input: &Path, start: u32) -> Result<()> {
    let data = std::fs::read(input).map_err(io_error)?;
    let mut prog = open_programmer(device, retries)?;

    let image = FlashImage::new(start, data);
    let mut progress = IndicatifProgress::new();
    prog.verify(&image, &mut progress)?;

    println!("Verify OK: {} bytes at 0x{:06X}", image.len(), start);
    Ok(())
}
