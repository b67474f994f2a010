//! Read command

use std::path::Path;

use qoobflash_core::Result;

use super::{io_error, open_programmer, IndicatifProgress};

pub fn run(
    device: usize,
    retries: u32,
    output: &Path,
    start: u32,
    length: Option<u32>,
) -> Result<()> {
    let mut prog = open_programmer(device, retries)?;
    let geom = prog.info().geometry;
    let len = length.unwrap_or_else(|| geom.total_size.saturating_sub(start));

    let mut progress = IndicatifProgress::new();
    let image = prog.read(start, len, &mut progress)?;

    let bytes = image.into_data();
    std::fs::write(output, &bytes).map_err(io_error)?;
    println!(
        "Read {} bytes from 0x{:06X} to {}",
        bytes.len(),
        start,
        output.display()
    );
    Ok(())
}
