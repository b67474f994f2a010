//! Identify command

use qoobflash_core::Result;

use super::open_programmer;

pub fn run(device: usize, retries: u32) -> Result<()> {
    let prog = open_programmer(device, retries)?;
    let info = prog.info();
    let geom = info.geometry;

    println!(
        "Qoob Pro ({:04X}:{:04X}), bootloader protocol v{}",
        info.vendor_id, info.product_id, info.protocol_version
    );
    println!(
        "Flash: {} bytes ({} KiB), {} sectors of {} KiB, {} byte pages",
        geom.total_size,
        geom.total_size / 1024,
        geom.sector_count(),
        geom.sector_size / 1024,
        geom.page_size,
    );
    Ok(())
}
