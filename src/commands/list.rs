//! List command: table of contents from the slot headers.

use qoobflash_core::fs;
use qoobflash_core::Result;

use super::open_programmer;

pub fn run(device: usize, retries: u32) -> Result<()> {
    let mut prog = open_programmer(device, retries)?;
    let geom = prog.info().geometry;
    let catalog = fs::scan(&mut prog)?;

    println!(
        "{:<8} {:<12} {:>9}  {}",
        "Sectors", "Type", "Size", "Description"
    );
    for (sector, header) in catalog.slots() {
        let span = header.sectors(geom.sector_size);
        println!(
            "{:<8} {:<12} {:>9}  {}",
            format!("{}-{}", sector, sector + span - 1),
            header.kind().to_string(),
            header.size(),
            header.description(),
        );
    }
    println!(
        "{} of {} sectors free",
        catalog.free_sectors(),
        geom.sector_count()
    );
    Ok(())
}
