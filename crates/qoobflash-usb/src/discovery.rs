//! Locating the Qoob Pro among the host's HID devices.
//!
//! The VID/PID pair alone is not trustworthy (03EB:0001 is a generic Atmel
//! id), so discovery also checks the HID manufacturer and product strings the
//! bootloader reports. String descriptors can be unreadable without device
//! permission; in that case the id match alone is accepted so the user gets a
//! permission error instead of a silent "not found".

use hidapi::{DeviceInfo, HidApi};
use qoobflash_core::{Error, Result, QOOB_PRODUCT_ID, QOOB_VENDOR_ID};

use crate::transport::HidTransport;
use crate::map_hid_error;

const QOOB_MANUFACTURER: &str = "QooB Team";
const QOOB_PRODUCT: &str = "QOOB Chip Pro";

/// One candidate device found during enumeration.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Platform path to the HID node (e.g. `/dev/hidraw3`)
    pub path: String,
    /// Manufacturer string, if the descriptor was readable
    pub manufacturer: Option<String>,
    /// Product string, if the descriptor was readable
    pub product: Option<String>,
}

fn matches_qoob(vid: u16, pid: u16, manufacturer: Option<&str>, product: Option<&str>) -> bool {
    if vid != QOOB_VENDOR_ID || pid != QOOB_PRODUCT_ID {
        return false;
    }
    // Reject only a string that is present and wrong
    manufacturer.map_or(true, |m| m == QOOB_MANUFACTURER)
        && product.map_or(true, |p| p == QOOB_PRODUCT)
}

fn candidate(info: &DeviceInfo) -> Candidate {
    Candidate {
        path: info.path().to_string_lossy().into_owned(),
        manufacturer: info.manufacturer_string().map(str::to_owned),
        product: info.product_string().map(str::to_owned),
    }
}

/// List every attached device that looks like a Qoob Pro.
pub fn enumerate() -> Result<Vec<Candidate>> {
    let api = HidApi::new().map_err(map_hid_error)?;
    Ok(api
        .device_list()
        .filter(|d| {
            matches_qoob(
                d.vendor_id(),
                d.product_id(),
                d.manufacturer_string(),
                d.product_string(),
            )
        })
        .map(candidate)
        .collect())
}

/// Open the only attached Qoob Pro.
pub fn open() -> Result<HidTransport> {
    open_nth(0)
}

/// Open the nth attached Qoob Pro (0-indexed), for the rare bench with more
/// than one console wired up.
pub fn open_nth(index: usize) -> Result<HidTransport> {
    let api = HidApi::new().map_err(map_hid_error)?;
    let matches: Vec<&DeviceInfo> = api
        .device_list()
        .filter(|d| {
            matches_qoob(
                d.vendor_id(),
                d.product_id(),
                d.manufacturer_string(),
                d.product_string(),
            )
        })
        .collect();

    if matches.len() > 1 {
        log::warn!("{} Qoob Pro candidates attached, using #{}", matches.len(), index);
    }

    let info = matches.get(index).ok_or(Error::DeviceNotFound)?;
    let path = info.path().to_string_lossy().into_owned();
    log::debug!("opening {} ({:?} / {:?})", path, info.manufacturer_string(), info.product_string());

    let device = info.open_device(&api).map_err(map_hid_error)?;
    Ok(HidTransport::new(device, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_pair_is_required() {
        assert!(!matches_qoob(0x1A86, 0x5512, None, None));
        assert!(!matches_qoob(0x03EB, 0x2FF4, None, None));
    }

    #[test]
    fn wrong_strings_are_rejected_missing_strings_accepted() {
        assert!(matches_qoob(
            0x03EB,
            0x0001,
            Some("QooB Team"),
            Some("QOOB Chip Pro")
        ));
        // unreadable descriptors (no permission yet): id match is enough
        assert!(matches_qoob(0x03EB, 0x0001, None, None));
        // a different Atmel device with the same id pair
        assert!(!matches_qoob(0x03EB, 0x0001, Some("Atmel Corp."), Some("DFU Bootloader")));
    }
}
